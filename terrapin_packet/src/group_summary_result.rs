/*! GroupSummaryResult packet
*/

use crate::group_info::GroupInfo;
use crate::{MAX_RESULT_ENTRIES, SUBTYPE_GROUP_SUMMARY_RESULT};

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::combinator::verify;
use nom::multi::count;
use nom::number::streaming::{be_u16, be_u32};

/** Group summaries answering a
[`ServiceSearchRequest`](./struct.ServiceSearchRequest.html).

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x16`
`4`      | Request id
`2`      | Depth (obfuscated)
`2`      | Number of entries
variable | [`GroupInfo`](./struct.GroupInfo.html) entries

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupSummaryResult {
    /// Request id copied from the matching search request.
    pub request_id: u32,
    /// Obfuscated depth.
    pub depth: u16,
    /// Matching groups.
    pub results: Vec<GroupInfo>,
}

impl GroupSummaryResult {
    /// Number of entries carried by this result.
    pub fn count(&self) -> u32 {
        self.results.len() as u32
    }

    /// Drop the trailing entry.
    pub fn pop(&mut self) {
        self.results.pop();
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.results.clear();
    }
}

impl FromBytes for GroupSummaryResult {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_GROUP_SUMMARY_RESULT][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, results_len) = verify(be_u16, |len| *len as usize <= MAX_RESULT_ENTRIES)(input)?;
        let (input, results) = count(GroupInfo::from_bytes, results_len as usize)(input)?;
        Ok((input, GroupSummaryResult { request_id, depth, results }))
    }
}

impl ToBytes for GroupSummaryResult {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(self.results.len() > MAX_RESULT_ENTRIES, |buf| gen_error(buf, 0)) >>
            gen_be_u8!(SUBTYPE_GROUP_SUMMARY_RESULT) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_be_u16!(self.results.len() as u16) >>
            gen_many_ref!(&self.results, |buf, info| GroupInfo::to_bytes(info, buf))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha1Hash;

    encode_decode_test!(
        group_summary_result_encode_decode,
        GroupSummaryResult {
            request_id: 54321,
            depth: 5,
            results: vec![
                GroupInfo {
                    group_id: Sha1Hash::new([3; 20]),
                    name: "gardening".to_string(),
                    description: "tomatoes and beyond".to_string(),
                    popularity: 3,
                    number_of_messages: 15,
                    last_post: 1_690_000_000,
                },
            ],
        }
    );

    encode_decode_test!(
        group_summary_result_empty_encode_decode,
        GroupSummaryResult {
            request_id: 1,
            depth: 1,
            results: Vec::new(),
        }
    );
}
