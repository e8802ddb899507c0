/*! FileSearchResult packet
*/

use crate::file_info::FileInfo;
use crate::{MAX_RESULT_ENTRIES, SUBTYPE_FILE_SEARCH_RESULT};

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::combinator::verify;
use nom::multi::count;
use nom::number::streaming::{be_u16, be_u32};

/** Files matching a string or regex search.

Travels back toward the search origin one hop at a time along the
reverse path recorded for the request id. The depth field is the
obfuscated value computed by the answering node, not a real hop count.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x02`
`4`      | Request id
`2`      | Depth (obfuscated)
`2`      | Number of entries
variable | [`FileInfo`](./struct.FileInfo.html) entries

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileSearchResult {
    /// Request id copied from the matching search request.
    pub request_id: u32,
    /// Obfuscated depth: 1 means the match is adjacent, any greater
    /// value means remote.
    pub depth: u16,
    /// Matching files.
    pub results: Vec<FileInfo>,
}

impl FileSearchResult {
    /// Number of entries carried by this result.
    pub fn count(&self) -> u32 {
        self.results.len() as u32
    }

    /// Drop the trailing entry. Used to truncate a result that would
    /// push a request over its result budget.
    pub fn pop(&mut self) {
        self.results.pop();
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.results.clear();
    }
}

impl FromBytes for FileSearchResult {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_FILE_SEARCH_RESULT][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, results_len) = verify(be_u16, |len| *len as usize <= MAX_RESULT_ENTRIES)(input)?;
        let (input, results) = count(FileInfo::from_bytes, results_len as usize)(input)?;
        Ok((input, FileSearchResult { request_id, depth, results }))
    }
}

impl ToBytes for FileSearchResult {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(self.results.len() > MAX_RESULT_ENTRIES, |buf| gen_error(buf, 0)) >>
            gen_be_u8!(SUBTYPE_FILE_SEARCH_RESULT) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_be_u16!(self.results.len() as u16) >>
            gen_many_ref!(&self.results, |buf, info| FileInfo::to_bytes(info, buf))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha1Hash;

    encode_decode_test!(
        file_search_result_encode_decode,
        FileSearchResult {
            request_id: 12345,
            depth: 1,
            results: vec![
                FileInfo {
                    hash: Sha1Hash::new([1; 20]),
                    name: "pineapple.png".to_string(),
                    size: 4096,
                },
                FileInfo {
                    hash: Sha1Hash::new([2; 20]),
                    name: "pineapple_pizza.txt".to_string(),
                    size: 17,
                },
            ],
        }
    );

    encode_decode_test!(
        file_search_result_empty_encode_decode,
        FileSearchResult {
            request_id: 0,
            depth: 7,
            results: Vec::new(),
        }
    );

    #[test]
    fn file_search_result_pop_drops_trailing() {
        let mut result = FileSearchResult {
            request_id: 1,
            depth: 1,
            results: vec![
                FileInfo { hash: Sha1Hash::new([1; 20]), name: "a".to_string(), size: 1 },
                FileInfo { hash: Sha1Hash::new([2; 20]), name: "b".to_string(), size: 2 },
            ],
        };
        result.pop();
        assert_eq!(result.count(), 1);
        assert_eq!(result.results[0].name, "a");
        result.clear();
        assert_eq!(result.count(), 0);
    }
}
