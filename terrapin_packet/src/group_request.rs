/*! GroupRequest packet
*/

use crate::hash::Sha1Hash;
use crate::SUBTYPE_GROUP_REQUEST;

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::number::streaming::{be_u16, be_u32};

/** Request for the data of one distributed group.

The group id is hashed so that intermediate hops cannot learn which
group is requested. A hop whose registered service recognizes the
hashed id answers with a
[`GroupDataResult`](./struct.GroupDataResult.html).

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x0c`
`4`      | Request id
`2`      | Depth
`2`      | Service id
`20`     | Hashed group id

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupRequest {
    /// Randomly generated request id, stable across hops.
    pub request_id: u32,
    /// Current flood depth, incremented by each forwarding hop.
    pub depth: u16,
    /// Id of the service that should perform the local match.
    pub service_id: u16,
    /// Group id hashed to keep it private.
    pub hashed_group_id: Sha1Hash,
}

impl FromBytes for GroupRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_GROUP_REQUEST][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, service_id) = be_u16(input)?;
        let (input, hashed_group_id) = Sha1Hash::from_bytes(input)?;
        Ok((input, GroupRequest { request_id, depth, service_id, hashed_group_id }))
    }
}

impl ToBytes for GroupRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(SUBTYPE_GROUP_REQUEST) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_be_u16!(self.service_id) >>
            gen_slice!(self.hashed_group_id.as_bytes())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        group_request_encode_decode,
        GroupRequest {
            request_id: 0xffff_ffff,
            depth: 6,
            service_id: 0x0218,
            hashed_group_id: Sha1Hash::new([0x5a; 20]),
        }
    );
}
