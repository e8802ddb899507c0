/*! GroupDataResult packet
*/

use crate::SUBTYPE_GROUP_DATA_RESULT;

use terrapin_binary_io::*;

use nom::bytes::streaming::{tag, take};
use nom::combinator::verify;
use nom::number::streaming::{be_u16, be_u32};

/// Maximum size of the encrypted group blob.
pub const MAX_GROUP_DATA_SIZE: usize = 60000;

/** Encrypted group data answering a
[`GroupRequest`](./struct.GroupRequest.html).

The blob is encrypted with the cleartext group id, which only the
requester knows, so intermediate hops relay it blindly.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x17`
`4`      | Request id
`2`      | Depth (obfuscated)
`4`      | Length of the blob
variable | Encrypted group data

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupDataResult {
    /// Request id copied from the matching group request.
    pub request_id: u32,
    /// Obfuscated depth.
    pub depth: u16,
    /// Group data encrypted with the cleartext group id.
    pub encrypted_group_data: Vec<u8>,
}

impl GroupDataResult {
    /// A group data result carries exactly one logical entry while the
    /// blob is present.
    pub fn count(&self) -> u32 {
        u32::from(!self.encrypted_group_data.is_empty())
    }

    /// Dropping the only entry clears the blob.
    pub fn pop(&mut self) {
        self.clear();
    }

    /// Drop the blob.
    pub fn clear(&mut self) {
        self.encrypted_group_data.clear();
    }
}

impl FromBytes for GroupDataResult {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_GROUP_DATA_RESULT][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, data_len) = verify(be_u32, |len| *len as usize <= MAX_GROUP_DATA_SIZE)(input)?;
        let (input, encrypted_group_data) = take(data_len)(input)?;
        Ok((input, GroupDataResult {
            request_id,
            depth,
            encrypted_group_data: encrypted_group_data.to_vec(),
        }))
    }
}

impl ToBytes for GroupDataResult {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(self.encrypted_group_data.len() > MAX_GROUP_DATA_SIZE, |buf| gen_error(buf, 0)) >>
            gen_be_u8!(SUBTYPE_GROUP_DATA_RESULT) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_be_u32!(self.encrypted_group_data.len() as u32) >>
            gen_slice!(self.encrypted_group_data.as_slice())
        )
    }
}
