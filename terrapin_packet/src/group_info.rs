/*! GroupInfo entry of a group summary result.
*/

use crate::hash::Sha1Hash;
use crate::{gen_string, parse_string};

use terrapin_binary_io::*;

use nom::number::streaming::{be_u32, be_u64};

/** Summary of a distributed group advertised by a client service.

Serialized form:

Length   | Content
-------- | ------
`20`     | Group id
`2`      | Length of group name
variable | Group name
`2`      | Length of description
variable | Description
`4`      | Popularity
`4`      | Number of messages
`8`      | Timestamp of the last post

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupInfo {
    /// Id of the group.
    pub group_id: Sha1Hash,
    /// Human readable group name.
    pub name: String,
    /// Short description of the group.
    pub description: String,
    /// How many peers around the answering node subscribe to the group.
    pub popularity: u32,
    /// Number of messages the answering node holds for the group.
    pub number_of_messages: u32,
    /// Unix timestamp of the most recent post.
    pub last_post: u64,
}

impl FromBytes for GroupInfo {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, group_id) = Sha1Hash::from_bytes(input)?;
        let (input, name) = parse_string(input)?;
        let (input, description) = parse_string(input)?;
        let (input, popularity) = be_u32(input)?;
        let (input, number_of_messages) = be_u32(input)?;
        let (input, last_post) = be_u64(input)?;
        Ok((input, GroupInfo {
            group_id,
            name,
            description,
            popularity,
            number_of_messages,
            last_post,
        }))
    }
}

impl ToBytes for GroupInfo {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.group_id.as_bytes()) >>
            gen_call!(|buf, name| gen_string(buf, name), &self.name) >>
            gen_call!(|buf, description| gen_string(buf, description), &self.description) >>
            gen_be_u32!(self.popularity) >>
            gen_be_u32!(self.number_of_messages) >>
            gen_be_u64!(self.last_post)
        )
    }
}
