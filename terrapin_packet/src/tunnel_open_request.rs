/*! TunnelOpenRequest packet
*/

use crate::hash::Sha1Hash;
use crate::SUBTYPE_TUNNEL_OPEN_REQUEST;

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::number::streaming::{be_u16, be_u32};

/** First half of the tunnel handshake, flooded like a search request.

The partial tunnel id is chosen by the requester. The node that owns
the requested hash completes it into the final tunnel id and answers
with a [`TunnelOpenAck`](./struct.TunnelOpenAck.html) along the reverse
path.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x03`
`20`     | File hash to reach
`4`      | Request id
`4`      | Partial tunnel id
`2`      | Depth

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelOpenRequest {
    /// Hash of the content the tunnel should lead to.
    pub file_hash: Sha1Hash,
    /// Randomly generated request id, stable across hops.
    pub request_id: u32,
    /// Requester's half of the tunnel id, completed at the destination.
    pub partial_tunnel_id: u32,
    /// Current flood depth, incremented by each forwarding hop.
    pub depth: u16,
}

impl FromBytes for TunnelOpenRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_TUNNEL_OPEN_REQUEST][..])(input)?;
        let (input, file_hash) = Sha1Hash::from_bytes(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, partial_tunnel_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        Ok((input, TunnelOpenRequest { file_hash, request_id, partial_tunnel_id, depth }))
    }
}

impl ToBytes for TunnelOpenRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(SUBTYPE_TUNNEL_OPEN_REQUEST) >>
            gen_slice!(self.file_hash.as_bytes()) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u32!(self.partial_tunnel_id) >>
            gen_be_u16!(self.depth)
        )
    }
}
