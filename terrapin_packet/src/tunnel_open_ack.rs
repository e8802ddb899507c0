/*! TunnelOpenAck packet
*/

use crate::SUBTYPE_TUNNEL_OPEN_ACK;

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::number::streaming::be_u32;

/** Second half of the tunnel handshake.

Sent by the node owning the requested hash, back along the reverse path
of the matching
[`TunnelOpenRequest`](./struct.TunnelOpenRequest.html). Every hop that
relays it records a bidirectional route entry for the tunnel id, from
then on tunnel traffic is forwarded by id lookup alone.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x04`
`4`      | Tunnel id
`4`      | Request id

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelOpenAck {
    /// Final tunnel id, identical for the same pair of endpoints and
    /// the same hash.
    pub tunnel_id: u32,
    /// Request id of the original tunnel request.
    pub request_id: u32,
}

impl FromBytes for TunnelOpenAck {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_TUNNEL_OPEN_ACK][..])(input)?;
        let (input, tunnel_id) = be_u32(input)?;
        let (input, request_id) = be_u32(input)?;
        Ok((input, TunnelOpenAck { tunnel_id, request_id }))
    }
}

impl ToBytes for TunnelOpenAck {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(SUBTYPE_TUNNEL_OPEN_ACK) >>
            gen_be_u32!(self.tunnel_id) >>
            gen_be_u32!(self.request_id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        tunnel_open_ack_encode_decode,
        TunnelOpenAck {
            tunnel_id: 0xaaaa_bbbb,
            request_id: 0xcccc_dddd,
        }
    );
}
