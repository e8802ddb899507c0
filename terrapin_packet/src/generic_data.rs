/*! GenericData packet
*/

use crate::SUBTYPE_GENERIC_DATA;

use terrapin_binary_io::*;

use nom::bytes::streaming::{tag, take};
use nom::combinator::verify;
use nom::number::streaming::be_u32;

/// Maximum payload size a `GenericData` packet may carry.
pub const MAX_GENERIC_PAYLOAD_SIZE: usize = 65000;

/** Opaque application payload travelling through an established tunnel.

Relaying hops resolve it purely by tunnel id and never look at the
payload. The traveling direction is hop-local state assigned from the
arrival link, it is deliberately not part of the wire format.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x0a`
`4`      | Tunnel id
`4`      | Length of payload
variable | Payload

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenericData {
    /// Id of the tunnel to travel through.
    pub tunnel_id: u32,
    /// Opaque application bytes.
    pub payload: Vec<u8>,
}

impl GenericData {
    /// Whether this packet refreshes the idle timer of the tunnels it
    /// passes through. Generic data always does; a future variant may
    /// opt out and ride tunnels without keeping them alive.
    pub fn should_stamp(&self) -> bool {
        true
    }
}

impl FromBytes for GenericData {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_GENERIC_DATA][..])(input)?;
        let (input, tunnel_id) = be_u32(input)?;
        let (input, payload_len) = verify(be_u32, |len| *len as usize <= MAX_GENERIC_PAYLOAD_SIZE)(input)?;
        let (input, payload) = take(payload_len)(input)?;
        Ok((input, GenericData {
            tunnel_id,
            payload: payload.to_vec(),
        }))
    }
}

impl ToBytes for GenericData {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(self.payload.len() > MAX_GENERIC_PAYLOAD_SIZE, |buf| gen_error(buf, 0)) >>
            gen_be_u8!(SUBTYPE_GENERIC_DATA) >>
            gen_be_u32!(self.tunnel_id) >>
            gen_be_u32!(self.payload.len() as u32) >>
            gen_slice!(self.payload.as_slice())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, thread_rng};

    encode_decode_test!(
        generic_data_encode_decode,
        GenericData {
            tunnel_id: 42,
            payload: vec![42; 123],
        }
    );

    encode_decode_test!(
        generic_data_empty_payload_encode_decode,
        GenericData {
            tunnel_id: 0,
            payload: Vec::new(),
        }
    );

    #[test]
    fn generic_data_max_payload_round_trip() {
        let mut payload = vec![0; MAX_GENERIC_PAYLOAD_SIZE];
        thread_rng().fill(payload.as_mut_slice());
        let data = GenericData { tunnel_id: 7, payload };
        let mut buf = vec![0; MAX_GENERIC_PAYLOAD_SIZE + 16];
        let (_, size) = data.to_bytes((&mut buf, 0)).unwrap();
        let (rest, decoded) = GenericData::from_bytes(&buf[..size]).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, data);
    }

    #[test]
    fn generic_data_oversized_payload_rejected() {
        let data = GenericData {
            tunnel_id: 7,
            payload: vec![0; MAX_GENERIC_PAYLOAD_SIZE + 1],
        };
        let mut buf = vec![0; MAX_GENERIC_PAYLOAD_SIZE + 64];
        assert!(data.to_bytes((&mut buf, 0)).is_err());
    }
}
