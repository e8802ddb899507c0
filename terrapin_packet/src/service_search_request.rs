/*! ServiceSearchRequest packet
*/

use crate::{gen_string, parse_string, SUBTYPE_SERVICE_SEARCH_REQUEST};

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::number::streaming::{be_u16, be_u32};

/** Keyword search addressed to a specific client service.

Instead of the file index, the hop's registered service with a matching
service id performs the local match and answers with a
[`GroupSummaryResult`](./struct.GroupSummaryResult.html). Hops without
such a service still flood the request onward.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x0b`
`4`      | Request id
`2`      | Depth
`2`      | Service id
`2`      | Length of keyword
variable | Keyword

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceSearchRequest {
    /// Randomly generated request id, stable across hops.
    pub request_id: u32,
    /// Current flood depth, incremented by each forwarding hop.
    pub depth: u16,
    /// Id of the service that should perform the local match.
    pub service_id: u16,
    /// Keyword to match.
    pub keyword: String,
}

impl FromBytes for ServiceSearchRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_SERVICE_SEARCH_REQUEST][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, service_id) = be_u16(input)?;
        let (input, keyword) = parse_string(input)?;
        Ok((input, ServiceSearchRequest { request_id, depth, service_id, keyword }))
    }
}

impl ToBytes for ServiceSearchRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(SUBTYPE_SERVICE_SEARCH_REQUEST) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_be_u16!(self.service_id) >>
            gen_call!(|buf, keyword| gen_string(buf, keyword), &self.keyword)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        service_search_request_encode_decode,
        ServiceSearchRequest {
            request_id: 77,
            depth: 4,
            service_id: 0x0215,
            keyword: "retro".to_string(),
        }
    );
}
