/*! StringSearchRequest packet
*/

use crate::{gen_string, parse_string, SUBTYPE_STRING_SEARCH_REQUEST};

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::number::streaming::{be_u16, be_u32};

/** Keyword search flooded through the overlay.

Every hop runs the keyword against its local file index and floods the
request onward with an incremented depth until the depth budget is
exhausted. The request id is assigned once at the origin and never
changes, it is the only correlation key between a request, its results
and the per-hop dedup state.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x01`
`4`      | Request id
`2`      | Depth
`2`      | Length of keyword
variable | Keyword

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StringSearchRequest {
    /// Randomly generated request id, stable across hops.
    pub request_id: u32,
    /// Current flood depth, incremented by each forwarding hop.
    pub depth: u16,
    /// Keyword to match.
    pub keyword: String,
}

impl FromBytes for StringSearchRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_STRING_SEARCH_REQUEST][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, keyword) = parse_string(input)?;
        Ok((input, StringSearchRequest { request_id, depth, keyword }))
    }
}

impl ToBytes for StringSearchRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(SUBTYPE_STRING_SEARCH_REQUEST) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_call!(|buf, keyword| gen_string(buf, keyword), &self.keyword)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        string_search_request_encode_decode,
        StringSearchRequest {
            request_id: 0xdead_beef,
            depth: 3,
            keyword: "pineapple".to_string(),
        }
    );

    encode_decode_test!(
        string_search_request_empty_keyword_encode_decode,
        StringSearchRequest {
            request_id: 1,
            depth: 1,
            keyword: String::new(),
        }
    );

    #[test]
    fn string_search_request_truncated() {
        let request = StringSearchRequest {
            request_id: 42,
            depth: 1,
            keyword: "pineapple".to_string(),
        };
        let mut buf = [0; 64];
        let (_, size) = request.to_bytes((&mut buf, 0)).unwrap();
        assert!(matches!(
            StringSearchRequest::from_bytes(&buf[..size - 3]),
            Err(nom::Err::Incomplete(_))
        ));
    }
}
