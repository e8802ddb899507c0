/*! RegexSearchRequest packet
*/

use crate::expression::LinearizedExpression;
use crate::SUBTYPE_REGEX_SEARCH_REQUEST;

use terrapin_binary_io::*;

use nom::bytes::streaming::tag;
use nom::number::streaming::{be_u16, be_u32};

/** Search request carrying a linearized regular expression.

Flood semantics are identical to
[`StringSearchRequest`](./struct.StringSearchRequest.html), only the
local match differs: the file index of each hop rebuilds the expression
and evaluates it against its own dataset.

Serialized form:

Length   | Content
-------- | ------
`1`      | `0x09`
`4`      | Request id
`2`      | Depth
variable | Linearized expression

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegexSearchRequest {
    /// Randomly generated request id, stable across hops.
    pub request_id: u32,
    /// Current flood depth, incremented by each forwarding hop.
    pub depth: u16,
    /// The expression in linearized form.
    pub expr: LinearizedExpression,
}

impl FromBytes for RegexSearchRequest {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&[SUBTYPE_REGEX_SEARCH_REQUEST][..])(input)?;
        let (input, request_id) = be_u32(input)?;
        let (input, depth) = be_u16(input)?;
        let (input, expr) = LinearizedExpression::from_bytes(input)?;
        Ok((input, RegexSearchRequest { request_id, depth, expr }))
    }
}

impl ToBytes for RegexSearchRequest {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_be_u8!(SUBTYPE_REGEX_SEARCH_REQUEST) >>
            gen_be_u32!(self.request_id) >>
            gen_be_u16!(self.depth) >>
            gen_call!(|buf, expr| LinearizedExpression::to_bytes(expr, buf), &self.expr)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        regex_search_request_encode_decode,
        RegexSearchRequest {
            request_id: 0x0102_0304,
            depth: 2,
            expr: LinearizedExpression {
                tokens: vec![1, 2],
                ints: vec![42],
                strings: vec![".*\\.flac".to_string()],
            },
        }
    );
}
