/*! Linearized regular expression carried by regex search requests.
*/

use crate::{gen_string, parse_string};

use terrapin_binary_io::*;

use nom::combinator::verify;
use nom::multi::count;
use nom::number::streaming::{be_u16, be_u32};
use nom::bytes::streaming::take;

/// Maximum number of tokens, ints or strings in a linearized expression.
pub const MAX_EXPRESSION_ITEMS: usize = 256;

/** A regular expression flattened into three parallel arrays.

The router never interprets the expression. Only the file index of the
answering node rebuilds and evaluates it, so the exact token meaning is
a contract between application services, not part of the routing layer.

Serialized form:

Length   | Content
-------- | ------
`2`      | Number of tokens
variable | Tokens, one byte each
`2`      | Number of ints
variable | Ints, four bytes each
`2`      | Number of strings
variable | Length-prefixed strings

*/
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinearizedExpression {
    /// Operation tokens in evaluation order.
    pub tokens: Vec<u8>,
    /// Integer operands.
    pub ints: Vec<u32>,
    /// String operands.
    pub strings: Vec<String>,
}

fn gen_u32<'a>(buf: (&'a mut [u8], usize), int: &u32) -> Result<(&'a mut [u8], usize), GenError> {
    do_gen!(buf,
        gen_be_u32!(*int)
    )
}

impl FromBytes for LinearizedExpression {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, tokens_len) = verify(be_u16, |len| *len as usize <= MAX_EXPRESSION_ITEMS)(input)?;
        let (input, tokens) = take(tokens_len)(input)?;
        let (input, ints_len) = verify(be_u16, |len| *len as usize <= MAX_EXPRESSION_ITEMS)(input)?;
        let (input, ints) = count(be_u32, ints_len as usize)(input)?;
        let (input, strings_len) = verify(be_u16, |len| *len as usize <= MAX_EXPRESSION_ITEMS)(input)?;
        let (input, strings) = count(parse_string, strings_len as usize)(input)?;
        Ok((input, LinearizedExpression {
            tokens: tokens.to_vec(),
            ints,
            strings,
        }))
    }
}

impl ToBytes for LinearizedExpression {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_cond!(self.tokens.len() > MAX_EXPRESSION_ITEMS, |buf| gen_error(buf, 0)) >>
            gen_cond!(self.ints.len() > MAX_EXPRESSION_ITEMS, |buf| gen_error(buf, 0)) >>
            gen_cond!(self.strings.len() > MAX_EXPRESSION_ITEMS, |buf| gen_error(buf, 0)) >>
            gen_be_u16!(self.tokens.len() as u16) >>
            gen_slice!(self.tokens.as_slice()) >>
            gen_be_u16!(self.ints.len() as u16) >>
            gen_many_ref!(&self.ints, |buf, int| gen_u32(buf, int)) >>
            gen_be_u16!(self.strings.len() as u16) >>
            gen_many_ref!(&self.strings, |buf, string| gen_string(buf, string))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    encode_decode_test!(
        linearized_expression_encode_decode,
        LinearizedExpression {
            tokens: vec![1, 3, 2],
            ints: vec![0, 7],
            strings: vec!["pine".to_string(), "apple".to_string()],
        }
    );

    encode_decode_test!(
        linearized_expression_empty_encode_decode,
        LinearizedExpression::default()
    );

    #[test]
    fn linearized_expression_too_many_tokens() {
        let expr = LinearizedExpression {
            tokens: vec![0; MAX_EXPRESSION_ITEMS + 1],
            ints: Vec::new(),
            strings: Vec::new(),
        };
        let mut buf = [0; 1024];
        assert!(expr.to_bytes((&mut buf, 0)).is_err());
    }
}
