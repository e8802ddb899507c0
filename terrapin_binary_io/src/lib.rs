/*!
Binary serialization traits used by all terrapin packets.

Parsing is done with [nom](https://crates.io/crates/nom), generation
with [cookie-factory](https://crates.io/crates/cookie-factory). Packets
use streaming number parsers so that a short buffer surfaces as
`nom::Err::Incomplete` rather than a generic parse error.
*/

#![forbid(unsafe_code)]

pub use cookie_factory::GenError;
pub use nom::IResult;

/// The trait that provides deserialization from bytes.
pub trait FromBytes: Sized {
    /// Deserialize struct using `nom` from raw bytes.
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self>;
}

/// The trait that provides serialization to bytes.
pub trait ToBytes: Sized {
    /// Serialize struct into raw bytes using `cookie_factory`.
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError>;
}

/// Fail generation with `GenError::CustomError`. Useful inside
/// `gen_cond!` to reject values that must not be serialized.
pub fn gen_error(_buf: (&mut [u8], usize), error: u32) -> Result<(&mut [u8], usize), GenError> {
    Err(GenError::CustomError(error))
}

/// Generate a test that checks `decode(encode(value)) == value` for a
/// given value, with no trailing bytes left over.
#[macro_export]
macro_rules! encode_decode_test (
    ($test:ident, $value:expr) => (
        #[test]
        fn $test() {
            let value = $value;
            let mut buf = [0; 1024 * 128];
            let (_, size) = value.to_bytes((&mut buf, 0)).expect("Failed to encode");
            fn decode_same_type<'a, T: $crate::FromBytes>(
                _value: &T,
                input: &'a [u8],
            ) -> $crate::IResult<&'a [u8], T> {
                T::from_bytes(input)
            }
            let (rest, decoded_value) = decode_same_type(&value, &buf[..size]).expect("Failed to decode");
            assert!(rest.is_empty());
            assert_eq!(decoded_value, value);
        }
    )
);
