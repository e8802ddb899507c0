/*! Sha1 hash type used as file hash and hashed group id.
*/

use terrapin_binary_io::*;

use nom::bytes::streaming::take;

use std::fmt;

/// Number of bytes in a `Sha1Hash`.
pub const SHA1_HASH_SIZE: usize = 20;

/** Sha1 digest identifying a shared file or a hashed group id.

The routing layer never computes or verifies it, it is an opaque
fixed-size identifier that travels on the wire as raw bytes.
*/
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Sha1Hash([u8; SHA1_HASH_SIZE]);

impl Sha1Hash {
    /// Construct a hash from raw digest bytes.
    pub fn new(bytes: [u8; SHA1_HASH_SIZE]) -> Sha1Hash {
        Sha1Hash(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; SHA1_HASH_SIZE] {
        &self.0
    }
}

impl From<[u8; SHA1_HASH_SIZE]> for Sha1Hash {
    fn from(bytes: [u8; SHA1_HASH_SIZE]) -> Sha1Hash {
        Sha1Hash(bytes)
    }
}

impl AsRef<[u8]> for Sha1Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sha1Hash({})", self)
    }
}

impl FromBytes for Sha1Hash {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, bytes) = take(SHA1_HASH_SIZE)(input)?;
        let mut hash = [0; SHA1_HASH_SIZE];
        hash.copy_from_slice(bytes);
        Ok((input, Sha1Hash(hash)))
    }
}

impl ToBytes for Sha1Hash {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.0)
        )
    }
}
