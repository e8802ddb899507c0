/*! FileInfo entry of a file search result.
*/

use crate::hash::Sha1Hash;
use crate::{gen_string, parse_string};

use terrapin_binary_io::*;

use nom::number::streaming::be_u64;

/** One matching file returned by a keyword or regex search.

Serialized form:

Length   | Content
-------- | ------
`20`     | File hash
`2`      | Length of file name
variable | File name
`8`      | File size

*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileInfo {
    /// Hash of the file contents.
    pub hash: Sha1Hash,
    /// File name as shared by the answering node.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
}

impl FromBytes for FileInfo {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, hash) = Sha1Hash::from_bytes(input)?;
        let (input, name) = parse_string(input)?;
        let (input, size) = be_u64(input)?;
        Ok((input, FileInfo { hash, name, size }))
    }
}

impl ToBytes for FileInfo {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        do_gen!(buf,
            gen_slice!(self.hash.as_bytes()) >>
            gen_call!(|buf, name| gen_string(buf, name), &self.name) >>
            gen_be_u64!(self.size)
        )
    }
}
