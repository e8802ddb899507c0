/*!
Encoding/decoding for the terrapin anonymous tunnel-routing protocol.

Every packet starts with a stable one-byte subtype code followed by an
ordered sequence of fixed-width big-endian fields. Codes must not be
renumbered, reserved codes fail decoding closed.
*/

#![forbid(unsafe_code)]

#[macro_use]
extern crate cookie_factory;
#[macro_use]
extern crate terrapin_binary_io;

mod expression;
mod file_info;
mod file_search_result;
mod generic_data;
mod group_data_result;
mod group_info;
mod group_request;
mod group_summary_result;
mod hash;
mod priority;
mod regex_search_request;
mod search_request;
mod search_result;
mod service_search_request;
mod string_search_request;
mod tunnel_open_ack;
mod tunnel_open_request;

pub use crate::expression::LinearizedExpression;
pub use crate::file_info::FileInfo;
pub use crate::file_search_result::FileSearchResult;
pub use crate::generic_data::{GenericData, MAX_GENERIC_PAYLOAD_SIZE};
pub use crate::group_data_result::GroupDataResult;
pub use crate::group_info::GroupInfo;
pub use crate::group_request::GroupRequest;
pub use crate::group_summary_result::GroupSummaryResult;
pub use crate::hash::{Sha1Hash, SHA1_HASH_SIZE};
pub use crate::priority::PacketPriority;
pub use crate::regex_search_request::RegexSearchRequest;
pub use crate::search_request::SearchRequest;
pub use crate::search_result::SearchResult;
pub use crate::service_search_request::ServiceSearchRequest;
pub use crate::string_search_request::StringSearchRequest;
pub use crate::tunnel_open_ack::TunnelOpenAck;
pub use crate::tunnel_open_request::TunnelOpenRequest;

use terrapin_binary_io::*;

use nom::branch::alt;
use nom::combinator::map;
use nom::number::streaming::be_u16;
use nom::bytes::streaming::take;

/// Subtype code of [`StringSearchRequest`](./struct.StringSearchRequest.html).
pub const SUBTYPE_STRING_SEARCH_REQUEST: u8 = 0x01;
/// Subtype code of [`FileSearchResult`](./struct.FileSearchResult.html).
pub const SUBTYPE_FILE_SEARCH_RESULT: u8 = 0x02;
/// Subtype code of [`TunnelOpenRequest`](./struct.TunnelOpenRequest.html).
pub const SUBTYPE_TUNNEL_OPEN_REQUEST: u8 = 0x03;
/// Subtype code of [`TunnelOpenAck`](./struct.TunnelOpenAck.html).
pub const SUBTYPE_TUNNEL_OPEN_ACK: u8 = 0x04;
/// Subtype code of [`RegexSearchRequest`](./struct.RegexSearchRequest.html).
pub const SUBTYPE_REGEX_SEARCH_REQUEST: u8 = 0x09;
/// Subtype code of [`GenericData`](./struct.GenericData.html).
pub const SUBTYPE_GENERIC_DATA: u8 = 0x0a;
/// Subtype code of [`ServiceSearchRequest`](./struct.ServiceSearchRequest.html).
pub const SUBTYPE_SERVICE_SEARCH_REQUEST: u8 = 0x0b;
/// Subtype code of [`GroupRequest`](./struct.GroupRequest.html).
pub const SUBTYPE_GROUP_REQUEST: u8 = 0x0c;
/// Subtype code of [`GroupSummaryResult`](./struct.GroupSummaryResult.html).
pub const SUBTYPE_GROUP_SUMMARY_RESULT: u8 = 0x16;
/// Subtype code of [`GroupDataResult`](./struct.GroupDataResult.html).
pub const SUBTYPE_GROUP_DATA_RESULT: u8 = 0x17;

/// Maximum byte length of a keyword or name string on the wire.
pub const MAX_STRING_SIZE: usize = 8192;

/// Maximum number of entries a search result may carry on the wire.
pub const MAX_RESULT_ENTRIES: usize = 100;

/** Top-level terrapin packet.

The variant is identified by the leading subtype byte. Subtype codes
0x07, 0x08, 0x10, 0x11, 0x14 and 0x15 are reserved for the
file-transfer family and are not decoded here.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Packet {
    /// [`StringSearchRequest`](./struct.StringSearchRequest.html) structure.
    StringSearchRequest(StringSearchRequest),
    /// [`FileSearchResult`](./struct.FileSearchResult.html) structure.
    FileSearchResult(FileSearchResult),
    /// [`TunnelOpenRequest`](./struct.TunnelOpenRequest.html) structure.
    TunnelOpenRequest(TunnelOpenRequest),
    /// [`TunnelOpenAck`](./struct.TunnelOpenAck.html) structure.
    TunnelOpenAck(TunnelOpenAck),
    /// [`RegexSearchRequest`](./struct.RegexSearchRequest.html) structure.
    RegexSearchRequest(RegexSearchRequest),
    /// [`GenericData`](./struct.GenericData.html) structure.
    GenericData(GenericData),
    /// [`ServiceSearchRequest`](./struct.ServiceSearchRequest.html) structure.
    ServiceSearchRequest(ServiceSearchRequest),
    /// [`GroupRequest`](./struct.GroupRequest.html) structure.
    GroupRequest(GroupRequest),
    /// [`GroupSummaryResult`](./struct.GroupSummaryResult.html) structure.
    GroupSummaryResult(GroupSummaryResult),
    /// [`GroupDataResult`](./struct.GroupDataResult.html) structure.
    GroupDataResult(GroupDataResult),
}

impl FromBytes for Packet {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        alt((
            map(StringSearchRequest::from_bytes, Packet::StringSearchRequest),
            map(FileSearchResult::from_bytes, Packet::FileSearchResult),
            map(TunnelOpenRequest::from_bytes, Packet::TunnelOpenRequest),
            map(TunnelOpenAck::from_bytes, Packet::TunnelOpenAck),
            map(RegexSearchRequest::from_bytes, Packet::RegexSearchRequest),
            map(GenericData::from_bytes, Packet::GenericData),
            map(ServiceSearchRequest::from_bytes, Packet::ServiceSearchRequest),
            map(GroupRequest::from_bytes, Packet::GroupRequest),
            map(GroupSummaryResult::from_bytes, Packet::GroupSummaryResult),
            map(GroupDataResult::from_bytes, Packet::GroupDataResult),
        ))(input)
    }
}

impl ToBytes for Packet {
    fn to_bytes<'a>(&self, buf: (&'a mut [u8], usize)) -> Result<(&'a mut [u8], usize), GenError> {
        match *self {
            Packet::StringSearchRequest(ref p) => p.to_bytes(buf),
            Packet::FileSearchResult(ref p) => p.to_bytes(buf),
            Packet::TunnelOpenRequest(ref p) => p.to_bytes(buf),
            Packet::TunnelOpenAck(ref p) => p.to_bytes(buf),
            Packet::RegexSearchRequest(ref p) => p.to_bytes(buf),
            Packet::GenericData(ref p) => p.to_bytes(buf),
            Packet::ServiceSearchRequest(ref p) => p.to_bytes(buf),
            Packet::GroupRequest(ref p) => p.to_bytes(buf),
            Packet::GroupSummaryResult(ref p) => p.to_bytes(buf),
            Packet::GroupDataResult(ref p) => p.to_bytes(buf),
        }
    }
}

impl Packet {
    /// Subtype code carried as the first byte of the serialized form.
    pub fn subtype(&self) -> u8 {
        match *self {
            Packet::StringSearchRequest(_) => SUBTYPE_STRING_SEARCH_REQUEST,
            Packet::FileSearchResult(_) => SUBTYPE_FILE_SEARCH_RESULT,
            Packet::TunnelOpenRequest(_) => SUBTYPE_TUNNEL_OPEN_REQUEST,
            Packet::TunnelOpenAck(_) => SUBTYPE_TUNNEL_OPEN_ACK,
            Packet::RegexSearchRequest(_) => SUBTYPE_REGEX_SEARCH_REQUEST,
            Packet::GenericData(_) => SUBTYPE_GENERIC_DATA,
            Packet::ServiceSearchRequest(_) => SUBTYPE_SERVICE_SEARCH_REQUEST,
            Packet::GroupRequest(_) => SUBTYPE_GROUP_REQUEST,
            Packet::GroupSummaryResult(_) => SUBTYPE_GROUP_SUMMARY_RESULT,
            Packet::GroupDataResult(_) => SUBTYPE_GROUP_DATA_RESULT,
        }
    }

    /// Whether a subtype code belongs to the decodable packet family.
    /// Reserved codes are unknown on purpose.
    pub fn is_known_subtype(code: u8) -> bool {
        matches!(code,
            SUBTYPE_STRING_SEARCH_REQUEST
            | SUBTYPE_FILE_SEARCH_RESULT
            | SUBTYPE_TUNNEL_OPEN_REQUEST
            | SUBTYPE_TUNNEL_OPEN_ACK
            | SUBTYPE_REGEX_SEARCH_REQUEST
            | SUBTYPE_GENERIC_DATA
            | SUBTYPE_SERVICE_SEARCH_REQUEST
            | SUBTYPE_GROUP_REQUEST
            | SUBTYPE_GROUP_SUMMARY_RESULT
            | SUBTYPE_GROUP_DATA_RESULT
        )
    }

    /// Scheduling hint for the link layer. Never serialized.
    pub fn priority(&self) -> PacketPriority {
        match *self {
            Packet::StringSearchRequest(_)
            | Packet::RegexSearchRequest(_)
            | Packet::ServiceSearchRequest(_)
            | Packet::GroupRequest(_) => PacketPriority::Low,
            Packet::FileSearchResult(_)
            | Packet::GroupSummaryResult(_)
            | Packet::GroupDataResult(_) => PacketPriority::Default,
            Packet::TunnelOpenRequest(_)
            | Packet::TunnelOpenAck(_) => PacketPriority::High,
            Packet::GenericData(_) => PacketPriority::Default,
        }
    }
}

/// Parse a length-prefixed UTF-8 string: `u16` byte length + bytes.
pub(crate) fn parse_string(input: &[u8]) -> IResult<&[u8], String> {
    let (input, length) = be_u16(input)?;
    let (input, string) = nom::combinator::map_res(take(length), std::str::from_utf8)(input)?;
    Ok((input, string.to_string()))
}

/// Generate a length-prefixed UTF-8 string.
pub(crate) fn gen_string<'a>(buf: (&'a mut [u8], usize), string: &str) -> Result<(&'a mut [u8], usize), GenError> {
    do_gen!(buf,
        gen_cond!(string.len() > MAX_STRING_SIZE, |buf| gen_error(buf, 0)) >>
        gen_be_u16!(string.len() as u16) >>
        gen_slice!(string.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_reserved_subtypes_fail_closed() {
        // file transfer family is reserved and must not decode
        for code in [0x07, 0x08, 0x10, 0x11, 0x14, 0x15, 0x00, 0xff] {
            assert!(!Packet::is_known_subtype(code));
            let buf = [code, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
            assert!(Packet::from_bytes(&buf).is_err());
        }
    }

    #[test]
    fn packet_subtype_matches_leading_byte() {
        let packet = Packet::TunnelOpenAck(TunnelOpenAck {
            tunnel_id: 0x0123_4567,
            request_id: 0x89ab_cdef,
        });
        let mut buf = [0; 32];
        let (_, size) = packet.to_bytes((&mut buf, 0)).unwrap();
        assert_eq!(buf[0], packet.subtype());
        assert_eq!(size, 9);
    }

    encode_decode_test!(
        packet_string_search_request_encode_decode,
        Packet::StringSearchRequest(StringSearchRequest {
            request_id: 12345,
            depth: 1,
            keyword: "pineapple".to_string(),
        })
    );

    encode_decode_test!(
        packet_generic_data_encode_decode,
        Packet::GenericData(GenericData {
            tunnel_id: 42,
            payload: vec![42; 123],
        })
    );
}
