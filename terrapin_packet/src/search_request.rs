/*! Grouping of the search request packet variants.
*/

use crate::group_request::GroupRequest;
use crate::regex_search_request::RegexSearchRequest;
use crate::service_search_request::ServiceSearchRequest;
use crate::string_search_request::StringSearchRequest;
use crate::Packet;

/** Any packet that is flooded as a search and answered with a
[`SearchResult`](./enum.SearchResult.html).

All variants share the request id / depth pair; the rest is
variant-specific match input. Cloning a request is cheap enough for
pass-through retransmission, the flood engine never re-parses.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchRequest {
    /// Keyword search against the file index.
    String(StringSearchRequest),
    /// Regex search against the file index.
    Regex(RegexSearchRequest),
    /// Keyword search against a registered client service.
    Service(ServiceSearchRequest),
    /// Hashed-group-id lookup against a registered client service.
    Group(GroupRequest),
}

impl SearchRequest {
    /// Request id, stable across hops.
    pub fn request_id(&self) -> u32 {
        match *self {
            SearchRequest::String(ref p) => p.request_id,
            SearchRequest::Regex(ref p) => p.request_id,
            SearchRequest::Service(ref p) => p.request_id,
            SearchRequest::Group(ref p) => p.request_id,
        }
    }

    /// Current flood depth.
    pub fn depth(&self) -> u16 {
        match *self {
            SearchRequest::String(ref p) => p.depth,
            SearchRequest::Regex(ref p) => p.depth,
            SearchRequest::Service(ref p) => p.depth,
            SearchRequest::Group(ref p) => p.depth,
        }
    }

    /// Overwrite the request id. Done once, at origination.
    pub fn set_request_id(&mut self, request_id: u32) {
        match *self {
            SearchRequest::String(ref mut p) => p.request_id = request_id,
            SearchRequest::Regex(ref mut p) => p.request_id = request_id,
            SearchRequest::Service(ref mut p) => p.request_id = request_id,
            SearchRequest::Group(ref mut p) => p.request_id = request_id,
        }
    }

    /// Overwrite the flood depth. Done by every forwarding hop.
    pub fn set_depth(&mut self, depth: u16) {
        match *self {
            SearchRequest::String(ref mut p) => p.depth = depth,
            SearchRequest::Regex(ref mut p) => p.depth = depth,
            SearchRequest::Service(ref mut p) => p.depth = depth,
            SearchRequest::Group(ref mut p) => p.depth = depth,
        }
    }

    /// Id of the client service addressed by this request, if any.
    pub fn service_id(&self) -> Option<u16> {
        match *self {
            SearchRequest::Service(ref p) => Some(p.service_id),
            SearchRequest::Group(ref p) => Some(p.service_id),
            _ => None,
        }
    }

    /// Textual preview of what the request matches. Used for local
    /// filtering and logging only, never transmitted.
    pub fn keywords(&self) -> String {
        match *self {
            SearchRequest::String(ref p) => p.keyword.clone(),
            SearchRequest::Regex(ref p) => format!("regex({} tokens)", p.expr.tokens.len()),
            SearchRequest::Service(ref p) => p.keyword.clone(),
            SearchRequest::Group(ref p) => p.hashed_group_id.to_string(),
        }
    }
}

impl From<SearchRequest> for Packet {
    fn from(request: SearchRequest) -> Packet {
        match request {
            SearchRequest::String(p) => Packet::StringSearchRequest(p),
            SearchRequest::Regex(p) => Packet::RegexSearchRequest(p),
            SearchRequest::Service(p) => Packet::ServiceSearchRequest(p),
            SearchRequest::Group(p) => Packet::GroupRequest(p),
        }
    }
}

impl Packet {
    /// View this packet as a search request if it is one.
    pub fn into_search_request(self) -> Option<SearchRequest> {
        match self {
            Packet::StringSearchRequest(p) => Some(SearchRequest::String(p)),
            Packet::RegexSearchRequest(p) => Some(SearchRequest::Regex(p)),
            Packet::ServiceSearchRequest(p) => Some(SearchRequest::Service(p)),
            Packet::GroupRequest(p) => Some(SearchRequest::Group(p)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_accessors() {
        let mut request = SearchRequest::String(StringSearchRequest {
            request_id: 5,
            depth: 1,
            keyword: "pineapple".to_string(),
        });
        assert_eq!(request.request_id(), 5);
        assert_eq!(request.depth(), 1);
        assert_eq!(request.service_id(), None);
        assert_eq!(request.keywords(), "pineapple");

        request.set_request_id(6);
        request.set_depth(2);
        assert_eq!(request.request_id(), 6);
        assert_eq!(request.depth(), 2);
    }

    #[test]
    fn search_request_packet_round_trip() {
        let request = SearchRequest::Service(ServiceSearchRequest {
            request_id: 9,
            depth: 3,
            service_id: 0x0215,
            keyword: "retro".to_string(),
        });
        assert_eq!(request.service_id(), Some(0x0215));
        let packet = Packet::from(request.clone());
        assert_eq!(packet.into_search_request(), Some(request));
    }

    #[test]
    fn non_search_packet_is_not_a_search_request() {
        let packet = Packet::TunnelOpenAck(crate::TunnelOpenAck {
            tunnel_id: 1,
            request_id: 2,
        });
        assert_eq!(packet.into_search_request(), None);
    }
}
