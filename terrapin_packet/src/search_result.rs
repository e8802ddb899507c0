/*! Grouping of the search result packet variants.
*/

use crate::file_search_result::FileSearchResult;
use crate::group_data_result::GroupDataResult;
use crate::group_summary_result::GroupSummaryResult;
use crate::Packet;

/** Any packet that answers a
[`SearchRequest`](./enum.SearchRequest.html) and travels back along the
reverse path.

Results support progressive truncation (`pop`) so that a relaying hop
can shed trailing entries when a request exceeds its result budget.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchResult {
    /// Files matching a string or regex search.
    File(FileSearchResult),
    /// Group summaries matching a service search.
    GroupSummary(GroupSummaryResult),
    /// Encrypted group data answering a group request.
    GroupData(GroupDataResult),
}

impl SearchResult {
    /// Request id of the search this result answers.
    pub fn request_id(&self) -> u32 {
        match *self {
            SearchResult::File(ref p) => p.request_id,
            SearchResult::GroupSummary(ref p) => p.request_id,
            SearchResult::GroupData(ref p) => p.request_id,
        }
    }

    /// Obfuscated depth reported by the answering node.
    pub fn depth(&self) -> u16 {
        match *self {
            SearchResult::File(ref p) => p.depth,
            SearchResult::GroupSummary(ref p) => p.depth,
            SearchResult::GroupData(ref p) => p.depth,
        }
    }

    /// Overwrite the obfuscated depth. Done by the answering node.
    pub fn set_depth(&mut self, depth: u16) {
        match *self {
            SearchResult::File(ref mut p) => p.depth = depth,
            SearchResult::GroupSummary(ref mut p) => p.depth = depth,
            SearchResult::GroupData(ref mut p) => p.depth = depth,
        }
    }

    /// Number of entries carried by this result.
    pub fn count(&self) -> u32 {
        match *self {
            SearchResult::File(ref p) => p.count(),
            SearchResult::GroupSummary(ref p) => p.count(),
            SearchResult::GroupData(ref p) => p.count(),
        }
    }

    /// Drop the trailing entry.
    pub fn pop(&mut self) {
        match *self {
            SearchResult::File(ref mut p) => p.pop(),
            SearchResult::GroupSummary(ref mut p) => p.pop(),
            SearchResult::GroupData(ref mut p) => p.pop(),
        }
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        match *self {
            SearchResult::File(ref mut p) => p.clear(),
            SearchResult::GroupSummary(ref mut p) => p.clear(),
            SearchResult::GroupData(ref mut p) => p.clear(),
        }
    }
}

impl From<SearchResult> for Packet {
    fn from(result: SearchResult) -> Packet {
        match result {
            SearchResult::File(p) => Packet::FileSearchResult(p),
            SearchResult::GroupSummary(p) => Packet::GroupSummaryResult(p),
            SearchResult::GroupData(p) => Packet::GroupDataResult(p),
        }
    }
}

impl Packet {
    /// View this packet as a search result if it is one.
    pub fn into_search_result(self) -> Option<SearchResult> {
        match self {
            Packet::FileSearchResult(p) => Some(SearchResult::File(p)),
            Packet::GroupSummaryResult(p) => Some(SearchResult::GroupSummary(p)),
            Packet::GroupDataResult(p) => Some(SearchResult::GroupData(p)),
            _ => None,
        }
    }
}
