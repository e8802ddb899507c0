/*! Client service registry and local search dispatch.

Application services plug into the router through two narrow traits:
[`FileIndex`], the dataset string and regex searches run against, and
[`ClientService`], a per-service provider of keyword matches, group
data and hash ownership. Registration grants no forwarding authority,
routing and tunnel bookkeeping stay inside the router.
*/

use std::collections::HashMap;
use std::sync::Arc;

use terrapin_packet::*;

/// Local file dataset queried by string and regex searches and by
/// tunnel requests looking for a hash owner.
pub trait FileIndex: Send + Sync {
    /// Files whose metadata match a keyword.
    fn search_keyword(&self, keyword: &str) -> Vec<FileInfo>;
    /// Files whose metadata match a linearized regular expression.
    fn search_regex(&self, expr: &LinearizedExpression) -> Vec<FileInfo>;
    /// Whether this node can serve the content behind a hash.
    fn has_file(&self, hash: &Sha1Hash) -> bool;
}

/// A file index with no files. Useful for pure relay nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyFileIndex;

impl FileIndex for EmptyFileIndex {
    fn search_keyword(&self, _keyword: &str) -> Vec<FileInfo> {
        Vec::new()
    }

    fn search_regex(&self, _expr: &LinearizedExpression) -> Vec<FileInfo> {
        Vec::new()
    }

    fn has_file(&self, _hash: &Sha1Hash) -> bool {
        false
    }
}

/// An application service that answers service-routed searches out of
/// its own dataset. The router only ever sees this interface, never
/// the service's internal state.
pub trait ClientService: Send + Sync {
    /// Stable identifier the service is registered under. Carried by
    /// `ServiceSearchRequest` and `GroupRequest` packets.
    fn service_id(&self) -> u16;

    /// Answer a keyword search with summaries of matching groups.
    fn search(&self, _keyword: &str) -> Vec<GroupInfo> {
        Vec::new()
    }

    /// Answer a hashed-group-id lookup with an encrypted group blob.
    /// The blob is encrypted with the cleartext group id, unknown to
    /// relaying hops.
    fn group_data(&self, _hashed_group_id: &Sha1Hash) -> Option<Vec<u8>> {
        None
    }

    /// Whether this service owns the content behind a hash and can
    /// therefore terminate a tunnel for it.
    fn handles_hash(&self, _hash: &Sha1Hash) -> bool {
        false
    }
}

/// Maps service ids to their registered providers.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<u16, Arc<dyn ClientService>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> ServiceRegistry {
        ServiceRegistry::default()
    }

    /// Register a client service under its own id. A later
    /// registration with the same id replaces the earlier one.
    pub fn register(&mut self, service: Arc<dyn ClientService>) {
        self.services.insert(service.service_id(), service);
    }

    /// Look up the provider for a service id.
    pub fn get(&self, service_id: u16) -> Option<&Arc<dyn ClientService>> {
        self.services.get(&service_id)
    }

    /// Whether any registered service owns the content behind a hash.
    pub fn any_handles_hash(&self, hash: &Sha1Hash) -> bool {
        self.services.values().any(|service| service.handles_hash(hash))
    }
}

/// The local datasets a search request can run against.
pub struct LocalDatasets<'a> {
    /// File dataset for string and regex searches.
    pub file_index: &'a dyn FileIndex,
    /// Registered client services for service-routed searches.
    pub services: &'a ServiceRegistry,
}

/// Capability of every search request variant: run itself against the
/// local datasets and produce results. New search kinds plug in by
/// implementing this for their request type, the flood engine never
/// matches on variants itself.
pub trait LocalSearchable {
    /// Run the local match and build the corresponding results. The
    /// returned results carry the request id verbatim; their depth is
    /// set by the router afterwards.
    fn perform_local_search(&self, local: &LocalDatasets<'_>) -> Vec<SearchResult>;
}

impl LocalSearchable for StringSearchRequest {
    fn perform_local_search(&self, local: &LocalDatasets<'_>) -> Vec<SearchResult> {
        let results = local.file_index.search_keyword(&self.keyword);
        if results.is_empty() {
            Vec::new()
        } else {
            vec![SearchResult::File(FileSearchResult {
                request_id: self.request_id,
                depth: self.depth,
                results,
            })]
        }
    }
}

impl LocalSearchable for RegexSearchRequest {
    fn perform_local_search(&self, local: &LocalDatasets<'_>) -> Vec<SearchResult> {
        let results = local.file_index.search_regex(&self.expr);
        if results.is_empty() {
            Vec::new()
        } else {
            vec![SearchResult::File(FileSearchResult {
                request_id: self.request_id,
                depth: self.depth,
                results,
            })]
        }
    }
}

impl LocalSearchable for ServiceSearchRequest {
    fn perform_local_search(&self, local: &LocalDatasets<'_>) -> Vec<SearchResult> {
        let results = match local.services.get(self.service_id) {
            Some(service) => service.search(&self.keyword),
            None => Vec::new(),
        };
        if results.is_empty() {
            Vec::new()
        } else {
            vec![SearchResult::GroupSummary(GroupSummaryResult {
                request_id: self.request_id,
                depth: self.depth,
                results,
            })]
        }
    }
}

impl LocalSearchable for GroupRequest {
    fn perform_local_search(&self, local: &LocalDatasets<'_>) -> Vec<SearchResult> {
        local.services.get(self.service_id)
            .and_then(|service| service.group_data(&self.hashed_group_id))
            .map(|encrypted_group_data| SearchResult::GroupData(GroupDataResult {
                request_id: self.request_id,
                depth: self.depth,
                encrypted_group_data,
            }))
            .into_iter()
            .collect()
    }
}

impl LocalSearchable for SearchRequest {
    fn perform_local_search(&self, local: &LocalDatasets<'_>) -> Vec<SearchResult> {
        match *self {
            SearchRequest::String(ref p) => p.perform_local_search(local),
            SearchRequest::Regex(ref p) => p.perform_local_search(local),
            SearchRequest::Service(ref p) => p.perform_local_search(local),
            SearchRequest::Group(ref p) => p.perform_local_search(local),
        }
    }
}
