/*! The routing authority of a terrapin node.

The [`Router`](./struct.Router.html) owns every routing table: the
search cache with per-request reverse paths, the tunnel request cache,
the pending handshakes of locally opened tunnels and the tunnel table
itself. Neighbour links feed it decoded packets, it answers from the
local datasets, forwards floods, relays results and payloads along the
recorded paths, and expires everything on a periodic wakeup.

All tables live behind one lock, so packet handling is serialized and
list methods return consistent snapshots.
*/

pub mod errors;
pub mod tunnel;

pub use errors::*;
pub use tunnel::*;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::channel::mpsc;
use futures::SinkExt;
use lru::LruCache;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use terrapin_packet::*;

use crate::io_tokio::maybe_send_unbounded;
use crate::registry::{ClientService, EmptyFileIndex, FileIndex, LocalDatasets, LocalSearchable, ServiceRegistry};
use crate::time::*;
use crate::utils::gen_id;

/// Search and tunnel requests arriving with this depth are answered
/// but no longer forwarded.
pub const MAX_SEARCH_DEPTH: u16 = 6;
/// Width of the interval obfuscated depths are drawn from.
pub const DEPTH_OBFUSCATION_SPREAD: u16 = 6;
/// Total number of result entries relayed per search request.
pub const MAX_SEARCH_RESULTS: u32 = 100;
/// How long a search cache entry keeps its reverse path alive.
pub const SEARCH_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// How long a locally opened tunnel waits for the first ack.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);
/// Tunnels that carried no stamping packet for this long are torn
/// down.
pub const TUNNEL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// Period of the maintenance wakeup.
pub const MAIN_LOOP_INTERVAL: Duration = Duration::from_secs(1);
/// Capacity of the request id dedup caches.
pub const REQUEST_CACHE_CAPACITY: usize = 16384;
/// Number of bytes of the local tunnel id secret.
pub const SECRET_BYTES_SIZE: usize = 32;

/// Opaque handle of an authenticated neighbour link. Assigned by the
/// connection layer, never serialized.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LinkId(u64);

impl LinkId {
    /// Wrap a connection-layer link number.
    pub fn new(id: u64) -> LinkId {
        LinkId(id)
    }
}

impl From<u64> for LinkId {
    fn from(id: u64) -> LinkId {
        LinkId(id)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shorthand for the channel packets leave the router through.
type Tx = mpsc::Sender<(Packet, LinkId)>;

/// Search cache entry recording where a request came from and how
/// many result entries were already relayed for it.
#[derive(Clone, Debug)]
pub struct SearchRequestInfo {
    /// Link the request arrived on, `None` if this node originated
    /// it. Results flow back through here.
    pub from: Option<LinkId>,
    /// Time the request was first seen.
    pub time: Instant,
    /// Depth the request carried on arrival.
    pub depth: u16,
    /// Textual preview of the match input, for diagnostics.
    pub keywords: String,
    /// Result entries relayed so far, bounded by the result budget.
    pub result_count: u32,
}

/// Tunnel request cache entry recording the reverse path for acks.
#[derive(Clone, Debug)]
struct TunnelRequestInfo {
    from: Option<LinkId>,
    time: Instant,
}

/// Snapshot of one tunnel table entry.
#[derive(Clone, Debug)]
pub struct TunnelStats {
    /// Id of the tunnel.
    pub tunnel_id: u32,
    /// Hash the tunnel was opened for, known at endpoints only.
    pub hash: Option<Sha1Hash>,
    /// Whether the tunnel terminates at this node.
    pub is_endpoint: bool,
    /// Time since the last stamping packet.
    pub idle: Duration,
}

/// Policy values of a router. The defaults are the protocol-level
/// constants.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Depth at which floods stop being forwarded.
    pub max_search_depth: u16,
    /// Width of the depth obfuscation interval.
    pub depth_obfuscation_spread: u16,
    /// Per-request result entry budget.
    pub max_search_results: u32,
    /// Lifetime of search and tunnel request cache entries.
    pub search_request_timeout: Duration,
    /// How long a locally opened tunnel waits for the first ack.
    pub handshake_timeout: Duration,
    /// Idle time after which a tunnel is torn down.
    pub tunnel_idle_timeout: Duration,
    /// Period of the maintenance wakeup.
    pub main_loop_interval: Duration,
    /// Capacity of the request id dedup caches.
    pub request_cache_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> RouterConfig {
        RouterConfig {
            max_search_depth: MAX_SEARCH_DEPTH,
            depth_obfuscation_spread: DEPTH_OBFUSCATION_SPREAD,
            max_search_results: MAX_SEARCH_RESULTS,
            search_request_timeout: SEARCH_REQUEST_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            tunnel_idle_timeout: TUNNEL_IDLE_TIMEOUT,
            main_loop_interval: MAIN_LOOP_INTERVAL,
            request_cache_capacity: REQUEST_CACHE_CAPACITY,
        }
    }
}

/// Mutable routing tables, all behind the router lock.
struct RouterState {
    /// Links packets may be forwarded to.
    neighbours: HashSet<LinkId>,
    /// Recently seen search requests keyed by request id.
    search_cache: LruCache<u32, SearchRequestInfo>,
    /// Recently seen tunnel requests keyed by request id.
    tunnel_requests: LruCache<u32, TunnelRequestInfo>,
    /// Handshakes of tunnels this node opened, keyed by request id.
    pending_tunnels: HashMap<u32, PendingTunnel>,
    /// Active tunnels keyed by tunnel id.
    tunnels: HashMap<u32, TunnelEntry>,
    /// File dataset searches and tunnel requests are matched against.
    file_index: Arc<dyn FileIndex>,
    /// Registered client services.
    services: ServiceRegistry,
    /// Sink for results of searches this node originated.
    search_sink: Option<mpsc::UnboundedSender<SearchResult>>,
    /// Sink for tunnel lifecycle and payload events.
    tunnel_sink: Option<mpsc::UnboundedSender<TunnelEvent>>,
}

/** The routing engine.

Cheap to clone, all clones share the same tables. The connection layer
calls [`handle_packet`](#method.handle_packet) for every decoded packet
and drains the outgoing `(Packet, LinkId)` channel; the application
calls the search and tunnel methods and subscribes to the sinks.
*/
#[derive(Clone)]
pub struct Router {
    /// Sink for outgoing packets with the link to send them on.
    tx: Tx,
    /// Secret the local tunnel id print is derived from.
    secret_bytes: [u8; SECRET_BYTES_SIZE],
    /// Policy values.
    config: RouterConfig,
    /// Shared routing tables.
    state: Arc<RwLock<RouterState>>,
}

impl Router {
    /// Create a router with default policy values.
    pub fn new(tx: Tx) -> Router {
        Router::with_config(tx, RouterConfig::default())
    }

    /// Create a router with custom policy values.
    pub fn with_config(tx: Tx, config: RouterConfig) -> Router {
        let capacity = NonZeroUsize::new(config.request_cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Router {
            tx,
            secret_bytes: rand::thread_rng().gen(),
            config,
            state: Arc::new(RwLock::new(RouterState {
                neighbours: HashSet::new(),
                search_cache: LruCache::new(capacity),
                tunnel_requests: LruCache::new(capacity),
                pending_tunnels: HashMap::new(),
                tunnels: HashMap::new(),
                file_index: Arc::new(EmptyFileIndex),
                services: ServiceRegistry::new(),
                search_sink: None,
                tunnel_sink: None,
            })),
        }
    }

    /// Replace the file dataset searches run against.
    pub async fn set_file_index(&self, file_index: Arc<dyn FileIndex>) {
        self.state.write().await.file_index = file_index;
    }

    /// Register a client service under its own id.
    pub async fn register_service(&self, service: Arc<dyn ClientService>) {
        self.state.write().await.services.register(service);
    }

    /// Set the sink results of locally originated searches go to.
    pub async fn set_search_result_sink(&self, sink: mpsc::UnboundedSender<SearchResult>) {
        self.state.write().await.search_sink = Some(sink);
    }

    /// Set the sink tunnel lifecycle and payload events go to.
    pub async fn set_tunnel_sink(&self, sink: mpsc::UnboundedSender<TunnelEvent>) {
        self.state.write().await.tunnel_sink = Some(sink);
    }

    /// Start forwarding packets to a neighbour link.
    pub async fn add_neighbour(&self, link: LinkId) {
        self.state.write().await.neighbours.insert(link);
    }

    /** Forget a neighbour link and every routing entry referencing
    it. Reverse paths through the link are gone, so the entries are
    useless; tunnels attached to it are torn down.
    */
    pub async fn remove_neighbour(&self, link: LinkId) -> Result<(), HandlePacketError> {
        let mut state = self.state.write().await;
        state.neighbours.remove(&link);

        let stale: Vec<u32> = state.search_cache.iter()
            .filter(|(_, info)| info.from == Some(link))
            .map(|(&request_id, _)| request_id)
            .collect();
        for request_id in stale {
            state.search_cache.pop(&request_id);
        }

        let stale: Vec<u32> = state.tunnel_requests.iter()
            .filter(|(_, info)| info.from == Some(link))
            .map(|(&request_id, _)| request_id)
            .collect();
        for request_id in stale {
            state.tunnel_requests.pop(&request_id);
        }

        let stale: Vec<u32> = state.tunnels.iter()
            .filter(|(_, entry)| entry.references(link))
            .map(|(&tunnel_id, _)| tunnel_id)
            .collect();
        for tunnel_id in stale {
            if let Some(entry) = state.tunnels.remove(&tunnel_id) {
                debug!("Tearing down tunnel {:08x} after losing link {}", tunnel_id, link);
                if entry.is_endpoint() {
                    maybe_send_unbounded(state.tunnel_sink.clone(), TunnelEvent::Closed { tunnel_id })
                        .await
                        .map_err(|error| HandlePacketError::Notify { error })?;
                }
            }
        }
        Ok(())
    }

    /// Snapshot of the search cache.
    pub async fn list_searches(&self) -> Vec<(u32, SearchRequestInfo)> {
        self.state.read().await.search_cache.iter()
            .map(|(&request_id, info)| (request_id, info.clone()))
            .collect()
    }

    /// Snapshot of the tunnel table.
    pub async fn list_tunnels(&self) -> Vec<TunnelStats> {
        self.state.read().await.tunnels.iter()
            .map(|(&tunnel_id, entry)| TunnelStats {
                tunnel_id,
                hash: entry.hash(),
                is_endpoint: entry.is_endpoint(),
                idle: entry.idle_for(),
            })
            .collect()
    }

    /** Originate a search. The request gets a fresh request id and
    depth 1 and is flooded to every neighbour. Matching results arrive
    on the search result sink carrying the returned id.
    */
    pub async fn search(&self, mut request: SearchRequest) -> Result<u32, SearchError> {
        let mut state = self.state.write().await;
        let request_id = gen_id();
        request.set_request_id(request_id);
        request.set_depth(1);
        state.search_cache.put(request_id, SearchRequestInfo {
            from: None,
            time: clock_now(),
            depth: 1,
            keywords: request.keywords(),
            result_count: 0,
        });
        debug!("Originating search {:08x} for {:?}", request_id, request.keywords());
        self.flood(&state, None, Packet::from(request)).await
            .map_err(|error| SearchError::SendTo { error })?;
        Ok(request_id)
    }

    /** Originate a tunnel request for a hash. Acknowledgements turn
    into [`TunnelEvent::Established`](./enum.TunnelEvent.html) events
    carrying the returned request id; a distinct tunnel is created per
    distinct acknowledged tunnel id.
    */
    pub async fn open_tunnel(&self, hash: Sha1Hash) -> Result<u32, TunnelError> {
        let mut state = self.state.write().await;
        let request_id = gen_id();
        let partial_tunnel_id = gen_id();
        state.tunnel_requests.put(request_id, TunnelRequestInfo {
            from: None,
            time: clock_now(),
        });
        state.pending_tunnels.insert(request_id, PendingTunnel {
            hash,
            state: HandshakeState::AwaitingAck,
            time: clock_now(),
        });
        debug!("Originating tunnel request {:08x} for {}", request_id, hash);
        let packet = Packet::TunnelOpenRequest(TunnelOpenRequest {
            file_hash: hash,
            request_id,
            partial_tunnel_id,
            depth: 1,
        });
        self.flood(&state, None, packet).await
            .map_err(|error| TunnelError::SendTo { error })?;
        Ok(request_id)
    }

    /// Inject a payload into a tunnel terminating at this node.
    pub async fn send_data(&self, tunnel_id: u32, payload: Vec<u8>) -> Result<(), TunnelError> {
        if payload.len() > MAX_GENERIC_PAYLOAD_SIZE {
            return Err(TunnelError::PayloadSize { size: payload.len() });
        }
        let mut state = self.state.write().await;
        let link = match state.tunnels.get_mut(&tunnel_id) {
            None => return Err(TunnelError::NotFound { tunnel_id }),
            Some(entry) => match entry.peer_link() {
                None => return Err(TunnelError::NotEndpoint { tunnel_id }),
                Some(link) => {
                    entry.stamp();
                    link
                }
            },
        };
        self.send_to(link, Packet::GenericData(GenericData { tunnel_id, payload })).await
            .map_err(|error| TunnelError::SendTo { error })
    }

    /// Remove a tunnel from the local table. Other hops notice via
    /// the idle timeout, there is no teardown packet.
    pub async fn close_tunnel(&self, tunnel_id: u32) -> Result<(), TunnelError> {
        let mut state = self.state.write().await;
        if state.tunnels.remove(&tunnel_id).is_none() {
            return Err(TunnelError::NotFound { tunnel_id });
        }
        maybe_send_unbounded(state.tunnel_sink.clone(), TunnelEvent::Closed { tunnel_id }).await
            .map_err(|error| TunnelError::Notify { error })
    }

    /// Handle a decoded packet that arrived on a neighbour link.
    pub async fn handle_packet(&self, packet: Packet, from: LinkId) -> Result<(), HandlePacketError> {
        match packet {
            Packet::StringSearchRequest(packet) =>
                self.handle_search_request(SearchRequest::String(packet), from).await,
            Packet::RegexSearchRequest(packet) =>
                self.handle_search_request(SearchRequest::Regex(packet), from).await,
            Packet::ServiceSearchRequest(packet) =>
                self.handle_search_request(SearchRequest::Service(packet), from).await,
            Packet::GroupRequest(packet) =>
                self.handle_search_request(SearchRequest::Group(packet), from).await,
            Packet::FileSearchResult(packet) =>
                self.handle_search_result(SearchResult::File(packet), from).await,
            Packet::GroupSummaryResult(packet) =>
                self.handle_search_result(SearchResult::GroupSummary(packet), from).await,
            Packet::GroupDataResult(packet) =>
                self.handle_search_result(SearchResult::GroupData(packet), from).await,
            Packet::TunnelOpenRequest(packet) =>
                self.handle_tunnel_request(packet, from).await,
            Packet::TunnelOpenAck(packet) =>
                self.handle_tunnel_ack(packet, from).await,
            Packet::GenericData(packet) =>
                self.handle_generic_data(packet, from).await,
        }
    }

    /** Run the maintenance loop forever: wake up every
    [`main_loop_interval`](./struct.RouterConfig.html) and expire stale
    cache entries, abandoned handshakes and idle tunnels.
    */
    pub async fn run(&self) -> Result<(), RunError> {
        let interval = self.config.main_loop_interval;
        let mut wakeups = tokio::time::interval(interval);
        loop {
            wakeups.tick().await;
            trace!("Router wake up");
            let loop_future = self.main_loop();
            match tokio::time::timeout(interval, loop_future).await {
                Err(elapsed) => return Err(RunError::Timeout(elapsed)),
                Ok(result) => result?,
            }
        }
    }

    /// One maintenance iteration.
    async fn main_loop(&self) -> Result<(), RunError> {
        let mut state = self.state.write().await;

        let expired: Vec<u32> = state.search_cache.iter()
            .filter(|(_, info)| clock_elapsed(info.time) >= self.config.search_request_timeout)
            .map(|(&request_id, _)| request_id)
            .collect();
        for request_id in expired {
            trace!("Search request {:08x} expired", request_id);
            state.search_cache.pop(&request_id);
        }

        let expired: Vec<u32> = state.tunnel_requests.iter()
            .filter(|(_, info)| clock_elapsed(info.time) >= self.config.search_request_timeout)
            .map(|(&request_id, _)| request_id)
            .collect();
        for request_id in expired {
            state.tunnel_requests.pop(&request_id);
        }

        let handshake_timeout = self.config.handshake_timeout;
        let request_timeout = self.config.search_request_timeout;
        let mut failed = Vec::new();
        state.pending_tunnels.retain(|&request_id, pending| {
            match pending.state {
                HandshakeState::AwaitingAck if clock_elapsed(pending.time) >= handshake_timeout => {
                    // keep a closed marker around so a late ack is
                    // ignored instead of resurrecting the handshake
                    pending.state = HandshakeState::Closed;
                    failed.push(request_id);
                    true
                }
                _ => clock_elapsed(pending.time) < request_timeout,
            }
        });

        let idle_timeout = self.config.tunnel_idle_timeout;
        let mut closed = Vec::new();
        state.tunnels.retain(|&tunnel_id, entry| {
            if entry.is_idle(idle_timeout) {
                debug!("Tearing down idle tunnel {:08x}", tunnel_id);
                if entry.is_endpoint() {
                    closed.push(tunnel_id);
                }
                false
            } else {
                true
            }
        });

        let sink = state.tunnel_sink.clone();
        for request_id in failed {
            maybe_send_unbounded(sink.clone(), TunnelEvent::Failed { request_id }).await
                .map_err(|error| RunError::Notify { error })?;
        }
        for tunnel_id in closed {
            maybe_send_unbounded(sink.clone(), TunnelEvent::Closed { tunnel_id }).await
                .map_err(|error| RunError::Notify { error })?;
        }
        Ok(())
    }

    /** Handle a search request flooded by a neighbour: suppress
    duplicates, record the reverse path, answer from the local
    datasets with an obfuscated depth, and forward deeper while the
    depth budget lasts.
    */
    async fn handle_search_request(&self, request: SearchRequest, from: LinkId) -> Result<(), HandlePacketError> {
        let mut state = self.state.write().await;
        let request_id = request.request_id();

        if state.search_cache.contains(&request_id) {
            trace!("Dropping already seen search request {:08x}", request_id);
            return Ok(());
        }
        state.search_cache.put(request_id, SearchRequestInfo {
            from: Some(from),
            time: clock_now(),
            depth: request.depth(),
            keywords: request.keywords(),
            result_count: 0,
        });

        let results = {
            let local = LocalDatasets {
                file_index: state.file_index.as_ref(),
                services: &state.services,
            };
            request.perform_local_search(&local)
        };
        for mut result in results {
            result.set_depth(self.obfuscate_depth(request.depth()));
            let keep = match state.search_cache.get_mut(&request_id) {
                Some(info) => apply_result_budget(info, &mut result, self.config.max_search_results),
                None => false,
            };
            if keep {
                self.send_to(from, Packet::from(result)).await
                    .map_err(|error| HandlePacketError::SendTo { error })?;
            }
        }

        if request.depth() < self.config.max_search_depth {
            let mut forwarded = request;
            forwarded.set_depth(forwarded.depth() + 1);
            self.flood(&state, Some(from), Packet::from(forwarded)).await
                .map_err(|error| HandlePacketError::SendTo { error })?;
        } else {
            trace!("Search request {:08x} exhausted its depth budget", request_id);
        }
        Ok(())
    }

    /** Handle a search result travelling back along the reverse path.
    Results for unknown requests are dropped, the rest is truncated to
    the remaining per-request budget and relayed one hop back or
    handed to the local subscriber.
    */
    async fn handle_search_result(&self, mut result: SearchResult, from: LinkId) -> Result<(), HandlePacketError> {
        let mut state = self.state.write().await;
        let request_id = result.request_id();
        let max_search_results = self.config.max_search_results;

        let (back, keep) = match state.search_cache.get_mut(&request_id) {
            None => {
                trace!("Dropping search result for unknown request {:08x} from link {}", request_id, from);
                return Ok(());
            }
            Some(info) => (info.from, apply_result_budget(info, &mut result, max_search_results)),
        };
        if !keep {
            trace!("Search request {:08x} exhausted its result budget", request_id);
            return Ok(());
        }
        match back {
            Some(link) => self.send_to(link, Packet::from(result)).await
                .map_err(|error| HandlePacketError::SendTo { error }),
            None => maybe_send_unbounded(state.search_sink.clone(), result).await
                .map_err(|error| HandlePacketError::Notify { error }),
        }
    }

    /** Handle a tunnel request flooded by a neighbour. If the local
    datasets own the hash the request is acknowledged with a tunnel id
    only this node could derive and is not forwarded; otherwise it is
    flooded deeper while the depth budget lasts.
    */
    async fn handle_tunnel_request(&self, request: TunnelOpenRequest, from: LinkId) -> Result<(), HandlePacketError> {
        let mut state = self.state.write().await;

        if state.tunnel_requests.contains(&request.request_id) {
            trace!("Dropping already seen tunnel request {:08x}", request.request_id);
            return Ok(());
        }
        state.tunnel_requests.put(request.request_id, TunnelRequestInfo {
            from: Some(from),
            time: clock_now(),
        });

        let owns = state.file_index.has_file(&request.file_hash)
            || state.services.any_handles_hash(&request.file_hash);
        if owns {
            let tunnel_id = request.partial_tunnel_id ^ self.local_print(&request.file_hash);
            if state.tunnels.contains_key(&tunnel_id) {
                warn!("Tunnel id collision on request {:08x}, dropping", request.request_id);
                return Ok(());
            }
            debug!("Acknowledging tunnel request {:08x} with tunnel {:08x}", request.request_id, tunnel_id);
            state.tunnels.insert(tunnel_id, TunnelEntry::destination_endpoint(from, request.file_hash));
            let ack = Packet::TunnelOpenAck(TunnelOpenAck {
                tunnel_id,
                request_id: request.request_id,
            });
            return self.send_to(from, ack).await
                .map_err(|error| HandlePacketError::SendTo { error });
        }

        if request.depth < self.config.max_search_depth {
            let forwarded = TunnelOpenRequest {
                depth: request.depth + 1,
                ..request
            };
            self.flood(&state, Some(from), Packet::TunnelOpenRequest(forwarded)).await
                .map_err(|error| HandlePacketError::SendTo { error })?;
        } else {
            trace!("Tunnel request {:08x} exhausted its depth budget", request.request_id);
        }
        Ok(())
    }

    /** Handle a tunnel acknowledgement travelling back along the
    reverse path. A relaying hop records a tunnel entry between the
    two links and forwards; the originating node turns it into an
    established tunnel and notifies the subscriber.
    */
    async fn handle_tunnel_ack(&self, ack: TunnelOpenAck, from: LinkId) -> Result<(), HandlePacketError> {
        let mut state = self.state.write().await;

        let back = match state.tunnel_requests.get(&ack.request_id) {
            None => {
                trace!("Dropping tunnel ack for unknown request {:08x} from link {}", ack.request_id, from);
                return Ok(());
            }
            Some(info) => info.from,
        };
        if state.tunnels.contains_key(&ack.tunnel_id) {
            trace!("Dropping duplicate ack for tunnel {:08x}", ack.tunnel_id);
            return Ok(());
        }

        match back {
            None => {
                let hash = match state.pending_tunnels.get_mut(&ack.request_id) {
                    Some(pending) if pending.state != HandshakeState::Closed => {
                        pending.state = HandshakeState::Established;
                        pending.hash
                    }
                    _ => {
                        trace!("Dropping tunnel ack for abandoned request {:08x}", ack.request_id);
                        return Ok(());
                    }
                };
                debug!("Tunnel {:08x} established for request {:08x}", ack.tunnel_id, ack.request_id);
                state.tunnels.insert(ack.tunnel_id, TunnelEntry::origin_endpoint(from, hash));
                let event = TunnelEvent::Established {
                    request_id: ack.request_id,
                    tunnel_id: ack.tunnel_id,
                    hash,
                };
                maybe_send_unbounded(state.tunnel_sink.clone(), event).await
                    .map_err(|error| HandlePacketError::Notify { error })
            }
            Some(back) => {
                state.tunnels.insert(ack.tunnel_id, TunnelEntry::relay(back, from));
                self.send_to(back, Packet::TunnelOpenAck(ack)).await
                    .map_err(|error| HandlePacketError::SendTo { error })
            }
        }
    }

    /** Handle a generic data packet: stamp the tunnel, derive the
    travel direction from the arrival link and either relay one hop
    further or hand the payload to the local subscriber.
    */
    async fn handle_generic_data(&self, packet: GenericData, from: LinkId) -> Result<(), HandlePacketError> {
        let mut state = self.state.write().await;

        let (direction, out) = match state.tunnels.get_mut(&packet.tunnel_id) {
            None => {
                trace!("Dropping data for unknown tunnel {:08x}", packet.tunnel_id);
                return Ok(());
            }
            Some(entry) => {
                let direction = match entry.direction_from(from) {
                    None => {
                        warn!("Link {} is not part of tunnel {:08x}, dropping data", from, packet.tunnel_id);
                        return Ok(());
                    }
                    Some(direction) => direction,
                };
                if packet.should_stamp() {
                    entry.stamp();
                }
                (direction, entry.link_toward(direction))
            }
        };

        match out {
            Some(link) => self.send_to(link, Packet::GenericData(packet)).await
                .map_err(|error| HandlePacketError::SendTo { error }),
            None => {
                let event = TunnelEvent::Data {
                    tunnel_id: packet.tunnel_id,
                    direction,
                    payload: packet.payload,
                };
                maybe_send_unbounded(state.tunnel_sink.clone(), event).await
                    .map_err(|error| HandlePacketError::Notify { error })
            }
        }
    }

    /// Send a packet to a neighbour link.
    async fn send_to(&self, link: LinkId, packet: Packet) -> Result<(), mpsc::SendError> {
        self.tx.clone().send((packet, link)).await
    }

    /// Send a packet to every neighbour except `exclude`.
    async fn flood(&self, state: &RouterState, exclude: Option<LinkId>, packet: Packet) -> Result<(), mpsc::SendError> {
        for &link in &state.neighbours {
            if Some(link) == exclude {
                continue;
            }
            self.send_to(link, packet.clone()).await?;
        }
        Ok(())
    }

    /// Depth an outgoing result reports. A true depth of 1 means the
    /// peer is adjacent and is reported as is, anything deeper is
    /// drawn uniformly from an interval that overlaps other depths.
    fn obfuscate_depth(&self, depth: u16) -> u16 {
        if depth <= 1 {
            1
        } else {
            let upper = depth.saturating_add(self.config.depth_obfuscation_spread);
            rand::thread_rng().gen_range(2..=upper)
        }
    }

    /// Local 32-bit print of a hash. Deterministic per node, not
    /// predictable by others, so acks for the same hash from
    /// different nodes carry different tunnel ids.
    fn local_print(&self, hash: &Sha1Hash) -> u32 {
        let mut hasher = Sha256::new();
        hasher.update(self.secret_bytes);
        hasher.update(hash.as_bytes());
        let digest = hasher.finalize();
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

/// Truncate a result to the remaining budget of its request and
/// account for what is left. Returns whether anything survives.
fn apply_result_budget(info: &mut SearchRequestInfo, result: &mut SearchResult, max_search_results: u32) -> bool {
    let allowed = max_search_results.saturating_sub(info.result_count);
    if allowed == 0 {
        return false;
    }
    while result.count() > allowed {
        result.pop();
    }
    info.result_count += result.count();
    result.count() > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;

    type Rx = mpsc::Receiver<(Packet, LinkId)>;

    fn create_router() -> (Router, Rx) {
        let (tx, rx) = mpsc::channel(32);
        (Router::new(tx), rx)
    }

    fn create_router_with_config(config: RouterConfig) -> (Router, Rx) {
        let (tx, rx) = mpsc::channel(32);
        (Router::with_config(tx, config), rx)
    }

    async fn next_packet(rx: &mut Rx) -> (Packet, LinkId) {
        rx.next().await.unwrap()
    }

    fn pineapple_file() -> FileInfo {
        FileInfo {
            hash: Sha1Hash::new([0x11; 20]),
            name: "pineapple.png".to_string(),
            size: 1024,
        }
    }

    struct SingleFileIndex {
        file: FileInfo,
    }

    impl FileIndex for SingleFileIndex {
        fn search_keyword(&self, keyword: &str) -> Vec<FileInfo> {
            if self.file.name.contains(keyword) {
                vec![self.file.clone()]
            } else {
                Vec::new()
            }
        }

        fn search_regex(&self, _expr: &LinearizedExpression) -> Vec<FileInfo> {
            Vec::new()
        }

        fn has_file(&self, hash: &Sha1Hash) -> bool {
            &self.file.hash == hash
        }
    }

    struct EveryHash;

    impl FileIndex for EveryHash {
        fn search_keyword(&self, _keyword: &str) -> Vec<FileInfo> {
            Vec::new()
        }

        fn search_regex(&self, _expr: &LinearizedExpression) -> Vec<FileInfo> {
            Vec::new()
        }

        fn has_file(&self, _hash: &Sha1Hash) -> bool {
            true
        }
    }

    fn string_request(request_id: u32, depth: u16, keyword: &str) -> Packet {
        Packet::StringSearchRequest(StringSearchRequest {
            request_id,
            depth,
            keyword: keyword.to_string(),
        })
    }

    fn file_result(request_id: u32, depth: u16, entries: usize) -> Packet {
        Packet::FileSearchResult(FileSearchResult {
            request_id,
            depth,
            results: (0..entries)
                .map(|i| FileInfo {
                    hash: Sha1Hash::new([i as u8; 20]),
                    name: format!("file-{}", i),
                    size: i as u64,
                })
                .collect(),
        })
    }

    #[tokio::test]
    async fn search_floods_all_neighbours() {
        let (router, mut rx) = create_router();
        router.add_neighbour(LinkId::new(1)).await;
        router.add_neighbour(LinkId::new(2)).await;

        let request_id = router.search(SearchRequest::String(StringSearchRequest {
            request_id: 0,
            depth: 0,
            keyword: "pineapple".to_string(),
        })).await.unwrap();
        assert_ne!(request_id, 0);

        let mut links = HashSet::new();
        for _ in 0..2 {
            let (packet, link) = next_packet(&mut rx).await;
            links.insert(link);
            match packet {
                Packet::StringSearchRequest(p) => {
                    assert_eq!(p.request_id, request_id);
                    assert_eq!(p.depth, 1);
                    assert_eq!(p.keyword, "pineapple");
                }
                p => panic!("unexpected packet {:?}", p),
            }
        }
        assert_eq!(links, HashSet::from([LinkId::new(1), LinkId::new(2)]));

        let searches = router.list_searches().await;
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].0, request_id);
        assert_eq!(searches[0].1.from, None);
    }

    #[tokio::test]
    async fn duplicate_search_request_is_suppressed() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        let link_b = LinkId::new(2);
        router.add_neighbour(link_a).await;
        router.add_neighbour(link_b).await;

        router.handle_packet(string_request(42, 1, "durian"), link_a).await.unwrap();
        let (packet, link) = next_packet(&mut rx).await;
        assert_eq!(link, link_b);
        assert_eq!(packet, string_request(42, 2, "durian"));

        // the same request arriving again, even from the other link,
        // must be dropped to break flooding loops
        router.handle_packet(string_request(42, 1, "durian"), link_a).await.unwrap();
        router.handle_packet(string_request(42, 3, "durian"), link_b).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn adjacent_match_reports_depth_one() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(SingleFileIndex { file: pineapple_file() })).await;

        router.handle_packet(string_request(7, 1, "pineapple"), link_a).await.unwrap();

        let (packet, link) = next_packet(&mut rx).await;
        assert_eq!(link, link_a);
        match packet {
            Packet::FileSearchResult(p) => {
                assert_eq!(p.request_id, 7);
                assert_eq!(p.depth, 1);
                assert_eq!(p.results, vec![pineapple_file()]);
            }
            p => panic!("unexpected packet {:?}", p),
        }
    }

    #[tokio::test]
    async fn remote_match_obfuscates_depth() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(SingleFileIndex { file: pineapple_file() })).await;

        for i in 0..32 {
            router.handle_packet(string_request(100 + i, 3, "pineapple"), link_a).await.unwrap();
            let (packet, _) = next_packet(&mut rx).await;
            match packet {
                Packet::FileSearchResult(p) => {
                    assert!(p.depth >= 2);
                    assert!(p.depth <= 3 + DEPTH_OBFUSCATION_SPREAD);
                }
                p => panic!("unexpected packet {:?}", p),
            }
            // the arrival link is excluded from forwarding and there
            // is no other neighbour, so the result is the only packet
            assert!(rx.try_next().is_err());
        }
    }

    #[tokio::test]
    async fn depth_budget_stops_forwarding() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        let link_b = LinkId::new(2);
        router.add_neighbour(link_a).await;
        router.add_neighbour(link_b).await;

        router.handle_packet(string_request(1, MAX_SEARCH_DEPTH - 1, "durian"), link_a).await.unwrap();
        let (packet, link) = next_packet(&mut rx).await;
        assert_eq!(link, link_b);
        assert_eq!(packet, string_request(1, MAX_SEARCH_DEPTH, "durian"));

        router.handle_packet(string_request(2, MAX_SEARCH_DEPTH, "durian"), link_a).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn max_depth_request_is_still_answered() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        let link_b = LinkId::new(2);
        router.add_neighbour(link_a).await;
        router.add_neighbour(link_b).await;
        router.set_file_index(Arc::new(SingleFileIndex { file: pineapple_file() })).await;

        router.handle_packet(string_request(3, MAX_SEARCH_DEPTH, "pineapple"), link_a).await.unwrap();

        let (packet, link) = next_packet(&mut rx).await;
        assert_eq!(link, link_a);
        assert!(matches!(packet, Packet::FileSearchResult(_)));
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn search_result_follows_reverse_path() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        let link_b = LinkId::new(2);
        router.add_neighbour(link_a).await;
        router.add_neighbour(link_b).await;

        router.handle_packet(string_request(9, 1, "durian"), link_a).await.unwrap();
        // drain the forwarded request
        let _ = next_packet(&mut rx).await;

        router.handle_packet(file_result(9, 4, 2), link_b).await.unwrap();
        let (packet, link) = next_packet(&mut rx).await;
        assert_eq!(link, link_a);
        assert_eq!(packet, file_result(9, 4, 2));

        // a result with no cache entry has no reverse path
        router.handle_packet(file_result(555, 4, 2), link_b).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn search_result_budget_truncates_and_drops() {
        let (router, mut rx) = create_router_with_config(RouterConfig {
            max_search_results: 3,
            ..RouterConfig::default()
        });
        let link_a = LinkId::new(1);
        let link_b = LinkId::new(2);
        router.add_neighbour(link_a).await;
        router.add_neighbour(link_b).await;

        router.handle_packet(string_request(9, 1, "durian"), link_a).await.unwrap();
        let _ = next_packet(&mut rx).await;

        // 5 entries arrive, only 3 fit the budget
        router.handle_packet(file_result(9, 2, 5), link_b).await.unwrap();
        let (packet, _) = next_packet(&mut rx).await;
        match packet {
            Packet::FileSearchResult(p) => assert_eq!(p.results.len(), 3),
            p => panic!("unexpected packet {:?}", p),
        }

        // the budget is spent, further results are dropped
        router.handle_packet(file_result(9, 2, 1), link_b).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn local_search_results_reach_the_sink() {
        let (router, _rx) = create_router();
        let (sink_tx, mut sink_rx) = mpsc::unbounded();
        router.set_search_result_sink(sink_tx).await;

        let request_id = router.search(SearchRequest::String(StringSearchRequest {
            request_id: 0,
            depth: 0,
            keyword: "durian".to_string(),
        })).await.unwrap();

        router.handle_packet(file_result(request_id, 3, 1), LinkId::new(1)).await.unwrap();
        let result = sink_rx.next().await.unwrap();
        assert_eq!(result.request_id(), request_id);
        assert_eq!(result.count(), 1);
    }

    #[tokio::test]
    async fn two_router_search_end_to_end() {
        // r1 originates, adjacent r2 holds pineapple.png; the result
        // must arrive on r1's sink reporting depth 1
        let (r1, mut rx1) = create_router();
        let (r2, mut rx2) = create_router();
        let l12 = LinkId::new(12);
        let l21 = LinkId::new(21);
        r1.add_neighbour(l12).await;
        r2.add_neighbour(l21).await;
        r2.set_file_index(Arc::new(SingleFileIndex { file: pineapple_file() })).await;

        let (sink_tx, mut sink_rx) = mpsc::unbounded();
        r1.set_search_result_sink(sink_tx).await;

        let request_id = r1.search(SearchRequest::String(StringSearchRequest {
            request_id: 0,
            depth: 0,
            keyword: "pineapple".to_string(),
        })).await.unwrap();

        let (packet, link) = next_packet(&mut rx1).await;
        assert_eq!(link, l12);
        r2.handle_packet(packet, l21).await.unwrap();

        let (packet, link) = next_packet(&mut rx2).await;
        assert_eq!(link, l21);
        r1.handle_packet(packet, l12).await.unwrap();

        match sink_rx.next().await.unwrap() {
            SearchResult::File(p) => {
                assert_eq!(p.request_id, request_id);
                assert_eq!(p.depth, 1);
                assert_eq!(p.results, vec![pineapple_file()]);
            }
            p => panic!("unexpected result {:?}", p),
        }
    }

    #[tokio::test]
    async fn tunnel_handshake_and_relay() {
        // r1 --L12/L21-- r2 --L23/L32-- r3, where r3 owns the hash
        let (r1, mut rx1) = create_router();
        let (r2, mut rx2) = create_router();
        let (r3, mut rx3) = create_router();
        let hash = Sha1Hash::new([0x42; 20]);

        let l12 = LinkId::new(12);
        let l21 = LinkId::new(21);
        let l23 = LinkId::new(23);
        let l32 = LinkId::new(32);
        r1.add_neighbour(l12).await;
        r2.add_neighbour(l21).await;
        r2.add_neighbour(l23).await;
        r3.add_neighbour(l32).await;
        r3.set_file_index(Arc::new(EveryHash)).await;

        let (events1_tx, mut events1) = mpsc::unbounded();
        r1.set_tunnel_sink(events1_tx).await;
        let (events3_tx, mut events3) = mpsc::unbounded();
        r3.set_tunnel_sink(events3_tx).await;

        // request travels r1 -> r2 -> r3
        let request_id = r1.open_tunnel(hash).await.unwrap();
        let (packet, link) = next_packet(&mut rx1).await;
        assert_eq!(link, l12);
        r2.handle_packet(packet, l21).await.unwrap();
        let (packet, link) = next_packet(&mut rx2).await;
        assert_eq!(link, l23);
        match packet {
            Packet::TunnelOpenRequest(ref p) => assert_eq!(p.depth, 2),
            ref p => panic!("unexpected packet {:?}", p),
        }
        r3.handle_packet(packet, l32).await.unwrap();

        // ack travels r3 -> r2 -> r1
        let (packet, link) = next_packet(&mut rx3).await;
        assert_eq!(link, l32);
        let tunnel_id = match packet {
            Packet::TunnelOpenAck(ref p) => {
                assert_eq!(p.request_id, request_id);
                p.tunnel_id
            }
            ref p => panic!("unexpected packet {:?}", p),
        };
        r2.handle_packet(packet, l23).await.unwrap();
        let (packet, link) = next_packet(&mut rx2).await;
        assert_eq!(link, l21);
        r1.handle_packet(packet, l12).await.unwrap();

        assert_eq!(
            events1.next().await.unwrap(),
            TunnelEvent::Established { request_id, tunnel_id, hash }
        );

        // payload r1 -> r3
        r1.send_data(tunnel_id, b"hello".to_vec()).await.unwrap();
        let (packet, _) = next_packet(&mut rx1).await;
        r2.handle_packet(packet, l21).await.unwrap();
        let (packet, link) = next_packet(&mut rx2).await;
        assert_eq!(link, l23);
        r3.handle_packet(packet, l32).await.unwrap();
        assert_eq!(
            events3.next().await.unwrap(),
            TunnelEvent::Data {
                tunnel_id,
                direction: TunnelDirection::ToDestination,
                payload: b"hello".to_vec(),
            }
        );

        // payload r3 -> r1
        r3.send_data(tunnel_id, b"again".to_vec()).await.unwrap();
        let (packet, _) = next_packet(&mut rx3).await;
        r2.handle_packet(packet, l23).await.unwrap();
        let (packet, link) = next_packet(&mut rx2).await;
        assert_eq!(link, l21);
        r1.handle_packet(packet, l12).await.unwrap();
        assert_eq!(
            events1.next().await.unwrap(),
            TunnelEvent::Data {
                tunnel_id,
                direction: TunnelDirection::ToOrigin,
                payload: b"again".to_vec(),
            }
        );

        // a larger random payload must survive the relay byte-for-byte
        let mut payload = vec![0u8; 4096];
        rand::thread_rng().fill(payload.as_mut_slice());
        r1.send_data(tunnel_id, payload.clone()).await.unwrap();
        let (packet, _) = next_packet(&mut rx1).await;
        r2.handle_packet(packet, l21).await.unwrap();
        let (packet, _) = next_packet(&mut rx2).await;
        r3.handle_packet(packet, l32).await.unwrap();
        match events3.next().await.unwrap() {
            TunnelEvent::Data { payload: received, .. } => assert_eq!(received, payload),
            event => panic!("unexpected event {:?}", event),
        }
    }

    #[tokio::test]
    async fn tunnel_ids_differ_per_hash() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;

        let mut tunnel_ids = HashSet::new();
        for i in 0..8u8 {
            let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
                file_hash: Sha1Hash::new([i; 20]),
                request_id: 1000 + u32::from(i),
                partial_tunnel_id: 0x1111_1111,
                depth: 1,
            });
            router.handle_packet(request, link_a).await.unwrap();
            let (packet, _) = next_packet(&mut rx).await;
            match packet {
                Packet::TunnelOpenAck(p) => tunnel_ids.insert(p.tunnel_id),
                p => panic!("unexpected packet {:?}", p),
            };
        }
        assert_eq!(tunnel_ids.len(), 8);
    }

    #[tokio::test]
    async fn tunnel_ids_differ_per_partial_id() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;

        // same hash, distinct partial ids: the completed ids must be
        // distinct because completion is an XOR with a per-hash print
        let mut tunnel_ids = HashSet::new();
        for i in 0..8u32 {
            let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
                file_hash: Sha1Hash::new([0x77; 20]),
                request_id: 2000 + i,
                partial_tunnel_id: 1 + i,
                depth: 1,
            });
            router.handle_packet(request, link_a).await.unwrap();
            let (packet, _) = next_packet(&mut rx).await;
            match packet {
                Packet::TunnelOpenAck(p) => tunnel_ids.insert(p.tunnel_id),
                p => panic!("unexpected packet {:?}", p),
            };
        }
        assert_eq!(tunnel_ids.len(), 8);
    }

    #[tokio::test]
    async fn duplicate_tunnel_request_is_suppressed() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;

        let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
            file_hash: Sha1Hash::new([5; 20]),
            request_id: 77,
            partial_tunnel_id: 3,
            depth: 1,
        });
        router.handle_packet(request.clone(), link_a).await.unwrap();
        let _ = next_packet(&mut rx).await;

        router.handle_packet(request, link_a).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn idle_tunnel_is_torn_down() {
        tokio::time::pause();

        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;
        let (events_tx, mut events) = mpsc::unbounded();
        router.set_tunnel_sink(events_tx).await;

        let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
            file_hash: Sha1Hash::new([5; 20]),
            request_id: 77,
            partial_tunnel_id: 3,
            depth: 1,
        });
        router.handle_packet(request, link_a).await.unwrap();
        let (packet, _) = next_packet(&mut rx).await;
        let tunnel_id = match packet {
            Packet::TunnelOpenAck(p) => p.tunnel_id,
            p => panic!("unexpected packet {:?}", p),
        };

        tokio::time::advance(TUNNEL_IDLE_TIMEOUT + Duration::from_secs(1)).await;
        router.main_loop().await.unwrap();

        assert_eq!(events.next().await.unwrap(), TunnelEvent::Closed { tunnel_id });
        assert!(router.list_tunnels().await.is_empty());
    }

    #[tokio::test]
    async fn stamping_keeps_a_tunnel_alive() {
        tokio::time::pause();

        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;
        let (events_tx, mut events) = mpsc::unbounded();
        router.set_tunnel_sink(events_tx).await;

        let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
            file_hash: Sha1Hash::new([5; 20]),
            request_id: 77,
            partial_tunnel_id: 3,
            depth: 1,
        });
        router.handle_packet(request, link_a).await.unwrap();
        let (packet, _) = next_packet(&mut rx).await;
        let tunnel_id = match packet {
            Packet::TunnelOpenAck(p) => p.tunnel_id,
            p => panic!("unexpected packet {:?}", p),
        };

        tokio::time::advance(Duration::from_secs(40)).await;
        let data = Packet::GenericData(GenericData {
            tunnel_id,
            payload: vec![1, 2, 3],
        });
        router.handle_packet(data, link_a).await.unwrap();
        assert!(events.next().await.unwrap() == TunnelEvent::Data {
            tunnel_id,
            direction: TunnelDirection::ToDestination,
            payload: vec![1, 2, 3],
        });

        // 40 seconds after the stamp the tunnel must still be there
        tokio::time::advance(Duration::from_secs(40)).await;
        router.main_loop().await.unwrap();
        assert_eq!(router.list_tunnels().await.len(), 1);

        tokio::time::advance(TUNNEL_IDLE_TIMEOUT + Duration::from_secs(1)).await;
        router.main_loop().await.unwrap();
        assert!(router.list_tunnels().await.is_empty());
    }

    #[tokio::test]
    async fn handshake_timeout_reports_failure() {
        tokio::time::pause();

        let (router, _rx) = create_router();
        let (events_tx, mut events) = mpsc::unbounded();
        router.set_tunnel_sink(events_tx).await;

        let hash = Sha1Hash::new([5; 20]);
        let request_id = router.open_tunnel(hash).await.unwrap();

        tokio::time::advance(HANDSHAKE_TIMEOUT + Duration::from_secs(1)).await;
        router.main_loop().await.unwrap();
        assert_eq!(events.next().await.unwrap(), TunnelEvent::Failed { request_id });

        // a late ack must not resurrect the abandoned handshake
        let ack = Packet::TunnelOpenAck(TunnelOpenAck {
            tunnel_id: 9,
            request_id,
        });
        router.handle_packet(ack, LinkId::new(1)).await.unwrap();
        assert!(events.try_next().is_err());
        assert!(router.list_tunnels().await.is_empty());
    }

    #[tokio::test]
    async fn search_cache_entries_expire() {
        tokio::time::pause();

        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        let link_b = LinkId::new(2);
        router.add_neighbour(link_a).await;
        router.add_neighbour(link_b).await;

        router.handle_packet(string_request(9, 1, "durian"), link_a).await.unwrap();
        let _ = next_packet(&mut rx).await;

        tokio::time::advance(SEARCH_REQUEST_TIMEOUT + Duration::from_secs(1)).await;
        router.main_loop().await.unwrap();
        assert!(router.list_searches().await.is_empty());

        // the reverse path is gone, late results are dropped
        router.handle_packet(file_result(9, 2, 1), link_b).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn remove_neighbour_purges_its_entries() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;
        let (events_tx, mut events) = mpsc::unbounded();
        router.set_tunnel_sink(events_tx).await;

        router.handle_packet(string_request(9, 1, "durian"), link_a).await.unwrap();
        let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
            file_hash: Sha1Hash::new([5; 20]),
            request_id: 77,
            partial_tunnel_id: 3,
            depth: 1,
        });
        router.handle_packet(request, link_a).await.unwrap();
        let (packet, _) = next_packet(&mut rx).await;
        let tunnel_id = match packet {
            Packet::TunnelOpenAck(p) => p.tunnel_id,
            p => panic!("unexpected packet {:?}", p),
        };

        router.remove_neighbour(link_a).await.unwrap();

        assert_eq!(events.next().await.unwrap(), TunnelEvent::Closed { tunnel_id });
        assert!(router.list_searches().await.is_empty());
        assert!(router.list_tunnels().await.is_empty());
    }

    #[tokio::test]
    async fn generic_data_for_unknown_tunnel_is_dropped() {
        let (router, mut rx) = create_router();
        router.add_neighbour(LinkId::new(1)).await;

        let data = Packet::GenericData(GenericData {
            tunnel_id: 0xdead_beef,
            payload: vec![1, 2, 3],
        });
        router.handle_packet(data, LinkId::new(1)).await.unwrap();
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn send_data_rejects_bad_tunnels() {
        let (router, _rx) = create_router();

        let res = router.send_data(5, vec![1]).await;
        assert!(matches!(res, Err(TunnelError::NotFound { tunnel_id: 5 })));

        let res = router.send_data(5, vec![0; MAX_GENERIC_PAYLOAD_SIZE + 1]).await;
        assert!(matches!(res, Err(TunnelError::PayloadSize { .. })));
    }

    #[tokio::test]
    async fn close_tunnel_removes_the_entry() {
        let (router, mut rx) = create_router();
        let link_a = LinkId::new(1);
        router.add_neighbour(link_a).await;
        router.set_file_index(Arc::new(EveryHash)).await;
        let (events_tx, mut events) = mpsc::unbounded();
        router.set_tunnel_sink(events_tx).await;

        let request = Packet::TunnelOpenRequest(TunnelOpenRequest {
            file_hash: Sha1Hash::new([5; 20]),
            request_id: 77,
            partial_tunnel_id: 3,
            depth: 1,
        });
        router.handle_packet(request, link_a).await.unwrap();
        let (packet, _) = next_packet(&mut rx).await;
        let tunnel_id = match packet {
            Packet::TunnelOpenAck(p) => p.tunnel_id,
            p => panic!("unexpected packet {:?}", p),
        };

        router.close_tunnel(tunnel_id).await.unwrap();
        assert_eq!(events.next().await.unwrap(), TunnelEvent::Closed { tunnel_id });
        assert!(matches!(
            router.close_tunnel(tunnel_id).await,
            Err(TunnelError::NotFound { .. })
        ));
    }
}
