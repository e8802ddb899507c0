/*! Tunnel table entries and hop-local tunnel state.

A tunnel is a chain of per-hop table entries keyed by the tunnel id.
Each entry only knows its two adjacent links, so no hop can name the
endpoints. Direction is a hop-local notion derived from the arrival
link and is never serialized.
*/

use std::time::{Duration, Instant};

use terrapin_packet::Sha1Hash;

use crate::router::LinkId;
use crate::time::*;

/// Which way a payload is moving through a tunnel, relative to this
/// hop's entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TunnelDirection {
    /// Toward the node that opened the tunnel.
    ToOrigin,
    /// Toward the node that answered the tunnel request.
    ToDestination,
}

/// One hop's view of a tunnel. At an endpoint exactly one side is
/// attached to a link and the other is `None`.
#[derive(Clone, Debug)]
pub struct TunnelEntry {
    /// Link leading toward the tunnel origin, `None` if we are it.
    toward_requester: Option<LinkId>,
    /// Link leading toward the destination, `None` if we are it.
    toward_destination: Option<LinkId>,
    /// Hash the tunnel was opened for. Only endpoints know it.
    hash: Option<Sha1Hash>,
    /// Time of the last stamping packet seen on this tunnel.
    last_stamp: Instant,
}

impl TunnelEntry {
    /// Entry for a relaying hop between two links.
    pub fn relay(toward_requester: LinkId, toward_destination: LinkId) -> TunnelEntry {
        TunnelEntry {
            toward_requester: Some(toward_requester),
            toward_destination: Some(toward_destination),
            hash: None,
            last_stamp: clock_now(),
        }
    }

    /// Entry at the node that opened the tunnel.
    pub fn origin_endpoint(toward_destination: LinkId, hash: Sha1Hash) -> TunnelEntry {
        TunnelEntry {
            toward_requester: None,
            toward_destination: Some(toward_destination),
            hash: Some(hash),
            last_stamp: clock_now(),
        }
    }

    /// Entry at the node that answered the tunnel request.
    pub fn destination_endpoint(toward_requester: LinkId, hash: Sha1Hash) -> TunnelEntry {
        TunnelEntry {
            toward_requester: Some(toward_requester),
            toward_destination: None,
            hash: Some(hash),
            last_stamp: clock_now(),
        }
    }

    /// Whether the tunnel terminates at this node.
    pub fn is_endpoint(&self) -> bool {
        self.toward_requester.is_none() || self.toward_destination.is_none()
    }

    /// Hash the tunnel was opened for, known at endpoints only.
    pub fn hash(&self) -> Option<Sha1Hash> {
        self.hash
    }

    /// The single attached link of an endpoint entry. `None` for a
    /// relay entry, which has two.
    pub fn peer_link(&self) -> Option<LinkId> {
        match (self.toward_requester, self.toward_destination) {
            (Some(link), None) | (None, Some(link)) => Some(link),
            _ => None,
        }
    }

    /// Direction a packet arriving on `from` is travelling, or `None`
    /// if the link is not part of this tunnel.
    pub fn direction_from(&self, from: LinkId) -> Option<TunnelDirection> {
        if self.toward_requester == Some(from) {
            Some(TunnelDirection::ToDestination)
        } else if self.toward_destination == Some(from) {
            Some(TunnelDirection::ToOrigin)
        } else {
            None
        }
    }

    /// Link a packet travelling in `direction` leaves on, or `None`
    /// if this node is the endpoint in that direction.
    pub fn link_toward(&self, direction: TunnelDirection) -> Option<LinkId> {
        match direction {
            TunnelDirection::ToOrigin => self.toward_requester,
            TunnelDirection::ToDestination => self.toward_destination,
        }
    }

    /// Whether either side of the entry is attached to this link.
    pub fn references(&self, link: LinkId) -> bool {
        self.toward_requester == Some(link) || self.toward_destination == Some(link)
    }

    /// Refresh the liveness stamp.
    pub fn stamp(&mut self) {
        self.last_stamp = clock_now();
    }

    /// Whether nothing stamping has passed for longer than `timeout`.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        clock_elapsed(self.last_stamp) >= timeout
    }

    /// Time since the last stamping packet.
    pub fn idle_for(&self) -> Duration {
        clock_elapsed(self.last_stamp)
    }
}

/// Handshake progress of a locally opened tunnel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandshakeState {
    /// Request flooded, no acknowledgement seen yet.
    AwaitingAck,
    /// At least one acknowledgement arrived and a tunnel exists.
    Established,
    /// The handshake was abandoned. Late acknowledgements are ignored
    /// while the marker entry lingers.
    Closed,
}

/// Bookkeeping for a tunnel request this node originated.
#[derive(Clone, Debug)]
pub(crate) struct PendingTunnel {
    /// Hash the tunnel is being opened for.
    pub hash: Sha1Hash,
    /// Handshake progress.
    pub state: HandshakeState,
    /// Time the request was flooded.
    pub time: Instant,
}

/// Event emitted to the tunnel subscriber.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TunnelEvent {
    /// A tunnel request this node originated was acknowledged.
    Established {
        /// Id of the originating `open_tunnel` call.
        request_id: u32,
        /// Id of the newly usable tunnel.
        tunnel_id: u32,
        /// Hash the tunnel was opened for.
        hash: Sha1Hash,
    },
    /// A tunnel request this node originated got no acknowledgement
    /// within the handshake timeout.
    Failed {
        /// Id of the originating `open_tunnel` call.
        request_id: u32,
    },
    /// A tunnel terminating at this node was torn down.
    Closed {
        /// Id of the removed tunnel.
        tunnel_id: u32,
    },
    /// A payload arrived at this endpoint.
    Data {
        /// Tunnel the payload arrived on.
        tunnel_id: u32,
        /// Which way the payload was moving.
        direction: TunnelDirection,
        /// Opaque application bytes.
        payload: Vec<u8>,
    },
}
