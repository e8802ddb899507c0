//! Errors enum for the router.

use futures::channel::mpsc::SendError;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Error that can happen when handling an incoming packet.
#[derive(Debug, Error)]
pub enum HandlePacketError {
    /// Failed to send a packet to a neighbour link.
    #[error("Failed to send packet: {error:?}")]
    SendTo {
        /// Sink error.
        error: SendError,
    },
    /// Failed to notify a local subscriber.
    #[error("Failed to notify subscriber: {error:?}")]
    Notify {
        /// Sink error.
        error: SendError,
    },
}

/// Error that can happen while running the router main loop.
#[derive(Debug, Error)]
pub enum RunError {
    /// Maintenance iteration took longer than the wakeup interval.
    #[error("Main loop timed out")]
    Timeout(Elapsed),
    /// Failed to notify a local subscriber.
    #[error("Failed to notify subscriber: {error:?}")]
    Notify {
        /// Sink error.
        error: SendError,
    },
}

/// Error that can happen when originating a search request.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Failed to send the request to a neighbour link.
    #[error("Failed to send packet: {error:?}")]
    SendTo {
        /// Sink error.
        error: SendError,
    },
}

/// Error that can happen when operating on a tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// No tunnel with this id in the routing table.
    #[error("Unknown tunnel {tunnel_id:08x}")]
    NotFound {
        /// Id the caller passed.
        tunnel_id: u32,
    },
    /// The tunnel passes through this node but does not terminate
    /// here, so local data cannot be injected into it.
    #[error("Tunnel {tunnel_id:08x} does not terminate at this node")]
    NotEndpoint {
        /// Id the caller passed.
        tunnel_id: u32,
    },
    /// Payload exceeds what a single generic data packet can carry.
    #[error("Payload of {size} bytes exceeds the generic data limit")]
    PayloadSize {
        /// Size of the rejected payload.
        size: usize,
    },
    /// Failed to send a packet to a neighbour link.
    #[error("Failed to send packet: {error:?}")]
    SendTo {
        /// Sink error.
        error: SendError,
    },
    /// Failed to notify a local subscriber.
    #[error("Failed to notify subscriber: {error:?}")]
    Notify {
        /// Sink error.
        error: SendError,
    },
}
