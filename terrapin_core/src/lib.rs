/*!
Routing engine of the terrapin anonymous tunnel-routing protocol.

A node floods search requests through the overlay, answers them from
its local datasets, and relays results back along per-request reverse
paths. A matching result can then be turned into a tunnel: a relay path
identified by a tunnel id that moves opaque application payloads
between the search origin and the answering node without any
intermediate hop learning who either of them is.
*/

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod codec;
pub mod io_tokio;
pub mod registry;
pub mod router;
pub mod time;
pub mod utils;
