//! The `transport` module exposes the broker over WebSockets.
//!
//! - `message`: the JSON protocol spoken with clients.
//! - `adapter`: pumps one subscription into one connection.
//! - `drain`: the two-phase graceful shutdown hook.
//! - `websocket`: the accept loop and per-connection handling.

pub mod adapter;
pub mod drain;
pub mod message;
pub mod websocket;

pub use adapter::DeliveryAdapter;
pub use drain::{Drain, DrainOutcome};
pub use message::{ClientMessage, ServerMessage};
pub use websocket::start_websocket_server;
