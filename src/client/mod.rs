//! The `client` module defines the server-side representation of one
//! connected WebSocket client.
//!
//! A `Client` owns the sending half of the connection's outbound channel and
//! the delivery adapters serving its subscriptions, keyed by the operation
//! id the client chose.

pub mod pubsub_client;
pub use pubsub_client::Client;
