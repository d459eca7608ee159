//! # fanout
//!
//! `fanout` is an in-process publish/subscribe server. Events published to a
//! topic are fanned out, in order, to every subscriber that was listening on
//! that topic when the publish happened. Clients talk to it over WebSockets.
//!
//! ## Core Modules
//!
//! - `broker`: topics, subscriber queues and the `Broker` handle.
//! - `client`: the server-side view of one connected WebSocket client.
//! - `config`: layered configuration loading.
//! - `transport`: the WebSocket server, delivery adapters and shutdown drain.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
