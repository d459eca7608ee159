//! The `error` module defines the error types used within the `fanout` application.
//!
//! Only boundary calls fail: a publish or subscribe with a bad topic, a
//! subscribe after shutdown has begun, or the server failing to start.
//! Registry bookkeeping itself is infallible.

use thiserror::Error;

/// Errors surfaced by [`crate::broker::Broker`] to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("broker is shutting down")]
    ShuttingDown,
}

/// Errors raised while bootstrapping or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
