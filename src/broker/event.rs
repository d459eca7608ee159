//! Event definitions for the broker
//!
//! `Event` is the payload fanned out to subscribers. A published event is
//! wrapped in an `Arc` once and shared read-only by every queue it lands in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::BrokerError;

pub type Topic = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub content: String,
    pub sender: String,
}

impl Event {
    pub fn new(content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: sender.into(),
        }
    }
}

/// Returned by a successful publish, whether or not anyone was listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub message: String,
    /// Number of queues that accepted the event.
    pub delivered: usize,
}

impl Acknowledgement {
    pub(crate) fn for_event(event: &Event, delivered: usize) -> Self {
        Self {
            message: format!("Received: \"{}\" from \"{}\".", event.content, event.sender),
            delivered,
        }
    }
}

impl fmt::Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Rejects empty, blank, oversized or control-character topics.
pub fn validate_topic(topic: &str, max_len: usize) -> Result<(), BrokerError> {
    if topic.trim().is_empty() {
        return Err(BrokerError::InvalidTopic("topic must not be empty".to_string()));
    }
    if topic.len() > max_len {
        return Err(BrokerError::InvalidTopic(format!(
            "topic exceeds {max_len} bytes"
        )));
    }
    if topic.chars().any(char::is_control) {
        return Err(BrokerError::InvalidTopic(
            "topic contains control characters".to_string(),
        ));
    }
    Ok(())
}
