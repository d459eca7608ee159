//! Wire protocol
//!
//! Every frame is a JSON text message tagged by `type`. Subscriptions are
//! named by a client-chosen `id` which the server echoes on every `next`,
//! `complete` and `error` frame belonging to that subscription.

use serde::{Deserialize, Serialize};
use tracing::error;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Event;

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },
    #[serde(rename = "complete")]
    Complete { id: String },
    #[serde(rename = "publish")]
    Publish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        content: String,
        sender: String,
    },
    #[serde(rename = "health")]
    Health,
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "next")]
    Next {
        id: String,
        topic: String,
        payload: Event,
        timestamp: i64,
    },
    #[serde(rename = "complete")]
    Complete { id: String },
    #[serde(rename = "ack")]
    Ack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
        delivered: usize,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
    },
    #[serde(rename = "health")]
    Health { status: String },
    #[serde(rename = "pong")]
    Pong,
}

impl ServerMessage {
    pub fn error(id: Option<String>, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            message: message.into(),
        }
    }

    /// Encodes the message as a WebSocket text frame.
    pub fn to_ws(&self) -> Option<WsMessage> {
        match serde_json::to_string(self) {
            Ok(json) => Some(WsMessage::text(json)),
            Err(e) => {
                error!(error = %e, "Failed to serialize server message");
                None
            }
        }
    }
}
