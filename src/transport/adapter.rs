//! Delivery adapter
//!
//! Pumps one `Subscription` into one connection's outbound channel. The
//! adapter owns the subscription, so whichever way the loop ends (stream
//! finished, connection gone, task aborted) the subscription is disposed
//! exactly once, either explicitly here or by its `Drop`.
//!
//! The outbound channel is bounded. When the peer stops reading, the writer
//! stalls, the channel fills and the adapter waits in `send`; events then pile
//! up in the subscriber queue, where the broker's depth limit applies.

use tokio::sync::mpsc::Sender;
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{CloseReason, Subscription};
use crate::transport::message::ServerMessage;

#[derive(Debug)]
pub struct DeliveryAdapter {
    operation_id: String,
    subscription: Subscription,
    outbound: Sender<WsMessage>,
}

impl DeliveryAdapter {
    pub fn new(
        operation_id: impl Into<String>,
        subscription: Subscription,
        outbound: Sender<WsMessage>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            subscription,
            outbound,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Runs until the subscription ends or the connection stops accepting
    /// frames. Returns the operation id.
    pub async fn run(mut self) -> String {
        let topic = self.subscription.topic().to_string();

        while let Some(event) = self.subscription.next_event().await {
            let frame = ServerMessage::Next {
                id: self.operation_id.clone(),
                topic: topic.clone(),
                payload: (*event).clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            };
            if !self.send(&frame).await {
                debug!(
                    operation = %self.operation_id,
                    subscriber = self.subscription.id(),
                    "connection closed mid-delivery"
                );
                self.subscription.dispose();
                return self.operation_id;
            }
        }

        if self.subscription.close_reason() == Some(CloseReason::Overflow) {
            self.send(&ServerMessage::error(
                Some(self.operation_id.clone()),
                "subscriber fell too far behind and was disconnected",
            ))
            .await;
        }
        self.send(&ServerMessage::Complete {
            id: self.operation_id.clone(),
        })
        .await;

        debug!(
            operation = %self.operation_id,
            subscriber = self.subscription.id(),
            reason = ?self.subscription.close_reason(),
            "subscription stream ended"
        );
        self.subscription.dispose();
        self.operation_id
    }

    /// Waits for room in the outbound channel. `false` means the connection
    /// is gone.
    async fn send(&self, message: &ServerMessage) -> bool {
        match message.to_ws() {
            Some(frame) => self.outbound.send(frame).await.is_ok(),
            None => true,
        }
    }
}
