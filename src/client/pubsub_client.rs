use std::collections::HashMap;

use tokio::sync::mpsc::Sender;
use tokio::task::{AbortHandle, JoinSet};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::transport::adapter::DeliveryAdapter;
use crate::transport::message::ServerMessage;

/// Represents a connected WebSocket client.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: String,

    /// Channel to send WebSocket messages to the client.
    sender: Sender<WsMessage>,

    adapters: JoinSet<String>,
    operations: HashMap<String, AbortHandle>,
}

impl Client {
    pub fn new(sender: Sender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
            adapters: JoinSet::new(),
            operations: HashMap::new(),
        }
    }

    pub fn sender(&self) -> Sender<WsMessage> {
        self.sender.clone()
    }

    /// Queues `message` for the writer, waiting while the outbound buffer is
    /// full. Returns `false` once the connection is gone.
    pub async fn send(&self, message: &ServerMessage) -> bool {
        match message.to_ws() {
            Some(frame) => self.sender.send(frame).await.is_ok(),
            None => true,
        }
    }

    pub fn has_operation(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Spawns `adapter` on this connection's task set.
    pub fn start(&mut self, adapter: DeliveryAdapter) {
        let id = adapter.operation_id().to_string();
        let handle = self.adapters.spawn(adapter.run());
        self.operations.insert(id, handle);
    }

    /// Stops the adapter serving `id`; its subscription is disposed when the
    /// task is torn down. Unknown ids are ignored.
    pub fn cancel(&mut self, id: &str) -> bool {
        match self.operations.remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Waits for the next adapter to finish and forgets its operation.
    /// Resolves to `None` straight away when nothing is running.
    pub async fn reap(&mut self) -> Option<String> {
        loop {
            match self.adapters.join_next_with_id().await? {
                Ok((task, id)) => {
                    if self
                        .operations
                        .get(&id)
                        .is_some_and(|handle| handle.id() == task)
                    {
                        self.operations.remove(&id);
                    }
                    return Some(id);
                }
                // Cancelled adapters were already removed by `cancel`.
                Err(_) => continue,
            }
        }
    }

    /// Lets every adapter run to completion.
    pub async fn finish_adapters(&mut self) {
        while self.adapters.join_next().await.is_some() {}
        self.operations.clear();
    }

    /// Aborts every adapter and waits until their subscriptions are dropped.
    pub async fn abort_adapters(&mut self) {
        self.adapters.abort_all();
        while self.adapters.join_next().await.is_some() {}
        self.operations.clear();
    }
}
