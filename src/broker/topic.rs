//! Topic registry
//!
//! Maps a topic name to the queues currently subscribed to it. A topic
//! exists only while it has subscribers: the entry is dropped when the last
//! one unregisters.
//!
//! Concurrency note: callers must synchronize access to the registry (the
//! broker keeps it behind a single mutex).

use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::event::Topic;
use crate::broker::queue::{SubscriberId, SubscriberQueue};

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<Topic, HashMap<SubscriberId, Arc<SubscriberQueue>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queue under `topic`. Registering the same queue twice is a no-op.
    pub fn register(&mut self, topic: &str, queue: Arc<SubscriberQueue>) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .entry(queue.id())
            .or_insert(queue);
    }

    /// Remove a queue from `topic`. Returns whether it was present.
    pub fn unregister(&mut self, topic: &str, id: SubscriberId) -> bool {
        let Some(subscribers) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Snapshot of the queues registered under `topic`.
    pub fn subscribers_of(&self, topic: &str) -> Vec<Arc<SubscriberQueue>> {
        self.topics
            .get(topic)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, topic: &str, id: SubscriberId) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|subscribers| subscribers.contains_key(&id))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, HashMap::len)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Snapshot of every registered queue across all topics.
    pub fn all(&self) -> Vec<Arc<SubscriberQueue>> {
        self.topics
            .values()
            .flat_map(|subscribers| subscribers.values().cloned())
            .collect()
    }

    /// Empties the registry, handing back everything that was in it.
    pub fn take_all(&mut self) -> Vec<Arc<SubscriberQueue>> {
        self.topics
            .drain()
            .flat_map(|(_, subscribers)| subscribers.into_values())
            .collect()
    }
}
