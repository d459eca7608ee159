//! Broker engine
//!
//! `Broker` is a cheap, cloneable handle over shared state: the topic
//! registry and the drain flag. It is constructed once at startup and handed
//! to whoever needs to publish, subscribe or shut down.
//!
//! Concurrency and usage notes:
//! - The registry sits behind one mutex. `publish` only holds it long enough
//!   to snapshot the subscriber list; enqueueing happens after the lock is
//!   released, so a subscriber disconnecting mid-publish cannot disturb the
//!   fan-out already in progress.
//! - `publish` never waits on consumers. A slow consumer grows its own queue
//!   until `max_queue_depth`, at which point it is cut off.
//! - The drain flag is flipped under the registry lock so that no queue can
//!   slip in after `begin_drain` has marked the existing ones as closing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::broker::event::{Acknowledgement, Event, validate_topic};
use crate::broker::queue::{CloseReason, Enqueued, SubscriberId, SubscriberQueue};
use crate::broker::subscription::Subscription;
use crate::broker::topic::TopicRegistry;
use crate::config::BrokerSettings;
use crate::utils::BrokerError;

#[derive(Debug)]
pub(crate) struct Shared {
    registry: Mutex<TopicRegistry>,
    draining: AtomicBool,
    next_id: AtomicU64,
    settings: BrokerSettings,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, TopicRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn unregister(&self, topic: &str, id: SubscriberId) -> bool {
        self.registry().unregister(topic, id)
    }
}

#[derive(Debug, Clone)]
pub struct Broker {
    shared: Arc<Shared>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::with_settings(BrokerSettings::default())
    }

    pub fn with_settings(settings: BrokerSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(TopicRegistry::new()),
                draining: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.shared.settings
    }

    /// Fans `event` out to every queue subscribed to `topic` right now.
    ///
    /// Succeeds with zero subscribers. Only a malformed topic is an error.
    pub fn publish(&self, topic: &str, event: Event) -> Result<Acknowledgement, BrokerError> {
        validate_topic(topic, self.shared.settings.max_topic_len)?;

        let event = Arc::new(event);
        let subscribers = self.shared.registry().subscribers_of(topic);

        let mut delivered = 0;
        for queue in &subscribers {
            match queue.enqueue(Arc::clone(&event)) {
                Enqueued::Accepted => delivered += 1,
                Enqueued::Dropped => {}
                Enqueued::Overflowed => {
                    warn!(
                        subscriber = queue.id(),
                        topic,
                        max_depth = self.shared.settings.max_queue_depth,
                        "subscriber queue overflowed, disconnecting slow consumer"
                    );
                    self.shared.unregister(topic, queue.id());
                }
            }
        }

        debug!(topic, subscribers = subscribers.len(), delivered, "published event");
        Ok(Acknowledgement::for_event(&event, delivered))
    }

    /// Registers a fresh queue under `topic` and returns its consuming handle.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        validate_topic(topic, self.shared.settings.max_topic_len)?;

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(
            id,
            topic,
            self.shared.settings.max_queue_depth,
        ));

        {
            let mut registry = self.shared.registry();
            if self.shared.draining.load(Ordering::Acquire) {
                return Err(BrokerError::ShuttingDown);
            }
            registry.register(topic, Arc::clone(&queue));
        }

        debug!(subscriber = id, topic, "subscribed");
        Ok(Subscription::new(queue, Arc::downgrade(&self.shared)))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared.registry().subscriber_count(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.shared.registry().topic_count()
    }

    pub fn is_registered(&self, topic: &str, id: SubscriberId) -> bool {
        self.shared.registry().contains(topic, id)
    }

    pub fn is_draining(&self) -> bool {
        self.shared.draining.load(Ordering::Acquire)
    }

    /// Refuses new subscriptions and moves every live queue to `Closing`.
    ///
    /// Returns `false` if a drain was already in progress.
    pub fn begin_drain(&self) -> bool {
        let registry = self.shared.registry();
        if self.shared.draining.swap(true, Ordering::AcqRel) {
            return false;
        }
        let queues = registry.all();
        drop(registry);

        let closing = queues.iter().filter(|queue| queue.begin_closing()).count();
        info!(subscribers = closing, "broker draining");
        true
    }

    /// Force-closes and unregisters every queue. Returns how many were still
    /// open or closing.
    pub fn close_all(&self) -> usize {
        let queues = self.shared.registry().take_all();
        let closed = queues
            .iter()
            .filter(|queue| queue.close(CloseReason::Shutdown))
            .count();
        if closed > 0 {
            info!(subscribers = closed, "force-closed remaining subscriptions");
        }
        closed
    }
}
