//! Consumer-side subscription handle
//!
//! A `Subscription` owns the pull side of one queue. Disposing it (or
//! dropping it) closes the queue and removes it from the registry; both
//! steps happen once no matter how many times disposal is requested.

use std::sync::{Arc, Weak};

use futures::Stream;
use tracing::debug;

use crate::broker::engine::Shared;
use crate::broker::event::Event;
use crate::broker::queue::{CloseReason, QueueState, SubscriberId, SubscriberQueue};

#[derive(Debug)]
pub struct Subscription {
    queue: Arc<SubscriberQueue>,
    broker: Weak<Shared>,
    disposed: bool,
}

impl Subscription {
    pub(crate) fn new(queue: Arc<SubscriberQueue>, broker: Weak<Shared>) -> Self {
        Self {
            queue,
            broker,
            disposed: false,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.queue.id()
    }

    pub fn topic(&self) -> &str {
        self.queue.topic()
    }

    pub fn state(&self) -> QueueState {
        self.queue.state()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.queue.close_reason()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Waits for the next event on this topic.
    ///
    /// Returns `None` once the stream has ended (disposed, drained, overflowed
    /// or force-closed); a finished subscription never yields again.
    pub async fn next_event(&mut self) -> Option<Arc<Event>> {
        if self.disposed {
            return None;
        }
        self.queue.next_event().await
    }

    /// Closes the queue and unregisters it. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if std::mem::replace(&mut self.disposed, true) {
            return;
        }

        self.queue.close(CloseReason::Disposed);
        let unregistered = self
            .broker
            .upgrade()
            .is_some_and(|shared| shared.unregister(self.queue.topic(), self.queue.id()));

        debug!(
            subscriber = self.queue.id(),
            topic = %self.queue.topic(),
            unregistered,
            "subscription disposed"
        );
    }

    /// Turns the subscription into a `Stream`. Dropping the stream disposes it.
    pub fn into_stream(self) -> impl Stream<Item = Arc<Event>> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.next_event().await?;
            Some((event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}
