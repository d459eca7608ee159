//! Subscriber queue
//!
//! One queue backs exactly one subscription. Producers append with
//! `enqueue`, the single consumer pulls with `next_event`, which parks on a
//! `Notify` until an event arrives or the queue stops being `Open`.
//!
//! State machine:
//! - `Open`: accepts and delivers events.
//! - `Closing`: refuses new events, still hands out the buffered ones, and
//!   becomes `Closed` once the buffer is empty.
//! - `Closed`: terminal, buffer discarded, every pull yields end-of-stream.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::broker::event::{Event, Topic};

pub type SubscriberId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The consumer side went away or asked to stop.
    Disposed,
    /// A `Closing` queue handed out its last buffered event.
    Drained,
    /// The consumer fell `max_depth` events behind.
    Overflow,
    /// Shutdown grace period ran out.
    Shutdown,
}

/// Outcome of a single `enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    Dropped,
    Overflowed,
}

#[derive(Debug)]
struct Inner {
    state: QueueState,
    buffer: VecDeque<Arc<Event>>,
    close_reason: Option<CloseReason>,
}

#[derive(Debug)]
pub struct SubscriberQueue {
    id: SubscriberId,
    topic: Topic,
    /// Zero means unbounded.
    max_depth: usize,
    inner: Mutex<Inner>,
    ready: Notify,
}

impl SubscriberQueue {
    pub fn new(id: SubscriberId, topic: impl Into<Topic>, max_depth: usize) -> Self {
        Self {
            id,
            topic: topic.into(),
            max_depth,
            inner: Mutex::new(Inner {
                state: QueueState::Open,
                buffer: VecDeque::new(),
                close_reason: None,
            }),
            ready: Notify::new(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> QueueState {
        self.lock().state
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.lock().close_reason
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `event` if the queue is `Open`. A full bounded queue is closed
    /// with [`CloseReason::Overflow`] instead.
    pub fn enqueue(&self, event: Arc<Event>) -> Enqueued {
        let mut inner = self.lock();
        if inner.state != QueueState::Open {
            return Enqueued::Dropped;
        }

        let outcome = if self.max_depth > 0 && inner.buffer.len() >= self.max_depth {
            inner.state = QueueState::Closed;
            inner.buffer.clear();
            inner.close_reason = Some(CloseReason::Overflow);
            Enqueued::Overflowed
        } else {
            inner.buffer.push_back(event);
            Enqueued::Accepted
        };
        drop(inner);

        self.ready.notify_one();
        outcome
    }

    /// Waits for the next event. `None` is end-of-stream and is final.
    pub async fn next_event(&self) -> Option<Arc<Event>> {
        loop {
            {
                let mut inner = self.lock();
                if let Some(event) = inner.buffer.pop_front() {
                    return Some(event);
                }
                match inner.state {
                    QueueState::Open => {}
                    QueueState::Closing => {
                        inner.state = QueueState::Closed;
                        if inner.close_reason.is_none() {
                            inner.close_reason = Some(CloseReason::Drained);
                        }
                        return None;
                    }
                    QueueState::Closed => return None,
                }
            }
            // notify_one leaves a permit behind, so a push that lands between
            // the unlock above and this await is not lost.
            self.ready.notified().await;
        }
    }

    /// Stops accepting events but lets the consumer drain what is buffered.
    pub fn begin_closing(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != QueueState::Open {
            return false;
        }
        inner.state = QueueState::Closing;
        drop(inner);

        self.ready.notify_one();
        true
    }

    /// Moves to `Closed`, discarding anything buffered. Returns `false` if the
    /// queue was already closed.
    pub fn close(&self, reason: CloseReason) -> bool {
        let mut inner = self.lock();
        if inner.state == QueueState::Closed {
            return false;
        }
        inner.state = QueueState::Closed;
        inner.buffer.clear();
        inner.close_reason = Some(reason);
        drop(inner);

        self.ready.notify_one();
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
