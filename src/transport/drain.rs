//! Graceful shutdown
//!
//! `Drain` is the two-phase shutdown hook the server exposes:
//! `begin_drain` refuses new subscriptions and stops the accept loop;
//! `await_drain_complete` waits for every tracked connection to finish
//! delivering what was already queued, force-closing whatever is left once
//! the grace period runs out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tracing::{info, warn};

use crate::broker::Broker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection finished on its own.
    Completed,
    /// The grace period elapsed; `stragglers` connections were still open.
    ForcedClose { stragglers: usize },
}

#[derive(Debug)]
struct DrainInner {
    broker: Broker,
    started: AtomicBool,
    signal: watch::Sender<bool>,
    active: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone)]
pub struct Drain {
    inner: Arc<DrainInner>,
}

/// Held by a connection task for as long as it may still deliver events.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<DrainInner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl Drain {
    pub fn new(broker: Broker) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            inner: Arc::new(DrainInner {
                broker,
                started: AtomicBool::new(false),
                signal,
                active: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn track(&self) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Resolves once a drain has begun; immediately if it already has.
    pub async fn signalled(&self) {
        let mut rx = self.inner.signal.subscribe();
        let _ = rx.wait_for(|draining| *draining).await;
    }

    /// Phase one. Returns `false` if the drain had already begun.
    pub fn begin_drain(&self) -> bool {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(
            connections = self.active_connections(),
            "draining: refusing new subscriptions"
        );
        self.inner.broker.begin_drain();
        self.inner.signal.send_replace(true);
        true
    }

    /// Phase two. Waits up to `grace` for tracked connections to finish, then
    /// force-closes every remaining subscription.
    pub async fn await_drain_complete(&self, grace: Duration) -> DrainOutcome {
        let outcome = match tokio::time::timeout(grace, self.wait_idle()).await {
            Ok(()) => DrainOutcome::Completed,
            Err(_) => DrainOutcome::ForcedClose {
                stragglers: self.active_connections(),
            },
        };

        let closed = self.inner.broker.close_all();
        match outcome {
            DrainOutcome::Completed => info!("drain complete"),
            DrainOutcome::ForcedClose { stragglers } => warn!(
                stragglers,
                subscriptions = closed,
                grace_ms = grace.as_millis() as u64,
                "drain grace period elapsed, force-closing"
            ),
        }
        outcome
    }

    /// Both phases back to back.
    pub async fn drain_and_dispose(&self, grace: Duration) -> DrainOutcome {
        self.begin_drain();
        self.await_drain_complete(grace).await
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active_connections() == 0 {
                return;
            }
            notified.await;
        }
    }
}
