//! The `broker` module is the in-process fan-out core.
//!
//! - `event`: the published payload and topic validation.
//! - `queue`: the per-subscriber mailbox backing one stream.
//! - `topic`: the registry mapping topics to live queues.
//! - `subscription`: the consumer-side handle returned by `subscribe`.
//! - `engine`: the `Broker` tying the pieces together.

pub mod engine;
pub mod event;
pub mod queue;
pub mod subscription;
pub mod topic;

pub use engine::Broker;
pub use event::{Acknowledgement, Event, Topic};
pub use queue::{CloseReason, QueueState, SubscriberId, SubscriberQueue};
pub use subscription::Subscription;
pub use topic::TopicRegistry;

#[cfg(test)]
mod tests;
