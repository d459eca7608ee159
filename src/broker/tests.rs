use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use super::queue::Enqueued;
use super::topic::TopicRegistry;
use super::{Broker, CloseReason, Event, QueueState, SubscriberQueue};
use crate::config::BrokerSettings;
use crate::utils::BrokerError;

const QUIET: Duration = Duration::from_millis(50);
const PATIENT: Duration = Duration::from_secs(1);

fn hello() -> Event {
    Event::new("Hello World!", "Bill Gates")
}

fn bounded_broker(max_queue_depth: usize) -> Broker {
    Broker::with_settings(BrokerSettings {
        max_queue_depth,
        ..BrokerSettings::default()
    })
}

#[test]
fn test_registry_register_is_idempotent() {
    let mut registry = TopicRegistry::new();
    let queue = Arc::new(SubscriberQueue::new(1, "room-1", 0));

    registry.register("room-1", queue.clone());
    registry.register("room-1", queue);
    assert_eq!(registry.subscriber_count("room-1"), 1);
    assert!(registry.contains("room-1", 1));
}

#[test]
fn test_registry_unregister_drops_empty_topic() {
    let mut registry = TopicRegistry::new();
    registry.register("room-1", Arc::new(SubscriberQueue::new(1, "room-1", 0)));
    registry.register("room-1", Arc::new(SubscriberQueue::new(2, "room-1", 0)));

    assert!(registry.unregister("room-1", 1));
    assert_eq!(registry.topic_count(), 1);
    assert!(registry.unregister("room-1", 2));
    assert!(registry.is_empty());

    // Absent handles and unknown topics are no-ops.
    assert!(!registry.unregister("room-1", 2));
    assert!(!registry.unregister("nowhere", 9));
}

#[test]
fn test_registry_snapshot_survives_unregister() {
    let mut registry = TopicRegistry::new();
    registry.register("room-1", Arc::new(SubscriberQueue::new(1, "room-1", 0)));
    registry.register("room-1", Arc::new(SubscriberQueue::new(2, "room-1", 0)));

    let snapshot = registry.subscribers_of("room-1");
    registry.unregister("room-1", 1);

    assert_eq!(snapshot.len(), 2);
    assert_eq!(registry.subscribers_of("room-1").len(), 1);
    assert!(registry.subscribers_of("elsewhere").is_empty());
}

#[test]
fn test_registry_take_all() {
    let mut registry = TopicRegistry::new();
    registry.register("a", Arc::new(SubscriberQueue::new(1, "a", 0)));
    registry.register("b", Arc::new(SubscriberQueue::new(2, "b", 0)));

    assert_eq!(registry.all().len(), 2);
    assert_eq!(registry.take_all().len(), 2);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_queue_fifo() {
    let queue = SubscriberQueue::new(1, "t", 0);
    queue.enqueue(Arc::new(Event::new("one", "s")));
    queue.enqueue(Arc::new(Event::new("two", "s")));

    assert_eq!(queue.next_event().await.unwrap().content, "one");
    assert_eq!(queue.next_event().await.unwrap().content, "two");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_queue_close_releases_waiter() {
    let queue = Arc::new(SubscriberQueue::new(1, "t", 0));
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.next_event().await })
    };

    tokio::task::yield_now().await;
    assert!(queue.close(CloseReason::Disposed));
    assert!(!queue.close(CloseReason::Disposed));

    let result = timeout(PATIENT, waiter).await.unwrap().unwrap();
    assert!(result.is_none());
    assert_eq!(queue.state(), QueueState::Closed);
    assert_eq!(queue.close_reason(), Some(CloseReason::Disposed));
}

#[tokio::test]
async fn test_queue_wakes_on_enqueue() {
    let queue = Arc::new(SubscriberQueue::new(1, "t", 0));
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.next_event().await })
    };

    tokio::task::yield_now().await;
    queue.enqueue(Arc::new(Event::new("late", "s")));

    let event = timeout(PATIENT, waiter).await.unwrap().unwrap();
    assert_eq!(event.unwrap().content, "late");
}

#[tokio::test]
async fn test_queue_closing_drains_then_ends() {
    let queue = SubscriberQueue::new(1, "t", 0);
    queue.enqueue(Arc::new(Event::new("queued", "s")));
    assert!(queue.begin_closing());
    assert!(!queue.begin_closing());

    assert_eq!(queue.enqueue(Arc::new(Event::new("late", "s"))), Enqueued::Dropped);
    assert_eq!(queue.next_event().await.unwrap().content, "queued");
    assert!(queue.next_event().await.is_none());
    assert_eq!(queue.state(), QueueState::Closed);
    assert_eq!(queue.close_reason(), Some(CloseReason::Drained));
}

#[tokio::test]
async fn test_queue_rejects_after_close() {
    let queue = SubscriberQueue::new(1, "t", 0);
    queue.enqueue(Arc::new(Event::new("buffered", "s")));
    queue.close(CloseReason::Disposed);

    assert_eq!(queue.enqueue(Arc::new(hello())), Enqueued::Dropped);
    assert!(queue.next_event().await.is_none());
}

#[test]
fn test_queue_overflow_closes() {
    let queue = SubscriberQueue::new(1, "t", 2);
    assert_eq!(queue.enqueue(Arc::new(hello())), Enqueued::Accepted);
    assert_eq!(queue.enqueue(Arc::new(hello())), Enqueued::Accepted);
    assert_eq!(queue.enqueue(Arc::new(hello())), Enqueued::Overflowed);

    assert_eq!(queue.state(), QueueState::Closed);
    assert_eq!(queue.close_reason(), Some(CloseReason::Overflow));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_basic_round_trip() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("room-1").unwrap();

    let ack = broker.publish("room-1", hello()).unwrap();
    assert_eq!(ack.message, "Received: \"Hello World!\" from \"Bill Gates\".");
    assert_eq!(ack.to_string(), ack.message);
    assert_eq!(ack.delivered, 1);

    let event = timeout(PATIENT, sub.next_event()).await.unwrap().unwrap();
    assert_eq!(*event, hello());
}

#[tokio::test]
async fn test_publish_without_subscribers_acknowledges() {
    let broker = Broker::new();
    let ack = broker.publish("empty", hello()).unwrap();
    assert_eq!(ack.delivered, 0);
    assert!(ack.message.contains("Hello World!"));
    assert!(ack.message.contains("Bill Gates"));
}

#[tokio::test]
async fn test_two_subscribers_one_publish() {
    let broker = Broker::new();
    let mut first = broker.subscribe("room-1").unwrap();
    let mut second = broker.subscribe("room-1").unwrap();

    let ack = broker.publish("room-1", hello()).unwrap();
    assert_eq!(ack.delivered, 2);

    let a = timeout(PATIENT, first.next_event()).await.unwrap().unwrap();
    let b = timeout(PATIENT, second.next_event()).await.unwrap().unwrap();
    assert_eq!(*a, hello());
    assert_eq!(*b, hello());

    assert!(timeout(QUIET, first.next_event()).await.is_err());
    assert!(timeout(QUIET, second.next_event()).await.is_err());
}

#[tokio::test]
async fn test_fan_out_preserves_order_for_each_subscriber() {
    let broker = Broker::new();
    let mut subs: Vec<_> = (0..5).map(|_| broker.subscribe("t").unwrap()).collect();

    for n in 0..10 {
        broker.publish("t", Event::new(n.to_string(), "seq")).unwrap();
    }

    for sub in &mut subs {
        for n in 0..10 {
            let event = timeout(PATIENT, sub.next_event()).await.unwrap().unwrap();
            assert_eq!(event.content, n.to_string());
        }
    }
}

#[tokio::test]
async fn test_topic_isolation() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("room-1").unwrap();

    let ack = broker.publish("room-2", hello()).unwrap();
    assert_eq!(ack.delivered, 0);
    assert!(timeout(QUIET, sub.next_event()).await.is_err());
}

#[tokio::test]
async fn test_disconnect_before_publish() {
    let broker = Broker::new();
    let mut gone = broker.subscribe("room-1").unwrap();
    let gone_id = gone.id();
    gone.dispose();

    assert!(!broker.is_registered("room-1", gone_id));
    assert_eq!(broker.subscriber_count("room-1"), 0);
    assert_eq!(broker.topic_count(), 0);

    let mut fresh = broker.subscribe("room-1").unwrap();
    let ack = broker.publish("room-1", hello()).unwrap();
    assert_eq!(ack.delivered, 1);

    assert!(gone.next_event().await.is_none());
    let event = timeout(PATIENT, fresh.next_event()).await.unwrap().unwrap();
    assert_eq!(*event, hello());
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("room-1").unwrap();
    let _other = broker.subscribe("room-1").unwrap();

    sub.dispose();
    sub.dispose();
    assert!(sub.is_disposed());
    assert_eq!(sub.close_reason(), Some(CloseReason::Disposed));
    assert_eq!(broker.subscriber_count("room-1"), 1);

    drop(sub);
    assert_eq!(broker.subscriber_count("room-1"), 1);
}

#[tokio::test]
async fn test_drop_unregisters() {
    let broker = Broker::new();
    {
        let _sub = broker.subscribe("room-1").unwrap();
        assert_eq!(broker.subscriber_count("room-1"), 1);
    }
    assert_eq!(broker.subscriber_count("room-1"), 0);
}

#[tokio::test]
async fn test_dispose_after_broker_dropped() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("room-1").unwrap();
    drop(broker);
    sub.dispose();
    assert!(sub.next_event().await.is_none());
}

#[tokio::test]
async fn test_stream_yields_and_unregisters_on_drop() {
    let broker = Broker::new();
    let mut stream = Box::pin(broker.subscribe("room-1").unwrap().into_stream());

    broker.publish("room-1", hello()).unwrap();
    let event = timeout(PATIENT, stream.next()).await.unwrap().unwrap();
    assert_eq!(*event, hello());

    drop(stream);
    assert_eq!(broker.subscriber_count("room-1"), 0);
}

#[tokio::test]
async fn test_invalid_topics_rejected() {
    let broker = Broker::new();
    for topic in ["", "   ", "bad\ntopic"] {
        assert!(matches!(
            broker.subscribe(topic),
            Err(BrokerError::InvalidTopic(_))
        ));
        assert!(matches!(
            broker.publish(topic, hello()),
            Err(BrokerError::InvalidTopic(_))
        ));
    }

    let long = "x".repeat(BrokerSettings::default().max_topic_len + 1);
    assert!(broker.subscribe(&long).is_err());
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test]
async fn test_drain_on_shutdown() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("room-1").unwrap();
    broker.publish("room-1", hello()).unwrap();

    assert!(broker.begin_drain());
    assert!(!broker.begin_drain());
    assert!(broker.is_draining());

    assert_eq!(broker.subscribe("room-1").unwrap_err(), BrokerError::ShuttingDown);

    // Accepted but dropped by the closing queue.
    let ack = broker.publish("room-1", Event::new("late", "x")).unwrap();
    assert_eq!(ack.delivered, 0);

    let event = timeout(PATIENT, sub.next_event()).await.unwrap().unwrap();
    assert_eq!(*event, hello());
    assert!(sub.next_event().await.is_none());
    assert_eq!(sub.close_reason(), Some(CloseReason::Drained));
}

#[tokio::test]
async fn test_close_all_force_closes() {
    let broker = Broker::new();
    let mut sub = broker.subscribe("room-1").unwrap();
    broker.publish("room-1", hello()).unwrap();
    broker.begin_drain();

    assert_eq!(broker.close_all(), 1);
    assert_eq!(broker.topic_count(), 0);
    assert!(sub.next_event().await.is_none());
    assert_eq!(sub.close_reason(), Some(CloseReason::Shutdown));
}

#[tokio::test]
async fn test_slow_consumer_is_disconnected() {
    let broker = bounded_broker(2);
    let mut slow = broker.subscribe("t").unwrap();
    let mut fast = broker.subscribe("t").unwrap();

    for n in 0..2 {
        broker.publish("t", Event::new(n.to_string(), "s")).unwrap();
        fast.next_event().await.unwrap();
    }
    let ack = broker.publish("t", Event::new("2", "s")).unwrap();
    assert_eq!(ack.delivered, 1);
    assert!(!broker.is_registered("t", slow.id()));
    assert!(broker.is_registered("t", fast.id()));

    assert!(slow.next_event().await.is_none());
    assert_eq!(slow.close_reason(), Some(CloseReason::Overflow));
    assert_eq!(fast.next_event().await.unwrap().content, "2");
}

#[tokio::test]
async fn test_unbounded_queue_keeps_everything() {
    let broker = bounded_broker(0);
    let mut sub = broker.subscribe("t").unwrap();
    for n in 0..5000 {
        broker.publish("t", Event::new(n.to_string(), "s")).unwrap();
    }
    for n in 0..5000 {
        assert_eq!(sub.next_event().await.unwrap().content, n.to_string());
    }
}
