// crates/arbiter-core/src/runtime/bus.rs
// ============================================================================
// Module: Arbiter Event Bus
// Description: In-process topic pub/sub with bounded per-subscriber queues.
// Purpose: Fan pipeline events out to the trigger engine and SSE clients.
// Dependencies: tokio, crate::core::events
// ============================================================================

//! ## Overview
//! The event bus delivers published events to every subscriber of the topic,
//! at most once each, in publish order. Each subscriber owns a bounded queue;
//! when it is full the oldest queued event is dropped and the subscriber's
//! drop counter is incremented, so publishers never block beyond the enqueue.
//! Invariants:
//! - Delivery per subscriber preserves publish order within a topic.
//! - A closed subscription receives nothing and is pruned on the next publish.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde_json::Value;
use tokio::sync::Notify;

use crate::core::events::BusEvent;
use crate::core::events::Topic;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bound on each subscriber's queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// In-process topic-keyed publish/subscribe hub.
#[derive(Clone)]
pub struct EventBus {
    /// Shared bus state.
    inner: Arc<BusInner>,
}

/// Shared state behind an event bus handle.
struct BusInner {
    /// Bound applied to each subscriber queue.
    capacity: usize,
    /// Registered subscribers.
    subscribers: Mutex<Vec<Arc<SubscriberInner>>>,
    /// Total events dropped across all subscribers.
    dropped_total: AtomicU64,
}

/// Per-subscriber delivery state.
struct SubscriberInner {
    /// Topics the subscriber receives.
    topics: Vec<Topic>,
    /// Bounded event queue in arrival order.
    queue: Mutex<VecDeque<BusEvent>>,
    /// Wakeup signal for pending receivers.
    notify: Notify,
    /// Events dropped due to overflow.
    dropped: AtomicU64,
    /// Whether the subscription was closed.
    closed: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    /// Creates a bus with the given per-subscriber queue capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(Vec::new()),
                dropped_total: AtomicU64::new(0),
            }),
        }
    }

    /// Publishes a payload on a topic with empty provenance.
    pub fn publish(&self, topic: Topic, payload: Value) {
        self.publish_event(BusEvent::new(topic, payload));
    }

    /// Publishes a full event envelope.
    pub fn publish_event(&self, event: BusEvent) {
        let mut subscribers = lock_unpoisoned(&self.inner.subscribers);
        subscribers.retain(|subscriber| !subscriber.closed.load(Ordering::SeqCst));
        for subscriber in subscribers.iter() {
            if !subscriber.topics.contains(&event.topic) {
                continue;
            }
            let mut queue = lock_unpoisoned(&subscriber.queue);
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
                subscriber.dropped.fetch_add(1, Ordering::SeqCst);
                self.inner.dropped_total.fetch_add(1, Ordering::SeqCst);
            }
            queue.push_back(event.clone());
            drop(queue);
            subscriber.notify.notify_one();
        }
    }

    /// Subscribes to a set of topics.
    #[must_use]
    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        let subscriber = Arc::new(SubscriberInner {
            topics: topics.to_vec(),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        lock_unpoisoned(&self.inner.subscribers).push(Arc::clone(&subscriber));
        Subscription {
            inner: subscriber,
        }
    }

    /// Subscribes to every defined topic.
    #[must_use]
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&Topic::ALL)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock_unpoisoned(&self.inner.subscribers);
        subscribers.retain(|subscriber| !subscriber.closed.load(Ordering::SeqCst));
        subscribers.len()
    }

    /// Returns the total events dropped across all subscribers.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.inner.dropped_total.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Receiving side of a bus subscription.
pub struct Subscription {
    /// Shared per-subscriber state.
    inner: Arc<SubscriberInner>,
}

impl Subscription {
    /// Receives the next event, waiting until one arrives.
    ///
    /// Returns `None` after [`Subscription::close`].
    pub async fn recv(&self) -> Option<BusEvent> {
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Pops the next queued event without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<BusEvent> {
        lock_unpoisoned(&self.inner.queue).pop_front()
    }

    /// Returns the number of events dropped for this subscriber.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    /// Closes the subscription; queued events are discarded.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        lock_unpoisoned(&self.inner.queue).clear();
        self.inner.notify.notify_one();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::EventBus;
    use crate::core::events::Topic;

    #[tokio::test]
    async fn subscribers_receive_in_publish_order() {
        let bus = EventBus::new(16);
        let subscription = bus.subscribe(&[Topic::Judgment]);
        bus.publish(Topic::Judgment, json!({"seq": 1}));
        bus.publish(Topic::Judgment, json!({"seq": 2}));
        bus.publish(Topic::Judgment, json!({"seq": 3}));
        for expected in 1..=3 {
            let event = subscription.recv().await.expect("event");
            assert_eq!(event.payload["seq"], expected);
        }
    }

    #[tokio::test]
    async fn topics_are_filtered_per_subscription() {
        let bus = EventBus::new(16);
        let judgments = bus.subscribe(&[Topic::Judgment]);
        let blocks = bus.subscribe(&[Topic::Block]);
        bus.publish(Topic::Judgment, json!({"kind": "judgment"}));
        bus.publish(Topic::Block, json!({"kind": "block"}));
        assert_eq!(judgments.recv().await.expect("judgment").topic, Topic::Judgment);
        assert_eq!(blocks.recv().await.expect("block").topic, Topic::Block);
        assert!(judgments.try_recv().is_none());
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let bus = EventBus::new(2);
        let subscription = bus.subscribe(&[Topic::Alert]);
        bus.publish(Topic::Alert, json!({"seq": 1}));
        bus.publish(Topic::Alert, json!({"seq": 2}));
        bus.publish(Topic::Alert, json!({"seq": 3}));
        assert_eq!(subscription.dropped(), 1);
        assert_eq!(bus.dropped_total(), 1);
        let first = subscription.recv().await.expect("event");
        assert_eq!(first.payload["seq"], 2, "oldest event should be dropped");
    }

    #[tokio::test]
    async fn closed_subscriptions_are_pruned() {
        let bus = EventBus::new(16);
        let subscription = bus.subscribe(&[Topic::Judgment]);
        assert_eq!(bus.subscriber_count(), 1);
        subscription.close();
        bus.publish(Topic::Judgment, json!({}));
        assert_eq!(bus.subscriber_count(), 0);
        assert!(subscription.recv().await.is_none());
    }
}
