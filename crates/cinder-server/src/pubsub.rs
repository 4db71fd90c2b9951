//! Pub/sub topic registry and fan-out.
//!
//! Maintains named topics, each backed by a bounded tokio broadcast
//! channel. One publish reaches every current subscriber of the topic.
//! Thread-safe via DashMap, and topic creation goes through the entry
//! API so concurrent first-subscribers to the same new topic observe
//! exactly one channel, never two racing creations.
//!
//! # Backpressure
//!
//! Delivery is never blocking for the publisher. Each subscriber has a
//! bounded buffer of [`TOPIC_CAPACITY`] messages; a subscriber that
//! falls behind loses the oldest messages (`RecvError::Lagged`) and
//! keeps receiving from there. At-most-once per subscriber, drop-oldest
//! on overflow.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Buffered messages per subscriber before a slow consumer starts
/// missing messages.
pub const TOPIC_CAPACITY: usize = 256;

/// The topic registry, shared across all connection tasks via
/// `Arc<PubSub>`.
#[derive(Debug, Default)]
pub struct PubSub {
    /// Topic name → broadcast sender. A receiver per subscriber.
    topics: DashMap<String, broadcast::Sender<Bytes>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber on `topic`, creating the topic if it
    /// doesn't exist yet. Get-or-create is atomic.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Bytes> {
        let entry = self.topics.entry(topic.to_string()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(TOPIC_CAPACITY);
            tx
        });
        entry.subscribe()
    }

    /// Removes a subscriber's registration on `topic`.
    ///
    /// Call before dropping the receiver: the topic entry is pruned
    /// when the caller's receiver is the last one, so a later publish
    /// finds no topic rather than a dead channel.
    pub fn unsubscribe(&self, topic: &str) {
        if let Some(entry) = self.topics.get(topic) {
            if entry.value().receiver_count() <= 1 {
                drop(entry);
                self.topics.remove(topic);
            }
        }
    }

    /// Delivers `payload` to every current subscriber of `topic`.
    /// Returns the number of subscribers reached; 0 when the topic has
    /// none (no delivery happens, and no topic is materialized).
    pub fn publish(&self, topic: &str, payload: Bytes) -> usize {
        match self.topics.get(topic) {
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of live topics. Used in tests and logging.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
