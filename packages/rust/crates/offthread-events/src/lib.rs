//! Event bus for image request lifecycles.
//!
//! Provides a pub/sub event system backed by tokio's broadcast channel.
//! The coordinator publishes every consumer status transition and every
//! failure here, so that observers (CLI progress output, metrics, tests)
//! do not need a callback on each consumer.
//!
//! # Architecture
//!
//! ```text
//! ImageEvent (source, topic, payload)
//!      ↓
//! EventBus.publish() → broadcast::Sender
//!      ↓
//! Fan-out to multiple Subscribers
//!      ↓
//! Each observer receives events asynchronously
//! ```

pub mod topics;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

pub use topics::sources;

/// Default number of buffered events before slow subscribers start lagging.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Core event model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEvent {
    /// Unique event identifier
    pub id: String,
    /// Event source (e.g., "coordinator", "painter")
    pub source: String,
    /// Event topic (e.g., "image/status", "image/failed")
    pub topic: String,
    /// Flexible JSON payload
    pub payload: Value,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl ImageEvent {
    /// Create a new event
    pub fn new(source: impl Into<String>, topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Create a status transition event for one consumer.
    pub fn status_change(
        source: &str,
        consumer: u64,
        url: Option<&str>,
        previous: &str,
        current: &str,
    ) -> Self {
        Self::new(
            source,
            topics::STATUS_CHANGED,
            json!({
                "consumer": consumer,
                "url": url,
                "previous": previous,
                "status": current,
            }),
        )
    }

    /// Create a failure event for one consumer.
    pub fn failure(source: &str, topic: &str, consumer: u64, url: Option<&str>, error: &str) -> Self {
        Self::new(
            source,
            topic,
            json!({ "consumer": consumer, "url": url, "error": error }),
        )
    }

    /// Consumer id carried in the payload, if any.
    #[must_use]
    pub fn consumer(&self) -> Option<u64> {
        self.payload.get("consumer").and_then(Value::as_u64)
    }

    /// Status name carried in the payload of a status event, if any.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }
}

impl std::fmt::Display for ImageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} -> {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.source,
            self.topic,
            self.payload
        )
    }
}

/// High-performance async event bus
///
/// Uses `tokio::sync::broadcast` channel for:
/// - Thread-safe 1-to-Many fan-out
/// - Non-blocking publish
/// - Automatic cleanup on receiver drop
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Broadcast sender (clonable for multiple publishers)
    tx: broadcast::Sender<ImageEvent>,
    /// Bus capacity for backpressure handling
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Get the bus capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers who received the event.
    /// Returns 0 if there are no subscribers (not an error).
    pub fn publish(&self, event: ImageEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Publish an event with topic and payload convenience
    pub fn emit(&self, source: &str, topic: &str, payload: Value) -> usize {
        self.publish(ImageEvent::new(source, topic, payload))
    }

    /// Subscribe to the event bus
    ///
    /// Returns a receiver that will receive all future events.
    /// Dropping the receiver automatically unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ImageEvent> {
        self.tx.subscribe()
    }

    /// Get current subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
