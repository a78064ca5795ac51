//! Framework-agnostic change notifications.
//!
//! The EventBus fans session notifications out to every observer (a desktop
//! UI, the daemon's stdout printer, tests) from the controller's apply loop.
//!
//! # Example
//!
//! ```rust
//! use castline_core::event_bus::EventBus;
//!
//! let event_bus = EventBus::new();
//!
//! // Everything
//! let _all = event_bus.subscribe();
//!
//! // Only one field
//! let _volume = event_bus.subscribe_to("session:field:volume");
//!
//! event_bus.emit("session:field:volume", &serde_json::json!(40));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Events beyond this many unread cause slow subscribers to lag.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A broadcast event: a type key, a JSON payload and when it was emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEvent {
    /// Event type identifier (e.g., "session:field:volume", "session:error").
    pub event_type: String,

    pub payload: serde_json::Value,

    pub emitted_at: DateTime<Utc>,
}

impl BroadcastEvent {
    /// Create an event stamped with the current time.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Broadcasts events to any number of subscribers over a tokio broadcast channel.
pub struct EventBus {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl EventBus {
    /// Create a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering at most `capacity` unread events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it; with none, the
    /// event is dropped and 0 is returned.
    pub fn emit<T: Serialize>(&self, event_type: &str, payload: &T) -> usize {
        let json_payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Failed to serialize {} payload: {}", event_type, e);
                return 0;
            }
        };

        self.emit_raw(BroadcastEvent::new(event_type, json_payload))
    }

    /// Emit a pre-built event. Returns the number of subscribers reached.
    pub fn emit_raw(&self, event: BroadcastEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to every future event. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to future events of a single type.
    pub fn subscribe_to(&self, event_type: impl Into<String>) -> FilteredReceiver {
        FilteredReceiver {
            inner: self.sender.subscribe(),
            event_type: event_type.into(),
        }
    }

    /// Get the current number of subscribers, filtered ones included.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver that skips every event whose type doesn't match.
pub struct FilteredReceiver {
    inner: broadcast::Receiver<BroadcastEvent>,
    event_type: String,
}

impl FilteredReceiver {
    /// The event type this receiver yields.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Wait for the next matching event.
    pub async fn recv(&mut self) -> Result<BroadcastEvent, RecvError> {
        loop {
            let event = self.inner.recv().await?;
            if event.event_type == self.event_type {
                return Ok(event);
            }
        }
    }

    /// Return the next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Result<BroadcastEvent, TryRecvError> {
        loop {
            let event = self.inner.try_recv()?;
            if event.event_type == self.event_type {
                return Ok(event);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
