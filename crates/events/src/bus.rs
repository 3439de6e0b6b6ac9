//! Broadcast-channel event bus.
//!
//! Shared as `Arc<EventBus>` through the application state. Publishing never
//! blocks; a subscriber that falls more than the channel capacity behind
//! observes `RecvError::Lagged` and skips ahead.

use calibra_core::types::{DbId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// A change to a gauge, an alert, or the thresholds that dashboards should
/// see without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    /// One of the names in `calibra_core::event_names`.
    pub event_type: String,
    /// Set for gauge- and alert-scoped events.
    pub gauge_id: Option<String>,
    /// `None` when a background job caused the event.
    pub actor_user_id: Option<DbId>,
    /// Forwarded to clients verbatim as `data`.
    pub payload: Value,
    pub timestamp: Timestamp,
}

impl LiveEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            gauge_id: None,
            actor_user_id: None,
            payload: Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_gauge(mut self, gauge_id: impl Into<String>) -> Self {
        self.gauge_id = Some(gauge_id.into());
        self
    }

    pub fn with_actor(mut self, user_id: Option<DbId>) -> Self {
        self.actor_user_id = user_id;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Serialize `data` as the payload.
    pub fn with_data<T: Serialize>(self, data: &T) -> Result<Self, serde_json::Error> {
        Ok(self.with_payload(serde_json::to_value(data)?))
    }

    /// The JSON shape browsers receive: `{"type", "data", "timestamp"}`.
    ///
    /// Actor and gauge id stay server-side; clients read the gauge from
    /// `data`.
    pub fn client_frame(&self) -> Value {
        json!({
            "type": self.event_type,
            "data": self.payload,
            "timestamp": self.timestamp,
        })
    }
}

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus: every subscriber sees every event published after it
/// subscribed.
pub struct EventBus {
    sender: broadcast::Sender<LiveEvent>,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every current subscriber and return how many there were.
    /// With none, the event is dropped.
    pub fn publish(&self, event: LiveEvent) -> usize {
        self.sender.send(event).unwrap_or_else(|unsent| {
            tracing::trace!(event_type = %unsent.0.event_type, "Event dropped, no subscribers");
            0
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
