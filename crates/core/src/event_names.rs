//! Live-update event names.
//!
//! The same strings are used as `LiveEvent::event_type` on the event bus
//! and as the `type` field of WebSocket frames sent to browser clients.

pub const GAUGE_CREATED: &str = "gauge_created";
pub const GAUGE_UPDATED: &str = "gauge_updated";
pub const GAUGE_DELETED: &str = "gauge_deleted";
pub const ALERT_CREATED: &str = "alert_created";
pub const ALERT_ACKNOWLEDGED: &str = "alert_acknowledged";
pub const THRESHOLDS_UPDATED: &str = "thresholds_updated";
pub const IMPORT_COMPLETED: &str = "import_completed";
