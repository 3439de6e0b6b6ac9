//! Live-update fan-out from the event bus to WebSocket clients.

mod relay;

pub use relay::{event_frame, LiveUpdateRelay};
