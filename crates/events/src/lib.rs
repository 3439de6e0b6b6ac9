//! In-process event bus for gauge lifecycle events.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`LiveEvent`]: the event envelope published by handlers and
//!   background jobs and relayed to WebSocket clients.

pub mod bus;

pub use bus::{EventBus, LiveEvent};
