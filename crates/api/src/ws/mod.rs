//! WebSocket infrastructure for live dashboard updates.
//!
//! Connection bookkeeping, heartbeat pings, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
