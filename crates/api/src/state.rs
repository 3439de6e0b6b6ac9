use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: every field is a pool handle or an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: calibra_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Event bus for gauge, alert and threshold changes.
    pub event_bus: Arc<calibra_events::EventBus>,
}
