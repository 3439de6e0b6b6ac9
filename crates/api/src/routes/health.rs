//! Liveness probe, mounted at the root outside `/api/v1`.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database did not answer.
    pub status: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub live: LiveHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub healthy: bool,
    pub latency_ms: u128,
}

#[derive(Serialize)]
pub struct LiveHealth {
    pub ws_connections: usize,
    /// Bus receivers: the WebSocket relay, plus any test or job subscribers.
    pub event_subscribers: usize,
}

/// GET /health
///
/// Answers 503 with the same body when the database is unreachable so load
/// balancers can act on the status code alone.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let started = Instant::now();
    let healthy = calibra_db::health_check(&state.pool).await.is_ok();
    let latency_ms = started.elapsed().as_millis();

    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            healthy,
            latency_ms,
        },
        live: LiveHealth {
            ws_connections: state.ws_manager.connection_count().await,
            event_subscribers: state.event_bus.subscriber_count(),
        },
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
