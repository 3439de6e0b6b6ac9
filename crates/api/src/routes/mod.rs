pub mod admin;
pub mod alerts;
pub mod audit;
pub mod auth;
pub mod gauges;
pub mod health;
pub mod thresholds;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                                  WebSocket live updates
///
/// /auth/login                          login (public)
/// /auth/refresh                        refresh (public)
/// /auth/logout                         logout (auth)
/// /auth/me                             current user (auth)
///
/// /admin/users                         list, create (admin)
///
/// /gauges                              list (auth), create (operator)
/// /gauges/stats                        dashboard counters (auth)
/// /gauges/import                       spreadsheet upload (operator)
/// /gauges/export                       xlsx download (auth)
/// /gauges/recalculate                  recalculate all (operator)
/// /gauges/{gauge_id}                   get (auth), update (operator), delete (admin)
/// /gauges/{gauge_id}/recalculate       recalculate one (operator)
/// /gauges/{gauge_id}/alerts            alerts of one gauge (auth)
/// /gauges/{gauge_id}/audit             audit trail of one gauge (auth)
///
/// /alerts                              list (auth)
/// /alerts/{id}                         delete (admin)
/// /alerts/{id}/acknowledge             acknowledge (operator)
///
/// /thresholds                          get (auth), update (admin)
///
/// /audit                               query (admin)
/// /audit/verify                        hash chain check (admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
        .nest("/gauges", gauges::router())
        .nest("/alerts", alerts::router())
        .nest("/thresholds", thresholds::router())
        .nest("/audit", audit::router())
}
