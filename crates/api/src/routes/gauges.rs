//! Route definitions for the `/gauges` resource.
//!
//! Role checks live in the handler extractors.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::gauges;
use crate::state::AppState;

/// ```text
/// GET    /                         -> list_gauges
/// POST   /                         -> create_gauge
/// GET    /stats                    -> gauge_stats
/// POST   /import                   -> import_gauges
/// GET    /export                   -> export_gauges
/// POST   /recalculate              -> recalculate_all
/// GET    /{gauge_id}               -> get_gauge
/// PUT    /{gauge_id}               -> update_gauge
/// DELETE /{gauge_id}               -> delete_gauge
/// POST   /{gauge_id}/recalculate   -> recalculate_gauge
/// GET    /{gauge_id}/alerts        -> list_gauge_alerts
/// GET    /{gauge_id}/audit         -> list_gauge_audit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(gauges::list_gauges).post(gauges::create_gauge))
        .route("/stats", get(gauges::gauge_stats))
        .route("/import", post(gauges::import_gauges))
        .route("/export", get(gauges::export_gauges))
        .route("/recalculate", post(gauges::recalculate_all))
        .route(
            "/{gauge_id}",
            get(gauges::get_gauge)
                .put(gauges::update_gauge)
                .delete(gauges::delete_gauge),
        )
        .route("/{gauge_id}/recalculate", post(gauges::recalculate_gauge))
        .route("/{gauge_id}/alerts", get(gauges::list_gauge_alerts))
        .route("/{gauge_id}/audit", get(gauges::list_gauge_audit))
}
