//! Route definitions for the `/alerts` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::alerts;
use crate::state::AppState;

/// ```text
/// GET    /                   -> list_alerts
/// DELETE /{id}               -> delete_alert
/// POST   /{id}/acknowledge   -> acknowledge_alert
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(alerts::list_alerts))
        .route("/{id}", delete(alerts::delete_alert))
        .route("/{id}/acknowledge", post(alerts::acknowledge_alert))
}
