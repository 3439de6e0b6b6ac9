use axum::routing::get;
use axum::Router;

use crate::handlers::thresholds;
use crate::state::AppState;

/// ```text
/// GET /  -> get_thresholds
/// PUT /  -> update_thresholds
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(thresholds::get_thresholds).put(thresholds::update_thresholds),
    )
}
