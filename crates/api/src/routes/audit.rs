use axum::routing::get;
use axum::Router;

use crate::handlers::audit;
use crate::state::AppState;

/// ```text
/// GET /        -> list_audit
/// GET /verify  -> verify_audit_chain
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(audit::list_audit))
        .route("/verify", get(audit::verify_audit_chain))
}
