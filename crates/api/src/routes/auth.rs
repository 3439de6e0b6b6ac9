//! `/auth`: token issuance needs no credentials beyond the request body;
//! the session routes take the caller from the bearer token.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let token_issuance = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh));

    let session = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    token_issuance.merge(session)
}
