//! Bearer-token extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use calibra_core::error::CoreError;
use calibra_core::roles::UserRole;
use calibra_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Caller identity decoded from a valid access token.
///
/// The role is the one embedded at login; a role change takes effect when
/// the user next refreshes.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub role: UserRole,
}

fn unauthorized(msg: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(msg.to_string()))
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Malformed Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized("Expected: Authorization: Bearer <token>"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Invalid or expired token"))?;
        // A token signed with our key but carrying an unknown role is not
        // something we issued.
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        Ok(AuthUser {
            user_id: claims.sub,
            role,
        })
    }
}
