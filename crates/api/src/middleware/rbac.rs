//! Role-gated extractors.
//!
//! Handlers state the minimum role in their signature; a caller below it
//! gets 403 before the handler body runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use calibra_core::error::CoreError;
use calibra_core::roles::UserRole;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn authorize(
    parts: &mut Parts,
    state: &AppState,
    required: UserRole,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if !user.role.satisfies(required) {
        tracing::debug!(
            user_id = user.user_id,
            role = %user.role,
            required = %required,
            "Role check failed"
        );
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "{required} role or higher required"
        ))));
    }
    Ok(user)
}

/// Admins only: user management, threshold changes, audit reads.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, UserRole::Admin).await.map(Self)
    }
}

/// Operators and admins: gauge writes, imports, recalculation, alert
/// acknowledgment.
pub struct RequireOperator(pub AuthUser);

impl FromRequestParts<AppState> for RequireOperator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, UserRole::Operator).await.map(Self)
    }
}

/// Any signed-in user, including viewers.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, UserRole::Viewer).await.map(Self)
    }
}
