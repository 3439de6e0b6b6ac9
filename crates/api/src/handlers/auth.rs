//! Handlers for the `/auth` resource (login, refresh, logout, me).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use calibra_core::error::CoreError;
use calibra_core::roles::UserRole;
use calibra_core::types::DbId;
use calibra_db::models::session::NewRefreshSession;
use calibra_db::models::user::{User, UserResponse};
use calibra_db::repositories::{RoleRepo, SessionRepo, UserRepo};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{generate_access_token, hash_refresh_token, RefreshToken};
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Consecutive failed logins that lock an account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// How long a locked account stays locked.
const LOCK_DURATION_MINS: i32 = 15;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized(
        "Invalid username or password".into(),
    ))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Unknown users and wrong passwords get the same 401. Five consecutive
/// failures lock the account for 15 minutes.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = UserRepo::find_by_username(&state.pool, &input.username)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    if user.is_locked(Utc::now()) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is temporarily locked. Try again later.".into(),
        )));
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        let failure = UserRepo::record_failed_login(
            &state.pool,
            user.id,
            MAX_FAILED_ATTEMPTS,
            LOCK_DURATION_MINS,
        )
        .await?;
        if failure.failed_login_count >= MAX_FAILED_ATTEMPTS {
            tracing::warn!(
                user_id = user.id,
                failures = failure.failed_login_count,
                locked_until = ?failure.locked_until,
                "Account locked after failed logins"
            );
        }
        return Err(invalid_credentials());
    }

    UserRepo::record_successful_login(&state.pool, user.id).await?;
    let role = role_of(&state, &user).await?;
    tracing::info!(user_id = user.id, role = %role, "User logged in");

    Ok(Json(issue_tokens(&state, &user, role).await?))
}

/// POST /api/v1/auth/refresh
///
/// Exchanges a refresh token for a new pair. The presented token is consumed
/// in the same statement that validates it, so it works exactly once.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_hash = hash_refresh_token(&input.refresh_token);

    let user_id = SessionRepo::consume(&state.pool, &token_hash)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let role = role_of(&state, &user).await?;
    Ok(Json(issue_tokens(&state, &user, role).await?))
}

/// POST /api/v1/auth/logout
///
/// Revokes every session of the caller. Access tokens already issued stay
/// valid until they expire.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    let revoked = SessionRepo::consume_all_for_user(&state.pool, auth_user.user_id).await?;
    tracing::info!(user_id = auth_user.user_id, revoked, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("User", auth_user.user_id)))?;
    let role = RoleRepo::name_of(&state.pool, user.role_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, role),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn role_of(state: &AppState, user: &User) -> AppResult<UserRole> {
    let name = RoleRepo::name_of(&state.pool, user.role_id).await?;
    name.parse::<UserRole>().map_err(|_| {
        AppError::InternalError(format!("User {} has unknown role '{name}'", user.id))
    })
}

/// Sign an access token, persist a refresh session, and build the response.
async fn issue_tokens(state: &AppState, user: &User, role: UserRole) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user.id, role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let refresh = RefreshToken::generate();
    let session = NewRefreshSession {
        user_id: user.id,
        refresh_token_hash: &refresh.hash,
        expires_at: Utc::now() + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days),
    };
    SessionRepo::insert(&state.pool, &session).await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh.plaintext,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserInfo {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role,
        },
    })
}
