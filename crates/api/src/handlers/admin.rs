//! Handlers for the `/admin` resource (user management).
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use calibra_core::error::CoreError;
use calibra_core::roles::UserRole;
use calibra_db::models::user::{CreateUser, UserResponse};
use calibra_db::repositories::{RoleRepo, UserRepo};
use serde::Deserialize;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /admin/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Role name: `admin`, `operator` or `viewer`.
    pub role: String,
}

/// POST /api/v1/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let username = input.username.trim();
    if username.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "username is required".into(),
        )));
    }
    if !input.email.contains('@') {
        return Err(AppError::Core(CoreError::Validation(
            "email must be a valid address".into(),
        )));
    }
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let requested: UserRole = input.role.parse()?;
    let role = RoleRepo::find_by_name(&state.pool, requested.as_str())
        .await?
        .ok_or_else(|| AppError::InternalError(format!("Role '{requested}' is not seeded")))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: username.to_string(),
            email: input.email.trim().to_string(),
            password_hash,
            role_id: role.id,
        },
    )
    .await?;

    tracing::info!(
        user_id = user.id,
        role = %role.name,
        created_by = admin.user_id,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from_user(&user, role.name),
        }),
    ))
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = UserRepo::list(&state.pool).await?;
    let roles = RoleRepo::names_by_id(&state.pool).await?;
    let responses = users
        .iter()
        .map(|user| {
            let role = roles.get(&user.role_id).cloned().unwrap_or_default();
            UserResponse::from_user(user, role)
        })
        .collect();
    Ok(Json(DataResponse { data: responses }))
}
