//! Handlers for the `/audit` resource. Admin only.

use axum::extract::{Query, State};
use axum::Json;
use calibra_core::audit::is_known_action;
use calibra_core::error::CoreError;
use calibra_db::models::audit::{AuditEntry, AuditQuery, IntegrityCheckResult};
use calibra_db::models::{page_bounds, Page};
use calibra_db::repositories::AuditRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/audit
///
/// Filters: `gauge_id`, `action`, `actor_user_id`, `from`, `to`.
pub async fn list_audit(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<AuditQuery>,
) -> AppResult<Json<DataResponse<Page<AuditEntry>>>> {
    if let Some(action) = &params.action {
        if !is_known_action(action) {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Unknown audit action: {action}"
            ))));
        }
    }
    let (limit, offset) = page_bounds(params.limit, params.offset);

    let items = AuditRepo::query(&state.pool, &params).await?;
    let total = AuditRepo::count(&state.pool, &params).await?;

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/v1/audit/verify
///
/// Re-walks the hash chain and reports the first entry that does not match.
pub async fn verify_audit_chain(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> AppResult<Json<DataResponse<IntegrityCheckResult>>> {
    let result = AuditRepo::verify_chain(&state.pool).await?;
    if result.chain_valid {
        tracing::info!(entries = result.verified_entries, "Audit chain verified");
    } else {
        tracing::warn!(
            first_break = ?result.first_break,
            user_id = admin.user_id,
            "Audit chain integrity failure"
        );
    }
    Ok(Json(DataResponse { data: result }))
}
