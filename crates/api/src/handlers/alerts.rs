//! Handlers for the `/alerts` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use calibra_core::alert::{AlertSeverity, AlertType};
use calibra_core::error::CoreError;
use calibra_core::event_names::ALERT_ACKNOWLEDGED;
use calibra_core::types::DbId;
use calibra_db::models::alert::{Alert, AlertListQuery};
use calibra_db::models::{page_bounds, Page};
use calibra_db::repositories::AlertRepo;
use calibra_events::LiveEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuth, RequireOperator};
use crate::response::DataResponse;
use crate::state::AppState;

fn alert_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::not_found("Alert", id))
}

/// GET /api/v1/alerts
///
/// Filters: `acknowledged`, `severity`, `alert_type`, `gauge_id`. Newest first.
pub async fn list_alerts(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(params): Query<AlertListQuery>,
) -> AppResult<Json<DataResponse<Page<Alert>>>> {
    if let Some(severity) = &params.severity {
        severity.parse::<AlertSeverity>()?;
    }
    if let Some(alert_type) = &params.alert_type {
        alert_type.parse::<AlertType>()?;
    }
    let (limit, offset) = page_bounds(params.limit, params.offset);

    let items = AlertRepo::list(&state.pool, &params).await?;
    let total = AlertRepo::count(&state.pool, &params).await?;

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// POST /api/v1/alerts/{id}/acknowledge
///
/// An alert is acknowledged once; a second attempt is 409.
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Alert>>> {
    let Some(alert) = AlertRepo::acknowledge(&state.pool, id, user.user_id).await? else {
        return Err(match AlertRepo::find_by_id(&state.pool, id).await? {
            Some(_) => AppError::Core(CoreError::Conflict(format!(
                "Alert {id} is already acknowledged"
            ))),
            None => alert_not_found(id),
        });
    };

    tracing::info!(alert_id = id, gauge_id = %alert.gauge_id, user_id = user.user_id, "Alert acknowledged");

    let event = LiveEvent::new(ALERT_ACKNOWLEDGED)
        .with_gauge(alert.gauge_id.clone())
        .with_actor(Some(user.user_id))
        .with_data(&alert)
        .map_err(|e| AppError::InternalError(format!("Event serialization error: {e}")))?;
    state.event_bus.publish(event);

    Ok(Json(DataResponse { data: alert }))
}

/// DELETE /api/v1/alerts/{id}
pub async fn delete_alert(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !AlertRepo::delete(&state.pool, id).await? {
        return Err(alert_not_found(id));
    }
    tracing::info!(alert_id = id, user_id = admin.user_id, "Alert deleted");
    Ok(StatusCode::NO_CONTENT)
}
