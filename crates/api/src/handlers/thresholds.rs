//! Handlers for the `/thresholds` resource.

use axum::extract::State;
use axum::Json;
use calibra_core::event_names::THRESHOLDS_UPDATED;
use calibra_core::thresholds::ThresholdConfig;
use calibra_db::models::threshold::ThresholdConfigRow;
use calibra_db::repositories::ThresholdRepo;
use calibra_events::LiveEvent;
use serde::Serialize;

use crate::engine::{self, PipelineContext, RecalculationSummary};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response of `PUT /thresholds`.
#[derive(Debug, Serialize)]
pub struct ThresholdUpdate {
    pub thresholds: ThresholdConfigRow,
    pub recalculation: RecalculationSummary,
}

/// GET /api/v1/thresholds
pub async fn get_thresholds(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> AppResult<Json<DataResponse<ThresholdConfigRow>>> {
    let row = ThresholdRepo::get(&state.pool).await?;
    Ok(Json(DataResponse { data: row }))
}

/// PUT /api/v1/thresholds
///
/// Replaces all four values, then recalculates every gauge against them.
pub async fn update_thresholds(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ThresholdConfig>,
) -> AppResult<Json<DataResponse<ThresholdUpdate>>> {
    input.validate()?;

    let row = ThresholdRepo::update(&state.pool, &input, Some(admin.user_id)).await?;
    tracing::info!(
        user_id = admin.user_id,
        overdue_cutoff = row.overdue_cutoff,
        calibration_required_cutoff = row.calibration_required_cutoff,
        near_limit_cutoff = row.near_limit_cutoff,
        calibration_warning_months = row.calibration_warning_months,
        "Thresholds updated"
    );

    let event = LiveEvent::new(THRESHOLDS_UPDATED)
        .with_actor(Some(admin.user_id))
        .with_data(&row)
        .map_err(|e| AppError::InternalError(format!("Event serialization error: {e}")))?;
    state.event_bus.publish(event);

    let ctx = PipelineContext::load(&state.pool, &state.event_bus, Some(admin.user_id)).await?;
    let recalculation = engine::recalculate_all(&ctx).await?;

    Ok(Json(DataResponse {
        data: ThresholdUpdate {
            thresholds: row,
            recalculation,
        },
    }))
}
