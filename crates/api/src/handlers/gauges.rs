//! Handlers for the `/gauges` resource.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use calibra_core::audit::actions;
use calibra_core::error::CoreError;
use calibra_core::gauge::derive_fields;
use calibra_core::spreadsheet::{write_workbook, ExportRow};
use calibra_core::status::GaugeStatus;
use calibra_db::models::alert::Alert;
use calibra_db::models::audit::AuditEntry;
use calibra_db::models::gauge::{CreateGauge, Gauge, GaugeListQuery, GaugeStats, UpdateGauge};
use calibra_db::models::{page_bounds, Page};
use calibra_db::repositories::{AlertRepo, AuditRepo, GaugeRepo};

use crate::engine::{self, GaugeChange, ImportReport, PipelineContext, RecalculationSummary};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuth, RequireOperator};
use crate::response::DataResponse;
use crate::state::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// GET /api/v1/gauges
///
/// Filters: `status`, `gauge_type`, `search` (substring of id or type).
pub async fn list_gauges(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(params): Query<GaugeListQuery>,
) -> AppResult<Json<DataResponse<Page<Gauge>>>> {
    if let Some(status) = &params.status {
        status.parse::<GaugeStatus>()?;
    }
    let (limit, offset) = page_bounds(params.limit, params.offset);

    let items = GaugeRepo::list(&state.pool, &params).await?;
    let total = GaugeRepo::count(&state.pool, &params).await?;

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// POST /api/v1/gauges
///
/// Returns 201 with the stored gauge and any alerts it raised.
pub async fn create_gauge(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Json(input): Json<CreateGauge>,
) -> AppResult<(StatusCode, Json<DataResponse<GaugeChange>>)> {
    let ctx = PipelineContext::load(&state.pool, &state.event_bus, Some(user.user_id)).await?;
    let snapshot = input.into_snapshot();
    let change = engine::create_gauge(&ctx, &snapshot, actions::CREATE).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: change })))
}

/// GET /api/v1/gauges/stats
pub async fn gauge_stats(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> AppResult<Json<DataResponse<GaugeStats>>> {
    let stats = GaugeRepo::stats(&state.pool).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/gauges/{gauge_id}
pub async fn get_gauge(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(gauge_id): Path<String>,
) -> AppResult<Json<DataResponse<Gauge>>> {
    let gauge = engine::find_gauge(&state.pool, &gauge_id).await?;
    Ok(Json(DataResponse { data: gauge }))
}

/// PUT /api/v1/gauges/{gauge_id}
///
/// Absent fields keep their current value. The gauge id itself cannot change.
pub async fn update_gauge(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Path(gauge_id): Path<String>,
    Json(input): Json<UpdateGauge>,
) -> AppResult<Json<DataResponse<GaugeChange>>> {
    let ctx = PipelineContext::load(&state.pool, &state.event_bus, Some(user.user_id)).await?;
    let change = engine::update_gauge(
        &ctx,
        &gauge_id,
        |current| input.apply_to(current),
        actions::UPDATE,
    )
    .await?;
    Ok(Json(DataResponse { data: change }))
}

/// DELETE /api/v1/gauges/{gauge_id}
///
/// Admin only. Alerts are removed with the gauge; audit entries remain.
pub async fn delete_gauge(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(gauge_id): Path<String>,
) -> AppResult<StatusCode> {
    engine::delete_gauge(&state.pool, &state.event_bus, &gauge_id, Some(admin.user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/gauges/{gauge_id}/recalculate
pub async fn recalculate_gauge(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Path(gauge_id): Path<String>,
) -> AppResult<Json<DataResponse<GaugeChange>>> {
    let ctx = PipelineContext::load(&state.pool, &state.event_bus, Some(user.user_id)).await?;
    let (change, _) = engine::recalculate_gauge(&ctx, &gauge_id).await?;
    Ok(Json(DataResponse { data: change }))
}

/// POST /api/v1/gauges/recalculate
pub async fn recalculate_all(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
) -> AppResult<Json<DataResponse<RecalculationSummary>>> {
    let ctx = PipelineContext::load(&state.pool, &state.event_bus, Some(user.user_id)).await?;
    let summary = engine::recalculate_all(&ctx).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/gauges/{gauge_id}/alerts
pub async fn list_gauge_alerts(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(gauge_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<Alert>>>> {
    // 404 for unknown gauges rather than an empty list.
    engine::find_gauge(&state.pool, &gauge_id).await?;
    let alerts = AlertRepo::list_for_gauge(&state.pool, &gauge_id).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// GET /api/v1/gauges/{gauge_id}/audit
///
/// Works for deleted gauges too; their history outlives them.
pub async fn list_gauge_audit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(gauge_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<AuditEntry>>>> {
    let entries = AuditRepo::list_for_gauge(&state.pool, &gauge_id).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// POST /api/v1/gauges/import
///
/// Multipart form: required `file` (xlsx, xls or ods) and optional
/// `overwrite` (`true` replaces existing gauges, default `false`).
pub async fn import_gauges(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<ImportReport>>> {
    let mut file: Option<Vec<u8>> = None;
    let mut overwrite = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some(data.to_vec());
            }
            "overwrite" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                overwrite = parse_flag(&text)?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if file.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    tracing::info!(
        user_id = user.user_id,
        bytes = file.len(),
        overwrite,
        "Spreadsheet import started"
    );

    let ctx = PipelineContext::load(&state.pool, &state.event_bus, Some(user.user_id)).await?;
    let report = engine::import_workbook(&ctx, &file, overwrite).await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/gauges/export
///
/// Every gauge as an `.xlsx` download, derived fields computed as of today.
pub async fn export_gauges(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> AppResult<impl IntoResponse> {
    let ctx = PipelineContext::load(&state.pool, &state.event_bus, None).await?;
    let gauges = GaugeRepo::list_all(&state.pool).await?;

    let rows = gauges
        .iter()
        .map(|g| {
            let gauge = g.snapshot();
            let derived = derive_fields(&gauge, &ctx.thresholds, ctx.today)?;
            Ok(ExportRow { gauge, derived })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let bytes = write_workbook(&rows)?;
    let disposition = format!("attachment; filename=\"gauges-{}.xlsx\"", ctx.today);

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

fn parse_flag(raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "overwrite must be true or false, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accepts_common_spellings() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag(" on ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
