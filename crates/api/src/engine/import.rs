//! Spreadsheet import.

use calibra_core::audit::actions;
use calibra_core::event_names::IMPORT_COMPLETED;
use calibra_core::gauge::GaugeSnapshot;
use calibra_core::spreadsheet::parse_workbook;
use calibra_db::repositories::GaugeRepo;
use calibra_events::LiveEvent;
use serde::Serialize;

use super::{create_gauge, to_payload, update_gauge, GaugeChange, PipelineContext};
use crate::error::{AppError, AppResult};

/// A row that was not imported.
#[derive(Debug, Serialize)]
pub struct ImportRowError {
    /// 1-based sheet row number.
    pub row: u32,
    pub gauge_id: Option<String>,
    pub message: String,
}

/// Per-row result of an import.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    /// Existing gauges left alone because `overwrite` was off.
    pub skipped: Vec<String>,
    pub errors: Vec<ImportRowError>,
    pub alerts_created: usize,
}

enum RowOutcome {
    Created(GaugeChange),
    Updated(GaugeChange),
    Skipped,
}

/// Import every row of a workbook.
///
/// New gauges are created. Existing gauges are updated only when
/// `overwrite` is set, and otherwise skipped. Bad rows are reported and do
/// not stop the import; a missing column or unreadable file fails it whole.
pub async fn import_workbook(
    ctx: &PipelineContext<'_>,
    bytes: &[u8],
    overwrite: bool,
) -> AppResult<ImportReport> {
    let rows = parse_workbook(bytes)?;
    let mut report = ImportReport {
        total_rows: rows.len(),
        ..ImportReport::default()
    };

    for row in rows {
        let snapshot = match row.result {
            Ok(snapshot) => snapshot,
            Err(message) => {
                report.errors.push(ImportRowError {
                    row: row.row_number,
                    gauge_id: None,
                    message,
                });
                continue;
            }
        };

        match import_row(ctx, &snapshot, overwrite).await {
            Ok(RowOutcome::Created(change)) => {
                report.alerts_created += change.alerts.len();
                report.created.push(change.gauge.gauge_id);
            }
            Ok(RowOutcome::Updated(change)) => {
                report.alerts_created += change.alerts.len();
                report.updated.push(change.gauge.gauge_id);
            }
            Ok(RowOutcome::Skipped) => report.skipped.push(snapshot.gauge_id),
            Err(e) => {
                tracing::warn!(
                    row = row.row_number,
                    gauge_id = %snapshot.gauge_id,
                    error = %e,
                    "Import row failed"
                );
                report.errors.push(ImportRowError {
                    row: row.row_number,
                    gauge_id: Some(snapshot.gauge_id),
                    message: row_error_message(&e),
                });
            }
        }
    }

    tracing::info!(
        total_rows = report.total_rows,
        created = report.created.len(),
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "Spreadsheet import finished"
    );

    ctx.bus.publish(
        LiveEvent::new(IMPORT_COMPLETED)
            .with_actor(ctx.actor)
            .with_payload(to_payload(&report)?),
    );
    Ok(report)
}

async fn import_row(
    ctx: &PipelineContext<'_>,
    snapshot: &GaugeSnapshot,
    overwrite: bool,
) -> AppResult<RowOutcome> {
    match GaugeRepo::find_by_gauge_id(ctx.pool, &snapshot.gauge_id).await? {
        None => Ok(RowOutcome::Created(
            create_gauge(ctx, snapshot, actions::IMPORT).await?,
        )),
        Some(_) if overwrite => Ok(RowOutcome::Updated(
            update_gauge(
                ctx,
                &snapshot.gauge_id,
                |_| snapshot.clone(),
                actions::IMPORT,
            )
            .await?,
        )),
        Some(_) => Ok(RowOutcome::Skipped),
    }
}

/// Client-safe text for a failed row. Database details stay in the log.
fn row_error_message(err: &AppError) -> String {
    match err {
        AppError::Core(core) => core.to_string(),
        AppError::BadRequest(msg) => msg.clone(),
        AppError::Database(_) | AppError::InternalError(_) => {
            "Row could not be saved".to_string()
        }
    }
}
