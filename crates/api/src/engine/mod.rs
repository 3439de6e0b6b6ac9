//! Gauge pipeline shared by HTTP handlers and background jobs.
//!
//! Every gauge write follows the same order: lock the row, derive fields
//! with the core, persist, raise alerts, append an audit entry, commit, then
//! publish events. Everything before the commit shares one transaction, so
//! a failed step leaves no partial change and events only describe committed
//! state. The core stays pure; all I/O happens here.

mod import;
mod pipeline;
mod recalculate;

use calibra_core::alert::GeneratedAlert;
use calibra_core::error::CoreError;
use calibra_core::event_names::ALERT_CREATED;
use calibra_core::thresholds::ThresholdConfig;
use calibra_core::types::{Date, DbId};
use calibra_db::models::alert::Alert;
use calibra_db::models::audit::CreateAuditEntry;
use calibra_db::models::gauge::Gauge;
use calibra_db::repositories::{AlertRepo, AuditRepo, GaugeRepo, ThresholdRepo};
use calibra_db::DbPool;
use calibra_events::{EventBus, LiveEvent};
use serde::Serialize;
use serde_json::json;
use sqlx::PgConnection;

use crate::error::{AppError, AppResult};

pub use import::{import_workbook, ImportReport, ImportRowError};
pub use pipeline::{create_gauge, delete_gauge, update_gauge};
pub use recalculate::{recalculate_all, recalculate_gauge, refresh_status, RecalculationSummary};

/// A persisted gauge plus the alerts raised by the change that produced it.
#[derive(Debug, Serialize)]
pub struct GaugeChange {
    pub gauge: Gauge,
    pub alerts: Vec<Alert>,
}

/// Everything a pipeline step needs besides the gauge itself.
///
/// The threshold snapshot and evaluation date are fixed when the context is
/// built, so one bulk operation classifies every gauge the same way.
pub struct PipelineContext<'a> {
    pub pool: &'a DbPool,
    pub bus: &'a EventBus,
    pub thresholds: ThresholdConfig,
    pub today: Date,
    /// User behind the change; `None` for background jobs.
    pub actor: Option<DbId>,
}

impl<'a> PipelineContext<'a> {
    /// Load the current thresholds and evaluate as of today (UTC).
    pub async fn load(
        pool: &'a DbPool,
        bus: &'a EventBus,
        actor: Option<DbId>,
    ) -> AppResult<PipelineContext<'a>> {
        let thresholds = ThresholdRepo::get(pool).await?.config();
        Ok(Self {
            pool,
            bus,
            thresholds,
            today: today(),
            actor,
        })
    }
}

/// Today's date in UTC, the evaluation date for every classification.
pub fn today() -> Date {
    chrono::Utc::now().date_naive()
}

/// Fetch a gauge by its operator-assigned id, or 404.
pub async fn find_gauge(pool: &DbPool, gauge_id: &str) -> AppResult<Gauge> {
    GaugeRepo::find_by_gauge_id(pool, gauge_id)
        .await?
        .ok_or_else(|| gauge_not_found(gauge_id))
}

pub(crate) fn gauge_not_found(gauge_id: &str) -> AppError {
    AppError::Core(CoreError::not_found("Gauge", gauge_id))
}

async fn persist_alerts(
    conn: &mut PgConnection,
    generated: impl IntoIterator<Item = GeneratedAlert>,
) -> AppResult<Vec<Alert>> {
    let mut alerts = Vec::new();
    for alert in generated {
        alerts.push(AlertRepo::create(&mut *conn, &alert).await?);
    }
    Ok(alerts)
}

/// The audited view of a gauge: source fields plus status.
///
/// Float-valued derived fields are left out; they follow from the source
/// fields and keep the hashed JSON stable through JSONB storage.
fn audit_state(gauge: &Gauge) -> serde_json::Value {
    json!({
        "gauge_id": gauge.gauge_id,
        "gauge_type": gauge.gauge_type,
        "max_capacity": gauge.max_capacity,
        "produced_quantity": gauge.produced_quantity,
        "last_calibration_date": gauge.last_calibration_date,
        "calibration_frequency": gauge.calibration_frequency,
        "next_calibration_date": gauge.next_calibration_date,
        "status": gauge.status,
    })
}

async fn append_audit(
    conn: &mut PgConnection,
    gauge_id: &str,
    action: &'static str,
    actor_user_id: Option<DbId>,
    before: Option<&Gauge>,
    after: Option<&Gauge>,
) -> AppResult<()> {
    let entry = CreateAuditEntry {
        gauge_id: gauge_id.to_string(),
        action,
        actor_user_id,
        before_json: before.map(audit_state),
        after_json: after.map(audit_state),
    };
    AuditRepo::append_in(conn, &entry).await?;
    Ok(())
}

fn to_payload<T: Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::InternalError(format!("Event serialization error: {e}")))
}

fn publish_gauge(
    bus: &EventBus,
    event_type: &str,
    gauge: &Gauge,
    actor: Option<DbId>,
) -> AppResult<()> {
    bus.publish(
        LiveEvent::new(event_type)
            .with_gauge(gauge.gauge_id.clone())
            .with_actor(actor)
            .with_payload(to_payload(gauge)?),
    );
    Ok(())
}

fn publish_alerts(bus: &EventBus, alerts: &[Alert], actor: Option<DbId>) -> AppResult<()> {
    for alert in alerts {
        bus.publish(
            LiveEvent::new(ALERT_CREATED)
                .with_gauge(alert.gauge_id.clone())
                .with_actor(actor)
                .with_payload(to_payload(alert)?),
        );
    }
    Ok(())
}
