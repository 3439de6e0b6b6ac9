//! Recomputing derived fields: explicit recalculation and the periodic
//! status refresh.

use std::collections::HashSet;

use calibra_core::alert::generate_alerts;
use calibra_core::audit::actions;
use calibra_core::event_names::GAUGE_UPDATED;
use calibra_core::gauge::derive_fields;
use calibra_db::models::alert::Alert;
use calibra_db::repositories::{AlertRepo, GaugeRepo};
use serde::Serialize;

use super::{
    append_audit, gauge_not_found, persist_alerts, publish_alerts, publish_gauge, GaugeChange,
    PipelineContext,
};
use crate::error::AppResult;

/// Outcome of a bulk recalculation.
#[derive(Debug, Default, Serialize)]
pub struct RecalculationSummary {
    pub total: usize,
    /// Gauges whose stored derived fields were out of date.
    pub changed: usize,
    pub alerts_created: usize,
    /// Gauges that could not be recalculated; details are in the log.
    pub failed: usize,
}

/// Recompute one gauge and regenerate its alerts wholesale.
///
/// Unacknowledged alerts are dropped and the full alert set for the
/// current state is raised again. Acknowledged alerts stay as history.
/// Returns the change and whether the stored derived fields moved.
pub async fn recalculate_gauge(
    ctx: &PipelineContext<'_>,
    gauge_id: &str,
) -> AppResult<(GaugeChange, bool)> {
    recalculate_locked(ctx, gauge_id)
        .await?
        .ok_or_else(|| gauge_not_found(gauge_id))
}

/// Recalculation of the row as it is under lock. `None` when the gauge no
/// longer exists.
async fn recalculate_locked(
    ctx: &PipelineContext<'_>,
    gauge_id: &str,
) -> AppResult<Option<(GaugeChange, bool)>> {
    let mut tx = ctx.pool.begin().await?;
    let Some(gauge) = GaugeRepo::lock_by_gauge_id(&mut *tx, gauge_id).await? else {
        return Ok(None);
    };

    let snapshot = gauge.snapshot();
    let derived = derive_fields(&snapshot, &ctx.thresholds, ctx.today)?;
    let generated = generate_alerts(&snapshot, &ctx.thresholds, ctx.today)?;
    let changed = gauge.derived_differs(&derived);

    let current = if changed {
        GaugeRepo::update_derived(&mut *tx, gauge_id, &derived)
            .await?
            .ok_or_else(|| gauge_not_found(gauge_id))?
    } else {
        gauge.clone()
    };

    AlertRepo::delete_unacknowledged_for_gauge(&mut *tx, gauge_id).await?;
    let alerts = persist_alerts(&mut tx, generated).await?;

    if changed {
        append_audit(
            &mut tx,
            &current.gauge_id,
            actions::RECALCULATE,
            ctx.actor,
            Some(&gauge),
            Some(&current),
        )
        .await?;
    }
    tx.commit().await?;

    if changed {
        publish_gauge(ctx.bus, GAUGE_UPDATED, &current, ctx.actor)?;
    }
    publish_alerts(ctx.bus, &alerts, ctx.actor)?;

    tracing::debug!(
        gauge_id = %current.gauge_id,
        status = %current.status,
        changed,
        alerts = alerts.len(),
        "Gauge recalculated"
    );

    Ok(Some((
        GaugeChange {
            gauge: current,
            alerts,
        },
        changed,
    )))
}

/// Recalculate every gauge with one threshold snapshot.
///
/// The scan only supplies ids; each gauge is re-read under its row lock.
/// A failure on one gauge is logged and counted; the rest still run.
pub async fn recalculate_all(ctx: &PipelineContext<'_>) -> AppResult<RecalculationSummary> {
    let gauges = GaugeRepo::list_all(ctx.pool).await?;
    let mut summary = RecalculationSummary {
        total: gauges.len(),
        ..RecalculationSummary::default()
    };

    for gauge in &gauges {
        match recalculate_locked(ctx, &gauge.gauge_id).await {
            Ok(Some((change, changed))) => {
                summary.changed += usize::from(changed);
                summary.alerts_created += change.alerts.len();
            }
            // Deleted since the scan started.
            Ok(None) => {}
            Err(e) => {
                summary.failed += 1;
                tracing::error!(gauge_id = %gauge.gauge_id, error = %e, "Recalculation failed");
            }
        }
    }

    tracing::info!(
        total = summary.total,
        changed = summary.changed,
        alerts_created = summary.alerts_created,
        failed = summary.failed,
        "Recalculated all gauges"
    );
    Ok(summary)
}

/// Bring one gauge's stored status up to date with the calendar.
///
/// Source fields do not change here, so the transition generator would see
/// nothing. Instead, when the status worsened, the stateless generator runs
/// and only alerts with no open counterpart of the same type and severity
/// are raised. Returns `None` when nothing changed or the gauge is gone.
pub async fn refresh_status(
    ctx: &PipelineContext<'_>,
    gauge_id: &str,
) -> AppResult<Option<GaugeChange>> {
    let mut tx = ctx.pool.begin().await?;
    let Some(gauge) = GaugeRepo::lock_by_gauge_id(&mut *tx, gauge_id).await? else {
        return Ok(None);
    };

    let snapshot = gauge.snapshot();
    let derived = derive_fields(&snapshot, &ctx.thresholds, ctx.today)?;
    if !gauge.derived_differs(&derived) {
        return Ok(None);
    }
    let previous = gauge.stored_status()?;

    let current = GaugeRepo::update_derived(&mut *tx, gauge_id, &derived)
        .await?
        .ok_or_else(|| gauge_not_found(gauge_id))?;

    let alerts = if derived.status > previous {
        let open = open_alert_kinds(&AlertRepo::list_for_gauge(&mut *tx, gauge_id).await?);
        let fresh = generate_alerts(&snapshot, &ctx.thresholds, ctx.today)?
            .into_iter()
            .filter(|a| {
                !open.contains(&(
                    a.alert_type.as_str().to_string(),
                    a.severity.as_str().to_string(),
                ))
            });
        persist_alerts(&mut tx, fresh).await?
    } else {
        Vec::new()
    };

    append_audit(
        &mut tx,
        &current.gauge_id,
        actions::RECALCULATE,
        ctx.actor,
        Some(&gauge),
        Some(&current),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        gauge_id = %current.gauge_id,
        from = %previous,
        to = %derived.status,
        alerts = alerts.len(),
        "Gauge status refreshed"
    );

    publish_gauge(ctx.bus, GAUGE_UPDATED, &current, ctx.actor)?;
    publish_alerts(ctx.bus, &alerts, ctx.actor)?;
    Ok(Some(GaugeChange {
        gauge: current,
        alerts,
    }))
}

/// `(alert_type, severity)` pairs of the unacknowledged alerts in `alerts`.
fn open_alert_kinds(alerts: &[Alert]) -> HashSet<(String, String)> {
    alerts
        .iter()
        .filter(|a| !a.acknowledged)
        .map(|a| (a.alert_type.clone(), a.severity.clone()))
        .collect()
}
