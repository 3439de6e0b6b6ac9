//! Create, update and delete.

use calibra_core::alert::{generate_alerts, generate_transition_alerts};
use calibra_core::audit::actions;
use calibra_core::event_names::{GAUGE_CREATED, GAUGE_DELETED, GAUGE_UPDATED};
use calibra_core::gauge::{derive_fields, GaugeSnapshot};
use calibra_core::types::DbId;
use calibra_db::models::gauge::Gauge;
use calibra_db::repositories::GaugeRepo;
use calibra_db::DbPool;
use calibra_events::{EventBus, LiveEvent};
use serde_json::json;

use super::{
    append_audit, gauge_not_found, persist_alerts, publish_alerts, publish_gauge, GaugeChange,
    PipelineContext,
};
use crate::error::AppResult;

/// Insert a new gauge and raise every alert its initial state warrants.
///
/// `action` is [`actions::CREATE`] for manual entry and [`actions::IMPORT`]
/// for spreadsheet rows. A duplicate `gauge_id` surfaces as a unique
/// violation on `uq_gauges_gauge_id`.
pub async fn create_gauge(
    ctx: &PipelineContext<'_>,
    snapshot: &GaugeSnapshot,
    action: &'static str,
) -> AppResult<GaugeChange> {
    let derived = derive_fields(snapshot, &ctx.thresholds, ctx.today)?;
    let generated = generate_alerts(snapshot, &ctx.thresholds, ctx.today)?;

    let mut tx = ctx.pool.begin().await?;
    let gauge = GaugeRepo::create(&mut *tx, snapshot, &derived, ctx.actor).await?;
    let alerts = persist_alerts(&mut tx, generated).await?;
    append_audit(&mut tx, &gauge.gauge_id, action, ctx.actor, None, Some(&gauge)).await?;
    tx.commit().await?;

    tracing::info!(
        gauge_id = %gauge.gauge_id,
        status = %gauge.status,
        alerts = alerts.len(),
        action,
        "Gauge created"
    );

    publish_gauge(ctx.bus, GAUGE_CREATED, &gauge, ctx.actor)?;
    publish_alerts(ctx.bus, &alerts, ctx.actor)?;
    Ok(GaugeChange { gauge, alerts })
}

/// Apply `edit` to the current source fields of `gauge_id`.
///
/// The row is locked before `edit` sees it, so overlapping updates apply
/// one after the other and each compares against the state the previous
/// one committed. Only edge-triggered alerts are raised: a condition that
/// already held before the edit does not alert again.
pub async fn update_gauge<F>(
    ctx: &PipelineContext<'_>,
    gauge_id: &str,
    edit: F,
    action: &'static str,
) -> AppResult<GaugeChange>
where
    F: FnOnce(&GaugeSnapshot) -> GaugeSnapshot,
{
    let mut tx = ctx.pool.begin().await?;
    let existing = GaugeRepo::lock_by_gauge_id(&mut *tx, gauge_id)
        .await?
        .ok_or_else(|| gauge_not_found(gauge_id))?;
    let current = existing.snapshot();
    let next = edit(&current);

    let derived = derive_fields(&next, &ctx.thresholds, ctx.today)?;
    let generated = generate_transition_alerts(&current, &next, &ctx.thresholds, ctx.today)?;

    let gauge = GaugeRepo::update(&mut *tx, &next, &derived, ctx.actor)
        .await?
        .ok_or_else(|| gauge_not_found(gauge_id))?;
    let alerts = persist_alerts(&mut tx, generated).await?;
    append_audit(
        &mut tx,
        &gauge.gauge_id,
        action,
        ctx.actor,
        Some(&existing),
        Some(&gauge),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        gauge_id = %gauge.gauge_id,
        from = %existing.status,
        to = %gauge.status,
        alerts = alerts.len(),
        action,
        "Gauge updated"
    );

    publish_gauge(ctx.bus, GAUGE_UPDATED, &gauge, ctx.actor)?;
    publish_alerts(ctx.bus, &alerts, ctx.actor)?;
    Ok(GaugeChange { gauge, alerts })
}

/// Delete a gauge. Its alerts are removed by the foreign-key cascade; its
/// audit entries are kept.
pub async fn delete_gauge(
    pool: &DbPool,
    bus: &EventBus,
    gauge_id: &str,
    actor: Option<DbId>,
) -> AppResult<Gauge> {
    let mut tx = pool.begin().await?;
    let gauge = GaugeRepo::delete(&mut *tx, gauge_id)
        .await?
        .ok_or_else(|| gauge_not_found(gauge_id))?;
    append_audit(&mut tx, &gauge.gauge_id, actions::DELETE, actor, Some(&gauge), None).await?;
    tx.commit().await?;

    tracing::info!(gauge_id = %gauge.gauge_id, "Gauge deleted");

    bus.publish(
        LiveEvent::new(GAUGE_DELETED)
            .with_gauge(gauge.gauge_id.clone())
            .with_actor(actor)
            .with_payload(json!({ "gauge_id": gauge.gauge_id })),
    );
    Ok(gauge)
}
