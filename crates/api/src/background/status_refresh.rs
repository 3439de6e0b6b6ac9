//! Periodic gauge status refresh.
//!
//! Calibration-driven statuses change with the calendar even when nobody
//! edits a gauge. This job recomputes every gauge against today's date on a
//! fixed interval and saves, alerts on, and broadcasts the ones that moved.

use std::sync::Arc;
use std::time::Duration;

use calibra_db::repositories::GaugeRepo;
use calibra_db::DbPool;
use calibra_events::EventBus;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::{refresh_status, PipelineContext};
use crate::error::AppResult;

/// Counts from one refresh pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats {
    pub scanned: usize,
    pub updated: usize,
    pub alerts_created: usize,
    pub failed: usize,
}

/// Run the refresh loop until `cancel` fires.
///
/// The first pass runs immediately. A pass that overruns the interval
/// delays the next one instead of queueing extra passes.
pub async fn run(
    pool: DbPool,
    event_bus: Arc<EventBus>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Status refresh job started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Status refresh job stopping");
                break;
            }
            _ = ticker.tick() => {
                match refresh_all(&pool, &event_bus).await {
                    Ok(stats) if stats.updated > 0 || stats.failed > 0 => {
                        tracing::info!(
                            scanned = stats.scanned,
                            updated = stats.updated,
                            alerts_created = stats.alerts_created,
                            failed = stats.failed,
                            "Status refresh: pass complete"
                        );
                    }
                    Ok(stats) => {
                        tracing::debug!(scanned = stats.scanned, "Status refresh: nothing changed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Status refresh: pass failed");
                    }
                }
            }
        }
    }
}

/// One refresh pass over every gauge.
pub async fn refresh_all(pool: &DbPool, event_bus: &EventBus) -> AppResult<RefreshStats> {
    let ctx = PipelineContext::load(pool, event_bus, None).await?;
    let gauges = GaugeRepo::list_all(pool).await?;

    let mut stats = RefreshStats {
        scanned: gauges.len(),
        ..RefreshStats::default()
    };
    for gauge in &gauges {
        match refresh_status(&ctx, &gauge.gauge_id).await {
            Ok(Some(change)) => {
                stats.updated += 1;
                stats.alerts_created += change.alerts.len();
            }
            Ok(None) => {}
            Err(e) => {
                stats.failed += 1;
                tracing::error!(gauge_id = %gauge.gauge_id, error = %e, "Status refresh failed");
            }
        }
    }
    Ok(stats)
}
