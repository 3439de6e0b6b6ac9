//! Consistency of pipeline steps under concurrent edits and failed writes.

mod common;

use axum::http::StatusCode;
use calibra_api::engine::{
    create_gauge, import_workbook, recalculate_gauge, update_gauge, PipelineContext,
};
use calibra_core::audit::actions;
use calibra_core::gauge::{derive_fields, GaugeSnapshot};
use calibra_core::spreadsheet::{write_workbook, ExportRow};
use calibra_core::thresholds::ThresholdConfig;
use calibra_db::models::alert::AlertListQuery;
use calibra_db::repositories::{AlertRepo, AuditRepo, GaugeRepo};
use calibra_events::EventBus;
use common::{post_json_auth, put_json_auth, today};
use serde_json::json;
use sqlx::PgPool;

fn snapshot(gauge_id: &str, max: f64, produced: f64) -> GaugeSnapshot {
    GaugeSnapshot {
        gauge_id: gauge_id.to_string(),
        gauge_type: "Thread".to_string(),
        max_capacity: max,
        produced_quantity: produced,
        last_calibration_date: today(),
        calibration_frequency: 12,
    }
}

async fn create_via_api(pool: &PgPool, token: &str, gauge_id: &str, max: f64, produced: f64) {
    let body = json!({
        "gauge_id": gauge_id,
        "max_capacity": max,
        "produced_quantity": produced,
        "last_calibration_date": today().to_string(),
        "calibration_frequency": 12,
    });
    let response =
        post_json_auth(common::build_test_app(pool.clone()), "/api/v1/gauges", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn open_alerts(pool: &PgPool, gauge_id: &str) -> Vec<(String, String)> {
    AlertRepo::list(
        pool,
        &AlertListQuery {
            gauge_id: Some(gauge_id.to_string()),
            acknowledged: Some(false),
            ..AlertListQuery::default()
        },
    )
    .await
    .unwrap()
    .into_iter()
    .map(|a| (a.alert_type, a.severity))
    .collect()
}

/// Make every alert insert fail, so the step after the gauge write errors.
async fn reject_alert_inserts(pool: &PgPool) {
    sqlx::query(
        "CREATE FUNCTION reject_alert_insert() RETURNS trigger AS $$
         BEGIN
             RAISE EXCEPTION 'alert inserts disabled';
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_alert_insert BEFORE INSERT ON alerts \
         FOR EACH ROW EXECUTE FUNCTION reject_alert_insert()",
    )
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Stale reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn recalculation_derives_from_the_current_row_not_the_scan(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    create_via_api(&pool, &token, "G-1", 1000.0, 100.0).await;

    // The bulk scan reads the row before a concurrent edit lands.
    let scanned = GaugeRepo::list_all(&pool).await.unwrap();
    assert_eq!(scanned[0].produced_quantity, 100.0);

    let response = put_json_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-1",
        json!({ "produced_quantity": 1000.0 }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let bus = EventBus::default();
    let ctx = PipelineContext {
        pool: &pool,
        bus: &bus,
        thresholds: ThresholdConfig {
            near_limit_cutoff: 0.95,
            ..ThresholdConfig::default()
        },
        today: today(),
        actor: None,
    };
    let (change, _) = recalculate_gauge(&ctx, &scanned[0].gauge_id).await.unwrap();
    assert_eq!(change.gauge.produced_quantity, 1000.0);
    assert_eq!(change.gauge.remaining_capacity, 0.0);
    assert_eq!(change.gauge.status, "overdue");

    let stored = GaugeRepo::find_by_gauge_id(&pool, "G-1").await.unwrap().unwrap();
    assert_eq!(stored.status, "overdue");
    assert_eq!(stored.remaining_capacity, 0.0);

    // The regenerated set describes the edited gauge.
    assert_eq!(
        open_alerts(&pool, "G-1").await,
        [("capacity".to_string(), "high".to_string())]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overlapping_updates_raise_the_crossing_alert_once(pool: PgPool) {
    let bus = EventBus::default();
    let ctx = PipelineContext::load(&pool, &bus, None).await.unwrap();
    create_gauge(&ctx, &snapshot("G-1", 100.0, 70.0), actions::CREATE)
        .await
        .unwrap();

    // Both edits were prepared against the same 70-of-100 state; each one
    // alone would cross the near-limit threshold.
    let prepared = GaugeRepo::find_by_gauge_id(&pool, "G-1").await.unwrap().unwrap();
    let to_85 = GaugeSnapshot {
        produced_quantity: 85.0,
        ..prepared.snapshot()
    };
    let to_90 = GaugeSnapshot {
        produced_quantity: 90.0,
        ..prepared.snapshot()
    };

    let (first, second) = tokio::join!(
        update_gauge(&ctx, "G-1", |_| to_85, actions::UPDATE),
        update_gauge(&ctx, "G-1", |_| to_90, actions::UPDATE),
    );
    let raised = first.unwrap().alerts.len() + second.unwrap().alerts.len();
    assert_eq!(raised, 1);
    assert_eq!(open_alerts(&pool, "G-1").await.len(), 1);

    // Each update's before-state is what the previous one committed.
    let audit = AuditRepo::list_for_gauge(&pool, "G-1").await.unwrap();
    assert_eq!(audit.len(), 3);
    let later_before = audit[0].before_json.as_ref().unwrap();
    let earlier_after = audit[1].after_json.as_ref().unwrap();
    assert_eq!(
        later_before["produced_quantity"],
        earlier_after["produced_quantity"]
    );
    assert_eq!(audit[1].before_json.as_ref().unwrap()["produced_quantity"], 70.0);
}

// ---------------------------------------------------------------------------
// Failed steps
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_alert_insert_leaves_no_partial_change(pool: PgPool) {
    let bus = EventBus::default();
    let ctx = PipelineContext::load(&pool, &bus, None).await.unwrap();
    create_gauge(&ctx, &snapshot("G-SAFE", 100.0, 10.0), actions::CREATE)
        .await
        .unwrap();
    reject_alert_inserts(&pool).await;
    let mut events = bus.subscribe();

    // Create: the exhausted gauge needs an alert, so nothing is saved.
    let err = create_gauge(&ctx, &snapshot("G-FULL", 100.0, 100.0), actions::CREATE).await;
    assert!(err.is_err());
    assert!(GaugeRepo::find_by_gauge_id(&pool, "G-FULL").await.unwrap().is_none());
    assert!(AuditRepo::list_for_gauge(&pool, "G-FULL").await.unwrap().is_empty());

    // Update: the row keeps its committed source fields.
    let err = update_gauge(
        &ctx,
        "G-SAFE",
        |current| GaugeSnapshot {
            produced_quantity: 100.0,
            ..current.clone()
        },
        actions::UPDATE,
    )
    .await;
    assert!(err.is_err());
    let stored = GaugeRepo::find_by_gauge_id(&pool, "G-SAFE").await.unwrap().unwrap();
    assert_eq!(stored.produced_quantity, 10.0);
    assert_eq!(stored.status, "safe");
    assert_eq!(AuditRepo::list_for_gauge(&pool, "G-SAFE").await.unwrap().len(), 1);

    // Nothing was announced for the rolled-back writes.
    assert!(events.try_recv().is_err());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn import_row_error_does_not_save_the_gauge(pool: PgPool) {
    let bus = EventBus::default();
    let ctx = PipelineContext::load(&pool, &bus, None).await.unwrap();
    reject_alert_inserts(&pool).await;

    let rows: Vec<ExportRow> = [snapshot("G-OK", 1000.0, 10.0), snapshot("G-FULL", 100.0, 100.0)]
        .into_iter()
        .map(|g| ExportRow {
            derived: derive_fields(&g, &ThresholdConfig::default(), today()).unwrap(),
            gauge: g,
        })
        .collect();
    let bytes = write_workbook(&rows).unwrap();

    let report = import_workbook(&ctx, &bytes, false).await.unwrap();
    assert_eq!(report.created, ["G-OK"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].gauge_id.as_deref(), Some("G-FULL"));

    assert!(GaugeRepo::find_by_gauge_id(&pool, "G-FULL").await.unwrap().is_none());
    assert!(AuditRepo::list_for_gauge(&pool, "G-FULL").await.unwrap().is_empty());
    assert!(GaugeRepo::find_by_gauge_id(&pool, "G-OK").await.unwrap().is_some());
}
