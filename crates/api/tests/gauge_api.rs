//! HTTP-level integration tests for the `/gauges` resource.
//!
//! Covers the create/update/delete pipeline (derived fields, alerts, audit
//! trail), spreadsheet import and export, and recalculation.

mod common;

use axum::http::StatusCode;
use calibra_core::gauge::{derive_fields, GaugeSnapshot};
use calibra_core::spreadsheet::{parse_workbook, write_workbook, ExportRow};
use calibra_core::thresholds::ThresholdConfig;
use chrono::Months;
use common::{
    body_bytes, body_json, delete_auth, get_auth, post_auth, post_json_auth, post_multipart_auth,
    put_json_auth, today,
};
use serde_json::json;
use sqlx::PgPool;

fn gauge_body(gauge_id: &str, max: f64, produced: f64) -> serde_json::Value {
    json!({
        "gauge_id": gauge_id,
        "gauge_type": "Caliper",
        "max_capacity": max,
        "produced_quantity": produced,
        "last_calibration_date": today().to_string(),
        "calibration_frequency": 12,
    })
}

async fn create(pool: &PgPool, token: &str, body: serde_json::Value) -> serde_json::Value {
    let response =
        post_json_auth(common::build_test_app(pool.clone()), "/api/v1/gauges", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

fn snapshot(gauge_id: &str, produced: f64) -> GaugeSnapshot {
    GaugeSnapshot {
        gauge_id: gauge_id.to_string(),
        gauge_type: "Torque".to_string(),
        max_capacity: 1000.0,
        produced_quantity: produced,
        last_calibration_date: today(),
        calibration_frequency: 12,
    }
}

fn workbook(gauges: &[GaugeSnapshot]) -> Vec<u8> {
    let rows: Vec<ExportRow> = gauges
        .iter()
        .map(|g| ExportRow {
            gauge: g.clone(),
            derived: derive_fields(g, &ThresholdConfig::default(), today()).unwrap(),
        })
        .collect();
    write_workbook(&rows).unwrap()
}

// ---------------------------------------------------------------------------
// Create / get / list
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_computes_derived_fields(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;

    let data = create(&pool, &token, gauge_body("  G-100 ", 1000.0, 250.0)).await;

    let gauge = &data["gauge"];
    assert_eq!(gauge["gauge_id"], "G-100");
    assert_eq!(gauge["remaining_capacity"], 750.0);
    assert_eq!(gauge["capacity_utilization"], 25.0);
    assert_eq!(gauge["status"], "safe");
    let next_due = today().checked_add_months(Months::new(12)).unwrap();
    assert_eq!(gauge["next_calibration_date"], next_due.to_string());
    assert!(data["alerts"].as_array().unwrap().is_empty());

    let response = get_auth(common::build_test_app(pool), "/api/v1/gauges/G-100", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "safe");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_raises_alerts_for_current_conditions(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;

    let near = create(&pool, &token, gauge_body("G-NEAR", 1000.0, 850.0)).await;
    assert_eq!(near["gauge"]["status"], "near_limit");
    let alerts = near["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_type"], "capacity");
    assert_eq!(alerts[0]["severity"], "medium");

    let over = create(&pool, &token, gauge_body("G-OVER", 1000.0, 1200.0)).await;
    assert_eq!(over["gauge"]["status"], "overdue");
    assert_eq!(over["gauge"]["remaining_capacity"], -200.0);
    let alerts = over["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["severity"], "high");

    let mut stale = gauge_body("G-STALE", 1000.0, 0.0);
    let two_years_ago = today().checked_sub_months(Months::new(24)).unwrap();
    stale["last_calibration_date"] = json!(two_years_ago.to_string());
    let stale = create(&pool, &token, stale).await;
    assert_eq!(stale["gauge"]["status"], "overdue");
    assert_eq!(stale["alerts"][0]["alert_type"], "calibration");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_rejects_invalid_and_duplicate_gauges(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    create(&pool, &token, gauge_body("G-1", 1000.0, 0.0)).await;

    let invalid = [
        gauge_body("G-2", 0.0, 0.0),
        gauge_body("G-2", 1000.0, -1.0),
        gauge_body("   ", 1000.0, 0.0),
        json!({
            "gauge_id": "G-2",
            "max_capacity": 10.0,
            "last_calibration_date": today().to_string(),
            "calibration_frequency": 0,
        }),
    ];
    for body in invalid {
        let response =
            post_json_auth(common::build_test_app(pool.clone()), "/api/v1/gauges", body, &token)
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    let response = post_json_auth(
        common::build_test_app(pool),
        "/api/v1/gauges",
        gauge_body("G-1", 500.0, 0.0),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn viewers_can_read_but_not_write(pool: PgPool) {
    let operator = common::token_for(&pool, "olga", "operator").await;
    let viewer = common::token_for(&pool, "victor", "viewer").await;
    create(&pool, &operator, gauge_body("G-1", 1000.0, 0.0)).await;

    let response = get_auth(common::build_test_app(pool.clone()), "/api/v1/gauges", &viewer).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges",
        gauge_body("G-2", 1000.0, 0.0),
        &viewer,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete_auth(common::build_test_app(pool), "/api/v1/gauges/G-1", &operator).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_status_and_search(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    create(&pool, &token, gauge_body("LINE1-A", 1000.0, 100.0)).await;
    create(&pool, &token, gauge_body("LINE1-B", 1000.0, 900.0)).await;
    create(&pool, &token, gauge_body("LINE2-A", 1000.0, 100.0)).await;

    let response = get_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges?status=safe&search=line1",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await["data"].clone();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["gauge_id"], "LINE1-A");

    let response = get_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges?status=bogus",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get_auth(common::build_test_app(pool), "/api/v1/gauges/stats", &token).await;
    let stats = body_json(response).await["data"].clone();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["safe"], 2);
    assert_eq!(stats["near_limit"], 1);
    assert_eq!(stats["unacknowledged_alerts"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_gauge_is_404(pool: PgPool) {
    let token = common::token_for(&pool, "ada", "admin").await;

    for uri in ["/api/v1/gauges/NOPE", "/api/v1/gauges/NOPE/alerts"] {
        let response = get_auth(common::build_test_app(pool.clone()), uri, &token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let response = put_json_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/NOPE",
        json!({ "produced_quantity": 1.0 }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete_auth(common::build_test_app(pool), "/api/v1/gauges/NOPE", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_only_alerts_on_new_conditions(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    create(&pool, &token, gauge_body("G-1", 1000.0, 100.0)).await;

    let update = |produced: f64| {
        let pool = pool.clone();
        let token = token.clone();
        async move {
            let response = put_json_auth(
                common::build_test_app(pool),
                "/api/v1/gauges/G-1",
                json!({ "produced_quantity": produced }),
                &token,
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            body_json(response).await["data"].clone()
        }
    };

    let crossed = update(850.0).await;
    assert_eq!(crossed["gauge"]["status"], "near_limit");
    assert_eq!(crossed["alerts"].as_array().unwrap().len(), 1);

    // Still near the limit: nothing new to report.
    let deeper = update(860.0).await;
    assert!(deeper["alerts"].as_array().unwrap().is_empty());

    let exhausted = update(1000.0).await;
    assert_eq!(exhausted["gauge"]["status"], "overdue");
    assert_eq!(exhausted["alerts"][0]["severity"], "high");

    // Unchanged fields survive a partial update.
    assert_eq!(exhausted["gauge"]["gauge_type"], "Caliper");
    assert_eq!(exhausted["gauge"]["calibration_frequency"], 12);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_removes_alerts_and_keeps_audit_trail(pool: PgPool) {
    let operator = common::token_for(&pool, "olga", "operator").await;
    let admin = common::token_for(&pool, "ada", "admin").await;
    create(&pool, &operator, gauge_body("G-1", 1000.0, 900.0)).await;
    put_json_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-1",
        json!({ "gauge_type": "Micrometer" }),
        &operator,
    )
    .await;

    let response = delete_auth(common::build_test_app(pool.clone()), "/api/v1/gauges/G-1", &admin).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(common::build_test_app(pool.clone()), "/api/v1/gauges/G-1", &admin).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/alerts?gauge_id=G-1",
        &admin,
    )
    .await;
    assert_eq!(body_json(response).await["data"]["total"], 0);

    // Newest first: delete, update, create.
    let response = get_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-1/audit",
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let entries = body_json(response).await["data"].clone();
    let actions: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["delete", "update", "create"]);
    assert!(entries[0]["after_json"].is_null());
    assert_eq!(entries[1]["before_json"]["gauge_type"], "Caliper");
    assert_eq!(entries[1]["after_json"]["gauge_type"], "Micrometer");

    let response = get_auth(common::build_test_app(pool), "/api/v1/audit/verify", &admin).await;
    let check = body_json(response).await["data"].clone();
    assert_eq!(check["chain_valid"], true);
    assert_eq!(check["verified_entries"], 3);
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn import_creates_skips_and_overwrites(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    create(&pool, &token, gauge_body("G-EXISTING", 1000.0, 10.0)).await;

    let file = workbook(&[snapshot("G-NEW", 900.0), snapshot("G-EXISTING", 500.0)]);

    let response = post_multipart_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/import",
        &file,
        &[],
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await["data"].clone();
    assert_eq!(report["total_rows"], 2);
    assert_eq!(report["created"], json!(["G-NEW"]));
    assert_eq!(report["skipped"], json!(["G-EXISTING"]));
    assert_eq!(report["alerts_created"], 1);

    let response = post_multipart_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/import",
        &file,
        &[("overwrite", "true")],
        &token,
    )
    .await;
    let report = body_json(response).await["data"].clone();
    assert_eq!(report["updated"], json!(["G-NEW", "G-EXISTING"]));

    let response = get_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-EXISTING",
        &token,
    )
    .await;
    let gauge = body_json(response).await["data"].clone();
    assert_eq!(gauge["produced_quantity"], 500.0);
    assert_eq!(gauge["gauge_type"], "Torque");

    let response = get_auth(
        common::build_test_app(pool),
        "/api/v1/gauges/G-NEW/audit",
        &token,
    )
    .await;
    let entries = body_json(response).await["data"].clone();
    assert_eq!(entries[entries.as_array().unwrap().len() - 1]["action"], "import");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn import_rejects_unreadable_files(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;

    let response = post_multipart_auth(
        common::build_test_app(pool),
        "/api/v1/gauges/import",
        b"definitely not a spreadsheet",
        &[],
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn export_round_trips_through_import(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    create(&pool, &token, gauge_body("G-A", 1000.0, 100.0)).await;
    create(&pool, &token, gauge_body("G-B", 2000.0, 1900.0)).await;

    let response = get_auth(common::build_test_app(pool), "/api/v1/gauges/export", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(&format!("gauges-{}.xlsx", today())));

    let rows = parse_workbook(&body_bytes(response).await).unwrap();
    let gauges: Vec<GaugeSnapshot> = rows.into_iter().map(|r| r.result.unwrap()).collect();
    assert_eq!(gauges.len(), 2);
    assert_eq!(gauges[0].gauge_id, "G-A");
    assert_eq!(gauges[1].max_capacity, 2000.0);
    assert_eq!(gauges[1].produced_quantity, 1900.0);
}

// ---------------------------------------------------------------------------
// Recalculation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn recalculation_replaces_open_alerts_and_keeps_acknowledged(pool: PgPool) {
    let token = common::token_for(&pool, "olga", "operator").await;
    let created = create(&pool, &token, gauge_body("G-1", 1000.0, 1000.0)).await;
    let alert_id = created["alerts"][0]["id"].as_i64().unwrap();

    let response = post_auth(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/alerts/{alert_id}/acknowledge"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-1/recalculate",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let change = body_json(response).await["data"].clone();
    assert_eq!(change["alerts"].as_array().unwrap().len(), 1);

    // Running it again regenerates rather than piling up duplicates.
    post_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-1/recalculate",
        &token,
    )
    .await;

    let response = get_auth(
        common::build_test_app(pool.clone()),
        "/api/v1/gauges/G-1/alerts",
        &token,
    )
    .await;
    let alerts = body_json(response).await["data"].clone();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts.iter().filter(|a| a["acknowledged"] == true).count(), 1);

    let response = post_auth(common::build_test_app(pool), "/api/v1/gauges/recalculate", &token).await;
    let summary = body_json(response).await["data"].clone();
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["changed"], 0);
    assert_eq!(summary["failed"], 0);
}
