//! Integration tests for the gauge, alert, threshold and audit repositories.

use assert_matches::assert_matches;
use calibra_core::alert::generate_alerts;
use calibra_core::audit::actions;
use calibra_core::gauge::{derive_fields, GaugeSnapshot};
use calibra_core::thresholds::ThresholdConfig;
use calibra_core::types::Date;
use calibra_db::models::alert::AlertListQuery;
use calibra_db::models::audit::{AuditQuery, CreateAuditEntry};
use calibra_db::models::gauge::GaugeListQuery;
use calibra_db::repositories::{AlertRepo, AuditRepo, GaugeRepo, ThresholdRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn today() -> Date {
    Date::from_ymd_opt(2025, 6, 15).unwrap()
}

fn snapshot(gauge_id: &str, produced: f64) -> GaugeSnapshot {
    GaugeSnapshot {
        gauge_id: gauge_id.to_string(),
        gauge_type: "Caliper".to_string(),
        max_capacity: 1000.0,
        produced_quantity: produced,
        last_calibration_date: Date::from_ymd_opt(2025, 6, 1).unwrap(),
        calibration_frequency: 12,
    }
}

async fn insert(pool: &PgPool, gauge_id: &str, produced: f64) {
    let g = snapshot(gauge_id, produced);
    let derived = derive_fields(&g, &ThresholdConfig::default(), today()).unwrap();
    GaugeRepo::create(pool, &g, &derived, None).await.unwrap();
}

// ---------------------------------------------------------------------------
// Gauges
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_and_find_gauge(pool: PgPool) {
    insert(&pool, "G-1", 850.0).await;

    let found = GaugeRepo::find_by_gauge_id(&pool, "G-1")
        .await
        .unwrap()
        .expect("gauge should exist");
    assert_eq!(found.status, "near_limit");
    assert_eq!(found.remaining_capacity, 150.0);
    assert_eq!(found.snapshot(), snapshot("G-1", 850.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_gauge_id_violates_unique_constraint(pool: PgPool) {
    insert(&pool, "G-1", 0.0).await;

    let g = snapshot("G-1", 0.0);
    let derived = derive_fields(&g, &ThresholdConfig::default(), today()).unwrap();
    let err = GaugeRepo::create(&pool, &g, &derived, None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        sqlx::Error::Database(ref db) if db.constraint() == Some("uq_gauges_gauge_id")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_status_and_search(pool: PgPool) {
    insert(&pool, "LINE1-A", 100.0).await;
    insert(&pool, "LINE1-B", 850.0).await;
    insert(&pool, "LINE2-A", 900.0).await;

    let near = GaugeListQuery {
        status: Some("near_limit".to_string()),
        ..GaugeListQuery::default()
    };
    let rows = GaugeRepo::list(&pool, &near).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(GaugeRepo::count(&pool, &near).await.unwrap(), 2);

    let search = GaugeListQuery {
        search: Some("line1".to_string()),
        ..GaugeListQuery::default()
    };
    let rows = GaugeRepo::list(&pool, &search).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|g| g.gauge_id.as_str()).collect();
    assert_eq!(ids, vec!["LINE1-A", "LINE1-B"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn search_treats_like_wildcards_literally(pool: PgPool) {
    insert(&pool, "G_1", 100.0).await;
    insert(&pool, "GX1", 100.0).await;
    insert(&pool, "CAP100%", 100.0).await;
    insert(&pool, "CAP1000", 100.0).await;
    insert(&pool, r"BAY\2", 100.0).await;

    let search = |term: &str| GaugeListQuery {
        search: Some(term.to_string()),
        ..GaugeListQuery::default()
    };

    for (term, expected) in [("G_1", "G_1"), ("100%", "CAP100%"), (r"Y\2", r"BAY\2")] {
        let rows = GaugeRepo::list(&pool, &search(term)).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|g| g.gauge_id.as_str()).collect();
        assert_eq!(ids, vec![expected], "search {term:?}");
        assert_eq!(GaugeRepo::count(&pool, &search(term)).await.unwrap(), 1);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleting_gauge_cascades_to_alerts_but_keeps_audit(pool: PgPool) {
    insert(&pool, "G-1", 1000.0).await;
    let g = snapshot("G-1", 1000.0);
    for alert in generate_alerts(&g, &ThresholdConfig::default(), today()).unwrap() {
        AlertRepo::create(&pool, &alert).await.unwrap();
    }
    AuditRepo::append(
        &pool,
        &CreateAuditEntry {
            gauge_id: "G-1".to_string(),
            action: actions::CREATE,
            actor_user_id: None,
            before_json: None,
            after_json: Some(serde_json::to_value(&g).unwrap()),
        },
    )
    .await
    .unwrap();

    assert_eq!(AlertRepo::list_for_gauge(&pool, "G-1").await.unwrap().len(), 1);

    let deleted = GaugeRepo::delete(&pool, "G-1").await.unwrap();
    assert!(deleted.is_some());
    assert!(AlertRepo::list_for_gauge(&pool, "G-1").await.unwrap().is_empty());
    assert_eq!(AuditRepo::list_for_gauge(&pool, "G-1").await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stats_count_statuses_and_open_alerts(pool: PgPool) {
    insert(&pool, "G-1", 100.0).await;
    insert(&pool, "G-2", 850.0).await;
    insert(&pool, "G-3", 1200.0).await;

    let g = snapshot("G-3", 1200.0);
    for alert in generate_alerts(&g, &ThresholdConfig::default(), today()).unwrap() {
        AlertRepo::create(&pool, &alert).await.unwrap();
    }

    let stats = GaugeRepo::stats(&pool).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.safe, 1);
    assert_eq!(stats.near_limit, 1);
    assert_eq!(stats.overdue, 1);
    assert_eq!(stats.unacknowledged_alerts, 1);
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn acknowledge_is_one_shot(pool: PgPool) {
    insert(&pool, "G-1", 1000.0).await;
    let g = snapshot("G-1", 1000.0);
    let generated = generate_alerts(&g, &ThresholdConfig::default(), today()).unwrap();
    let alert = AlertRepo::create(&pool, &generated[0]).await.unwrap();
    assert!(!alert.acknowledged);

    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, role_id)
         VALUES ('op', 'op@example.com', 'x', (SELECT id FROM roles WHERE name = 'operator'))
         RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let acked = AlertRepo::acknowledge(&pool, alert.id, user_id)
        .await
        .unwrap()
        .expect("first acknowledge succeeds");
    assert!(acked.acknowledged);
    assert_eq!(acked.acknowledged_by, Some(user_id));
    assert!(acked.acknowledged_at.is_some());

    let again = AlertRepo::acknowledge(&pool, alert.id, user_id).await.unwrap();
    assert!(again.is_none());

    let open = AlertListQuery {
        acknowledged: Some(false),
        ..AlertListQuery::default()
    };
    assert_eq!(AlertRepo::count(&pool, &open).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn thresholds_are_seeded_with_defaults(pool: PgPool) {
    let row = ThresholdRepo::get(&pool).await.unwrap();
    assert_eq!(row.config(), ThresholdConfig::default());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn threshold_update_round_trips(pool: PgPool) {
    let config = ThresholdConfig {
        overdue_cutoff: 0.05,
        calibration_required_cutoff: 0.15,
        near_limit_cutoff: 0.3,
        calibration_warning_months: 2,
    };
    let row = ThresholdRepo::update(&pool, &config, None).await.unwrap();
    assert_eq!(row.config(), config);
    assert_eq!(ThresholdRepo::get(&pool).await.unwrap().config(), config);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn inverted_thresholds_are_rejected_by_the_database(pool: PgPool) {
    let config = ThresholdConfig {
        calibration_required_cutoff: 0.5,
        near_limit_cutoff: 0.2,
        ..ThresholdConfig::default()
    };
    assert!(ThresholdRepo::update(&pool, &config, None).await.is_err());
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn audit_chain_links_and_verifies(pool: PgPool) {
    let mut hashes = Vec::new();
    for (i, action) in [actions::CREATE, actions::UPDATE, actions::RECALCULATE]
        .into_iter()
        .enumerate()
    {
        let entry = AuditRepo::append(
            &pool,
            &CreateAuditEntry {
                gauge_id: "G-1".to_string(),
                action,
                actor_user_id: None,
                before_json: None,
                after_json: Some(serde_json::json!({ "produced_quantity": i as f64 * 10.5 })),
            },
        )
        .await
        .unwrap();
        hashes.push(entry.integrity_hash);
    }
    assert_eq!(hashes.len(), 3);
    assert_ne!(hashes[0], hashes[1]);

    let result = AuditRepo::verify_chain(&pool).await.unwrap();
    assert!(result.chain_valid);
    assert_eq!(result.verified_entries, 3);

    let updates = AuditQuery {
        action: Some(actions::UPDATE.to_string()),
        ..AuditQuery::default()
    };
    assert_eq!(AuditRepo::count(&pool, &updates).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn audit_entries_cannot_be_modified(pool: PgPool) {
    AuditRepo::append(
        &pool,
        &CreateAuditEntry {
            gauge_id: "G-1".to_string(),
            action: actions::DELETE,
            actor_user_id: None,
            before_json: None,
            after_json: None,
        },
    )
    .await
    .unwrap();

    let result = sqlx::query("UPDATE audit_entries SET action = 'create'")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
