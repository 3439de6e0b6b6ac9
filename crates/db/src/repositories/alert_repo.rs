//! Repository for the `alerts` table.

use calibra_core::alert::GeneratedAlert;
use calibra_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::alert::{Alert, AlertListQuery};
use crate::models::page_bounds;

const COLUMNS: &str = "\
    id, gauge_id, alert_type, severity, message, acknowledged, \
    acknowledged_by, acknowledged_at, created_at";

/// Provides insert, query and acknowledgment operations for alerts.
pub struct AlertRepo;

impl AlertRepo {
    /// Persist a generated alert.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        alert: &GeneratedAlert,
    ) -> Result<Alert, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts (gauge_id, alert_type, severity, message)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(&alert.gauge_id)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(&alert.message)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alerts WHERE id = $1");
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List alerts matching the filters, newest first.
    pub async fn list(pool: &PgPool, params: &AlertListQuery) -> Result<Vec<Alert>, sqlx::Error> {
        let (limit, offset) = page_bounds(params.limit, params.offset);
        let (where_clause, bind_idx) = build_alert_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM alerts {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${next_idx}",
            next_idx = bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, Alert>(&query);
        if let Some(acknowledged) = params.acknowledged {
            q = q.bind(acknowledged);
        }
        if let Some(ref severity) = params.severity {
            q = q.bind(severity);
        }
        if let Some(ref alert_type) = params.alert_type {
            q = q.bind(alert_type);
        }
        if let Some(ref gauge_id) = params.gauge_id {
            q = q.bind(gauge_id);
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count alerts matching the filters (pagination ignored).
    pub async fn count(pool: &PgPool, params: &AlertListQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, _) = build_alert_filter(params);
        let query = format!("SELECT COUNT(*)::BIGINT FROM alerts {where_clause}");

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        if let Some(acknowledged) = params.acknowledged {
            q = q.bind(acknowledged);
        }
        if let Some(ref severity) = params.severity {
            q = q.bind(severity);
        }
        if let Some(ref alert_type) = params.alert_type {
            q = q.bind(alert_type);
        }
        if let Some(ref gauge_id) = params.gauge_id {
            q = q.bind(gauge_id);
        }
        q.fetch_one(pool).await
    }

    /// All alerts for one gauge, newest first.
    pub async fn list_for_gauge<'e>(
        executor: impl PgExecutor<'e>,
        gauge_id: &str,
    ) -> Result<Vec<Alert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts WHERE gauge_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(gauge_id)
            .fetch_all(executor)
            .await
    }

    /// Mark an alert acknowledged.
    ///
    /// Returns `None` when the alert does not exist or is already
    /// acknowledged; the caller tells the two apart with [`Self::find_by_id`].
    pub async fn acknowledge(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts SET
                acknowledged = true,
                acknowledged_by = $2,
                acknowledged_at = NOW()
             WHERE id = $1 AND acknowledged = false
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a single alert. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove the unacknowledged alerts of a gauge before regeneration.
    ///
    /// Acknowledged alerts are history and are kept.
    pub async fn delete_unacknowledged_for_gauge<'e>(
        executor: impl PgExecutor<'e>,
        gauge_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE gauge_id = $1 AND acknowledged = false")
            .bind(gauge_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Build the WHERE clause for [`AlertListQuery`].
///
/// Bind order is acknowledged, severity, alert_type, gauge_id.
fn build_alert_filter(params: &AlertListQuery) -> (String, u32) {
    let mut conditions = Vec::new();
    let mut bind_idx = 1u32;

    if params.acknowledged.is_some() {
        conditions.push(format!("acknowledged = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.severity.is_some() {
        conditions.push(format!("severity = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.alert_type.is_some() {
        conditions.push(format!("alert_type = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.gauge_id.is_some() {
        conditions.push(format!("gauge_id = ${bind_idx}"));
        bind_idx += 1;
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, bind_idx)
}
