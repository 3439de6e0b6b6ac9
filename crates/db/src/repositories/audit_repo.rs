//! Repository for the append-only `audit_entries` table.

use calibra_core::audit::{canonical_entry_data, compute_integrity_hash};
use calibra_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::audit::{AuditEntry, AuditQuery, CreateAuditEntry, IntegrityCheckResult};
use crate::models::page_bounds;

const COLUMNS: &str = "\
    id, gauge_id, action, actor_user_id, before_json, after_json, \
    integrity_hash, created_at";

/// Advisory lock key that serializes appends to the hash chain.
const AUDIT_CHAIN_LOCK_KEY: i64 = 0x4341_4C42_4155_4454;

/// Provides append and query operations for gauge audit entries.
pub struct AuditRepo;

impl AuditRepo {
    /// Append an entry in its own transaction.
    pub async fn append(pool: &PgPool, input: &CreateAuditEntry) -> Result<AuditEntry, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let entry = Self::append_in(&mut *tx, input).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Append an entry inside the caller's transaction, chaining its hash to
    /// the latest entry.
    ///
    /// Takes a transaction-scoped advisory lock, so concurrent appends cannot
    /// fork the chain and the entry commits or rolls back with the change it
    /// records. `conn` must be inside a transaction.
    pub async fn append_in(
        conn: &mut PgConnection,
        input: &CreateAuditEntry,
    ) -> Result<AuditEntry, sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(AUDIT_CHAIN_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let prev_hash = sqlx::query_scalar::<_, String>(
            "SELECT integrity_hash FROM audit_entries ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *conn)
        .await?;

        let data = canonical_entry_data(
            &input.gauge_id,
            input.action,
            input.actor_user_id,
            input.before_json.as_ref(),
            input.after_json.as_ref(),
        );
        let hash = compute_integrity_hash(prev_hash.as_deref(), &data);

        let query = format!(
            "INSERT INTO audit_entries \
                (gauge_id, action, actor_user_id, before_json, after_json, integrity_hash)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEntry>(&query)
            .bind(&input.gauge_id)
            .bind(input.action)
            .bind(input.actor_user_id)
            .bind(&input.before_json)
            .bind(&input.after_json)
            .bind(&hash)
            .fetch_one(&mut *conn)
            .await
    }

    /// Query entries with filtering and pagination, newest first.
    pub async fn query(pool: &PgPool, params: &AuditQuery) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let (limit, offset) = page_bounds(params.limit, params.offset);
        let (where_clause, bind_values, bind_idx) = build_audit_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM audit_entries {where_clause} \
             ORDER BY id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let q = bind_audit_values(sqlx::query_as::<_, AuditEntry>(&query), &bind_values);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count entries matching the filter.
    pub async fn count(pool: &PgPool, params: &AuditQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_audit_filter(params);
        let query = format!("SELECT COUNT(*)::BIGINT FROM audit_entries {where_clause}");

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        for val in &bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.as_str()),
                BindValue::Timestamp(v) => q.bind(*v),
            };
        }
        q.fetch_one(pool).await
    }

    /// The audit trail for one gauge, newest first. Includes entries
    /// written before the gauge was deleted.
    pub async fn list_for_gauge(
        pool: &PgPool,
        gauge_id: &str,
    ) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_entries WHERE gauge_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, AuditEntry>(&query)
            .bind(gauge_id)
            .fetch_all(pool)
            .await
    }

    /// Re-walk the whole chain in id order and report the first mismatch.
    pub async fn verify_chain(pool: &PgPool) -> Result<IntegrityCheckResult, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM audit_entries ORDER BY id ASC");
        let entries = sqlx::query_as::<_, AuditEntry>(&query)
            .fetch_all(pool)
            .await?;

        let mut prev: Option<String> = None;
        let mut verified = 0i64;
        for entry in &entries {
            let data = canonical_entry_data(
                &entry.gauge_id,
                &entry.action,
                entry.actor_user_id,
                entry.before_json.as_ref(),
                entry.after_json.as_ref(),
            );
            let expected = compute_integrity_hash(prev.as_deref(), &data);
            if expected != entry.integrity_hash {
                return Ok(IntegrityCheckResult {
                    verified_entries: verified,
                    chain_valid: false,
                    first_break: Some(entry.id),
                });
            }
            verified += 1;
            prev = Some(entry.integrity_hash.clone());
        }

        Ok(IntegrityCheckResult {
            verified_entries: verified,
            chain_valid: true,
            first_break: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built audit queries.
enum BindValue {
    BigInt(i64),
    Text(String),
    Timestamp(Timestamp),
}

/// Build a WHERE clause and bind values from [`AuditQuery`].
///
/// Returns `(where_clause, bind_values, next_bind_index)`.
fn build_audit_filter(params: &AuditQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(ref gauge_id) = params.gauge_id {
        conditions.push(format!("gauge_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(gauge_id.clone()));
    }

    if let Some(ref action) = params.action {
        conditions.push(format!("action = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(action.clone()));
    }

    if let Some(actor) = params.actor_user_id {
        conditions.push(format!("actor_user_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(actor));
    }

    if let Some(from) = params.from {
        conditions.push(format!("created_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = params.to {
        conditions.push(format!("created_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

fn bind_audit_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        q = match val {
            BindValue::BigInt(v) => q.bind(*v),
            BindValue::Text(v) => q.bind(v.as_str()),
            BindValue::Timestamp(v) => q.bind(*v),
        };
    }
    q
}
