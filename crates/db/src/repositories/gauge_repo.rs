//! Repository for the `gauges` table.

use calibra_core::gauge::{DerivedFields, GaugeSnapshot};
use calibra_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::gauge::{Gauge, GaugeListQuery, GaugeStats};
use crate::models::page_bounds;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, gauge_id, gauge_type, max_capacity, produced_quantity, \
    last_calibration_date, calibration_frequency, remaining_capacity, \
    capacity_utilization, next_calibration_date, status, last_modified_by, \
    created_at, updated_at";

/// Provides CRUD operations for gauges.
///
/// Every write takes both the source snapshot and the derived fields so the
/// cached columns can never be written from anything but a fresh derivation.
pub struct GaugeRepo;

impl GaugeRepo {
    /// Insert a new gauge. Fails with a `uq_gauges_gauge_id` violation when
    /// the id is taken.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        gauge: &GaugeSnapshot,
        derived: &DerivedFields,
        modified_by: Option<DbId>,
    ) -> Result<Gauge, sqlx::Error> {
        let query = format!(
            "INSERT INTO gauges (gauge_id, gauge_type, max_capacity, produced_quantity, \
                last_calibration_date, calibration_frequency, remaining_capacity, \
                capacity_utilization, next_calibration_date, status, last_modified_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Gauge>(&query)
            .bind(&gauge.gauge_id)
            .bind(&gauge.gauge_type)
            .bind(gauge.max_capacity)
            .bind(gauge.produced_quantity)
            .bind(gauge.last_calibration_date)
            .bind(gauge.calibration_frequency)
            .bind(derived.remaining_capacity)
            .bind(derived.capacity_utilization)
            .bind(derived.next_calibration_date)
            .bind(derived.status.as_str())
            .bind(modified_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_gauge_id(
        pool: &PgPool,
        gauge_id: &str,
    ) -> Result<Option<Gauge>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gauges WHERE gauge_id = $1");
        sqlx::query_as::<_, Gauge>(&query)
            .bind(gauge_id)
            .fetch_optional(pool)
            .await
    }

    /// Read a gauge and hold its row lock until the transaction ends.
    ///
    /// Every read-derive-write step goes through here so that derived
    /// fields, alerts and audit state are computed from the row as it is
    /// when written.
    pub async fn lock_by_gauge_id<'e>(
        executor: impl PgExecutor<'e>,
        gauge_id: &str,
    ) -> Result<Option<Gauge>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gauges WHERE gauge_id = $1 FOR UPDATE");
        sqlx::query_as::<_, Gauge>(&query)
            .bind(gauge_id)
            .fetch_optional(executor)
            .await
    }

    /// Every gauge, ordered by `gauge_id`. Used by export and bulk recalculation.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Gauge>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gauges ORDER BY gauge_id");
        sqlx::query_as::<_, Gauge>(&query).fetch_all(pool).await
    }

    /// List gauges matching the filters, ordered by `gauge_id`.
    pub async fn list(pool: &PgPool, params: &GaugeListQuery) -> Result<Vec<Gauge>, sqlx::Error> {
        let (limit, offset) = page_bounds(params.limit, params.offset);
        let (where_clause, bind_idx) = build_gauge_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM gauges {where_clause} \
             ORDER BY gauge_id \
             LIMIT ${bind_idx} OFFSET ${next_idx}",
            next_idx = bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, Gauge>(&query);
        if let Some(ref status) = params.status {
            q = q.bind(status);
        }
        if let Some(ref gauge_type) = params.gauge_type {
            q = q.bind(gauge_type);
        }
        if let Some(ref search) = params.search {
            q = q.bind(contains_pattern(search));
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count gauges matching the filters (pagination ignored).
    pub async fn count(pool: &PgPool, params: &GaugeListQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, _) = build_gauge_filter(params);
        let query = format!("SELECT COUNT(*)::BIGINT FROM gauges {where_clause}");

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        if let Some(ref status) = params.status {
            q = q.bind(status);
        }
        if let Some(ref gauge_type) = params.gauge_type {
            q = q.bind(gauge_type);
        }
        if let Some(ref search) = params.search {
            q = q.bind(contains_pattern(search));
        }
        q.fetch_one(pool).await
    }

    /// Overwrite source and derived fields. Returns `None` if no such gauge.
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        gauge: &GaugeSnapshot,
        derived: &DerivedFields,
        modified_by: Option<DbId>,
    ) -> Result<Option<Gauge>, sqlx::Error> {
        let query = format!(
            "UPDATE gauges SET
                gauge_type = $2,
                max_capacity = $3,
                produced_quantity = $4,
                last_calibration_date = $5,
                calibration_frequency = $6,
                remaining_capacity = $7,
                capacity_utilization = $8,
                next_calibration_date = $9,
                status = $10,
                last_modified_by = $11
             WHERE gauge_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Gauge>(&query)
            .bind(&gauge.gauge_id)
            .bind(&gauge.gauge_type)
            .bind(gauge.max_capacity)
            .bind(gauge.produced_quantity)
            .bind(gauge.last_calibration_date)
            .bind(gauge.calibration_frequency)
            .bind(derived.remaining_capacity)
            .bind(derived.capacity_utilization)
            .bind(derived.next_calibration_date)
            .bind(derived.status.as_str())
            .bind(modified_by)
            .fetch_optional(executor)
            .await
    }

    /// Rewrite only the derived columns, leaving provenance untouched.
    pub async fn update_derived<'e>(
        executor: impl PgExecutor<'e>,
        gauge_id: &str,
        derived: &DerivedFields,
    ) -> Result<Option<Gauge>, sqlx::Error> {
        let query = format!(
            "UPDATE gauges SET
                remaining_capacity = $2,
                capacity_utilization = $3,
                next_calibration_date = $4,
                status = $5
             WHERE gauge_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Gauge>(&query)
            .bind(gauge_id)
            .bind(derived.remaining_capacity)
            .bind(derived.capacity_utilization)
            .bind(derived.next_calibration_date)
            .bind(derived.status.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Delete a gauge, returning the deleted row. Its alerts go with it.
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        gauge_id: &str,
    ) -> Result<Option<Gauge>, sqlx::Error> {
        let query = format!("DELETE FROM gauges WHERE gauge_id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Gauge>(&query)
            .bind(gauge_id)
            .fetch_optional(executor)
            .await
    }

    /// Per-status counts plus the number of unacknowledged alerts.
    pub async fn stats(pool: &PgPool) -> Result<GaugeStats, sqlx::Error> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*)::BIGINT FROM gauges GROUP BY status",
        )
        .fetch_all(pool)
        .await?;

        let mut stats = GaugeStats::default();
        for (status, count) in counts {
            stats.total += count;
            match status.as_str() {
                "safe" => stats.safe = count,
                "near_limit" => stats.near_limit = count,
                "calibration_required" => stats.calibration_required = count,
                "overdue" => stats.overdue = count,
                other => tracing::warn!(status = other, "Unexpected gauge status in database"),
            }
        }

        stats.unacknowledged_alerts = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM alerts WHERE acknowledged = false",
        )
        .fetch_one(pool)
        .await?;

        Ok(stats)
    }
}

/// Build the WHERE clause for [`GaugeListQuery`].
///
/// Returns `(where_clause, next_bind_index)`. Bind order is status,
/// gauge_type, search.
fn build_gauge_filter(params: &GaugeListQuery) -> (String, u32) {
    let mut conditions = Vec::new();
    let mut bind_idx = 1u32;

    if params.status.is_some() {
        conditions.push(format!("status = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.gauge_type.is_some() {
        conditions.push(format!("gauge_type = ${bind_idx}"));
        bind_idx += 1;
    }
    if params.search.is_some() {
        conditions.push(format!(
            "(gauge_id ILIKE ${bind_idx} ESCAPE '\\' OR gauge_type ILIKE ${bind_idx} ESCAPE '\\')"
        ));
        bind_idx += 1;
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, bind_idx)
}

/// `ILIKE` pattern matching `search` anywhere, with `%`, `_` and the
/// escape character itself taken literally.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_numbers_binds_in_order() {
        let params = GaugeListQuery {
            status: Some("safe".to_string()),
            search: Some("G".to_string()),
            ..GaugeListQuery::default()
        };
        let (clause, next) = build_gauge_filter(&params);
        assert_eq!(
            clause,
            r"WHERE status = $1 AND (gauge_id ILIKE $2 ESCAPE '\' OR gauge_type ILIKE $2 ESCAPE '\')"
        );
        assert_eq!(next, 3);
    }

    #[test]
    fn search_wildcards_are_literal() {
        assert_eq!(contains_pattern("G-1"), "%G-1%");
        assert_eq!(contains_pattern("G_1"), r"%G\_1%");
        assert_eq!(contains_pattern("100%"), r"%100\%%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn no_filters_means_no_where() {
        let (clause, next) = build_gauge_filter(&GaugeListQuery::default());
        assert!(clause.is_empty());
        assert_eq!(next, 1);
    }
}
