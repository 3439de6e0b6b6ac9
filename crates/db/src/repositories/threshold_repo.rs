//! Repository for the singleton `threshold_config` row.

use calibra_core::thresholds::ThresholdConfig;
use calibra_core::types::DbId;
use sqlx::PgPool;

use crate::models::threshold::ThresholdConfigRow;

const COLUMNS: &str = "overdue_cutoff, calibration_required_cutoff, near_limit_cutoff, \
                        calibration_warning_months, updated_by, updated_at";

/// Reads and replaces the active threshold configuration.
pub struct ThresholdRepo;

impl ThresholdRepo {
    /// Load the active configuration. The row is seeded by migration.
    pub async fn get(pool: &PgPool) -> Result<ThresholdConfigRow, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM threshold_config WHERE id = 1");
        sqlx::query_as::<_, ThresholdConfigRow>(&query)
            .fetch_one(pool)
            .await
    }

    /// Replace every threshold value. Callers validate `config` first.
    pub async fn update(
        pool: &PgPool,
        config: &ThresholdConfig,
        updated_by: Option<DbId>,
    ) -> Result<ThresholdConfigRow, sqlx::Error> {
        let query = format!(
            "UPDATE threshold_config SET
                overdue_cutoff = $1,
                calibration_required_cutoff = $2,
                near_limit_cutoff = $3,
                calibration_warning_months = $4,
                updated_by = $5
             WHERE id = 1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ThresholdConfigRow>(&query)
            .bind(config.overdue_cutoff)
            .bind(config.calibration_required_cutoff)
            .bind(config.near_limit_cutoff)
            .bind(config.calibration_warning_months)
            .bind(updated_by)
            .fetch_one(pool)
            .await
    }
}
