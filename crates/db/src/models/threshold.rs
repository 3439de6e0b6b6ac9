//! Threshold configuration row.

use calibra_core::thresholds::ThresholdConfig;
use calibra_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// The singleton row of `threshold_config`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ThresholdConfigRow {
    pub overdue_cutoff: f64,
    pub calibration_required_cutoff: f64,
    pub near_limit_cutoff: f64,
    pub calibration_warning_months: i32,
    pub updated_by: Option<DbId>,
    pub updated_at: Timestamp,
}

impl ThresholdConfigRow {
    pub fn config(&self) -> ThresholdConfig {
        ThresholdConfig {
            overdue_cutoff: self.overdue_cutoff,
            calibration_required_cutoff: self.calibration_required_cutoff,
            near_limit_cutoff: self.near_limit_cutoff,
            calibration_warning_months: self.calibration_warning_months,
        }
    }
}
