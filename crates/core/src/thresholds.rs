//! Canonical threshold configuration for gauge classification.
//!
//! All capacity cutoffs are fractions of `max_capacity` in `[0.0, 1.0]`,
//! measured against *remaining* capacity. A cutoff of `0.20` means "20 % or
//! less of the capacity budget remains", which is the same as utilization at
//! or above 80 %.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default remaining-capacity fraction at or below which a gauge is overdue.
pub const DEFAULT_OVERDUE_CUTOFF: f64 = 0.0;
/// Default remaining-capacity fraction at or below which calibration is required.
pub const DEFAULT_CALIBRATION_REQUIRED_CUTOFF: f64 = 0.10;
/// Default remaining-capacity fraction at or below which a gauge is near its limit.
pub const DEFAULT_NEAR_LIMIT_CUTOFF: f64 = 0.20;
/// Default number of months before the due date that counts as "due soon".
pub const DEFAULT_CALIBRATION_WARNING_MONTHS: i32 = 1;
/// Upper bound for the calibration warning window.
pub const MAX_CALIBRATION_WARNING_MONTHS: i32 = 24;

/// Threshold snapshot passed to the classifier and alert generator.
///
/// Treated as immutable for the duration of one call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub overdue_cutoff: f64,
    pub calibration_required_cutoff: f64,
    pub near_limit_cutoff: f64,
    pub calibration_warning_months: i32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            overdue_cutoff: DEFAULT_OVERDUE_CUTOFF,
            calibration_required_cutoff: DEFAULT_CALIBRATION_REQUIRED_CUTOFF,
            near_limit_cutoff: DEFAULT_NEAR_LIMIT_CUTOFF,
            calibration_warning_months: DEFAULT_CALIBRATION_WARNING_MONTHS,
        }
    }
}

impl ThresholdConfig {
    /// Check ranges and ordering of the cutoffs.
    ///
    /// The ordering `overdue <= calibration_required <= near_limit` is what
    /// keeps status monotone as produced quantity grows.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("overdue_cutoff", self.overdue_cutoff),
            ("calibration_required_cutoff", self.calibration_required_cutoff),
            ("near_limit_cutoff", self.near_limit_cutoff),
        ] {
            // NaN fails `contains`, so it is rejected here as well.
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::Validation(format!(
                    "{name} must be a fraction between 0.0 and 1.0, got {value}"
                )));
            }
        }

        if self.overdue_cutoff > self.calibration_required_cutoff {
            return Err(CoreError::Validation(
                "overdue_cutoff must not exceed calibration_required_cutoff".to_string(),
            ));
        }
        if self.calibration_required_cutoff > self.near_limit_cutoff {
            return Err(CoreError::Validation(
                "calibration_required_cutoff must not exceed near_limit_cutoff".to_string(),
            ));
        }
        if !(0..=MAX_CALIBRATION_WARNING_MONTHS).contains(&self.calibration_warning_months) {
            return Err(CoreError::Validation(format!(
                "calibration_warning_months must be between 0 and \
                 {MAX_CALIBRATION_WARNING_MONTHS}, got {}",
                self.calibration_warning_months
            )));
        }
        Ok(())
    }

    /// Utilization percentage (0-100) at which a gauge counts as near its limit.
    pub fn near_limit_utilization_pct(&self) -> f64 {
        (1.0 - self.near_limit_cutoff) * 100.0
    }
}
