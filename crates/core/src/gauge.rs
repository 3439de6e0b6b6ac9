//! Gauge source fields, input validation, and derived-field computation.

use serde::{Deserialize, Serialize};

use crate::calendar::next_calibration_date;
use crate::error::CoreError;
use crate::status::{classify, GaugeStatus};
use crate::thresholds::ThresholdConfig;
use crate::types::Date;

/// Maximum length of an operator-assigned gauge id.
pub const MAX_GAUGE_ID_LEN: usize = 64;
/// Maximum length of the free-text gauge type.
pub const MAX_GAUGE_TYPE_LEN: usize = 128;

/// The source-of-truth fields of a gauge.
///
/// Derived fields are never stored here; they are recomputed from these
/// values by [`derive_fields`] whenever they are needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeSnapshot {
    pub gauge_id: String,
    pub gauge_type: String,
    pub max_capacity: f64,
    pub produced_quantity: f64,
    pub last_calibration_date: Date,
    /// Calibration interval in months.
    pub calibration_frequency: i32,
}

impl GaugeSnapshot {
    /// Trim the identity and type strings in place.
    pub fn normalize(&mut self) {
        let trimmed_id = self.gauge_id.trim();
        if trimmed_id.len() != self.gauge_id.len() {
            self.gauge_id = trimmed_id.to_string();
        }
        let trimmed_type = self.gauge_type.trim();
        if trimmed_type.len() != self.gauge_type.len() {
            self.gauge_type = trimmed_type.to_string();
        }
    }

    /// Reject input the classifier cannot meaningfully evaluate.
    ///
    /// `produced_quantity` above `max_capacity` is accepted: it is a valid
    /// (overdue) state, not malformed input.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_gauge_id(&self.gauge_id)?;
        if self.gauge_type.len() > MAX_GAUGE_TYPE_LEN {
            return Err(CoreError::Validation(format!(
                "gauge_type must be at most {MAX_GAUGE_TYPE_LEN} characters"
            )));
        }

        if !self.max_capacity.is_finite() || self.max_capacity <= 0.0 {
            return Err(CoreError::Validation(format!(
                "max_capacity must be a finite number greater than 0, got {}",
                self.max_capacity
            )));
        }
        if !self.produced_quantity.is_finite() || self.produced_quantity < 0.0 {
            return Err(CoreError::Validation(format!(
                "produced_quantity must be a finite, non-negative number, got {}",
                self.produced_quantity
            )));
        }
        if self.calibration_frequency <= 0 {
            return Err(CoreError::Validation(format!(
                "calibration_frequency must be a positive number of months, got {}",
                self.calibration_frequency
            )));
        }
        Ok(())
    }

    /// `max_capacity - produced_quantity`; negative when over-filled.
    pub fn remaining_capacity(&self) -> f64 {
        self.max_capacity - self.produced_quantity
    }

    /// Produced quantity as a percentage of max capacity.
    pub fn capacity_utilization(&self) -> f64 {
        self.produced_quantity / self.max_capacity * 100.0
    }

    /// Whether the capacity budget is used up (remaining <= 0).
    pub fn is_capacity_exhausted(&self) -> bool {
        self.remaining_capacity() <= 0.0
    }
}

/// Validate an operator-assigned gauge id.
pub fn validate_gauge_id(gauge_id: &str) -> Result<(), CoreError> {
    if gauge_id.trim().is_empty() {
        return Err(CoreError::validation("gauge_id is required"));
    }
    if gauge_id.len() > MAX_GAUGE_ID_LEN {
        return Err(CoreError::Validation(format!(
            "gauge_id must be at most {MAX_GAUGE_ID_LEN} characters"
        )));
    }
    if gauge_id.chars().any(char::is_control) {
        return Err(CoreError::Validation(
            "gauge_id must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Computed fields persisted alongside a gauge for query convenience.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFields {
    pub remaining_capacity: f64,
    pub capacity_utilization: f64,
    pub next_calibration_date: Date,
    pub status: GaugeStatus,
}

/// Validate `gauge` and compute all of its derived fields as of `today`.
pub fn derive_fields(
    gauge: &GaugeSnapshot,
    thresholds: &ThresholdConfig,
    today: Date,
) -> Result<DerivedFields, CoreError> {
    let status = classify(gauge, thresholds, today)?;
    Ok(DerivedFields {
        remaining_capacity: gauge.remaining_capacity(),
        capacity_utilization: gauge.capacity_utilization(),
        next_calibration_date: next_calibration_date(
            gauge.last_calibration_date,
            gauge.calibration_frequency,
        )?,
        status,
    })
}
