//! Gauge status classification.
//!
//! Status is recomputed from scratch on every call; there is no stored state
//! machine. Rules are evaluated in strict priority order and the first match
//! wins:
//!
//! 1. `overdue`: remaining capacity at or below the overdue cutoff, or the
//!    next calibration date is already in the past.
//! 2. `calibration_required`: remaining capacity at or below the calibration
//!    cutoff, or calibration falls within the warning window.
//! 3. `near_limit`: remaining capacity at or below the near-limit cutoff.
//! 4. `safe`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::{months_between, next_calibration_date};
use crate::error::CoreError;
use crate::gauge::GaugeSnapshot;
use crate::thresholds::ThresholdConfig;
use crate::types::Date;

/// Four-valued gauge status.
///
/// Variants are declared in severity order so that `Ord` reflects it:
/// `Safe < NearLimit < CalibrationRequired < Overdue`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GaugeStatus {
    Safe,
    NearLimit,
    CalibrationRequired,
    Overdue,
}

impl GaugeStatus {
    /// Every status, in severity order.
    pub const ALL: [GaugeStatus; 4] = [
        GaugeStatus::Safe,
        GaugeStatus::NearLimit,
        GaugeStatus::CalibrationRequired,
        GaugeStatus::Overdue,
    ];

    /// The database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            GaugeStatus::Safe => "safe",
            GaugeStatus::NearLimit => "near_limit",
            GaugeStatus::CalibrationRequired => "calibration_required",
            GaugeStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for GaugeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GaugeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GaugeStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("Unknown gauge status: {s}")))
    }
}

/// Classify `gauge` against `thresholds` as of `today`.
///
/// Fails only on invalid input (see [`GaugeSnapshot::validate`] and
/// [`ThresholdConfig::validate`]). Over-filled gauges are `Overdue`.
pub fn classify(
    gauge: &GaugeSnapshot,
    thresholds: &ThresholdConfig,
    today: Date,
) -> Result<GaugeStatus, CoreError> {
    gauge.validate()?;
    thresholds.validate()?;

    let max = gauge.max_capacity;
    let remaining = gauge.remaining_capacity();
    let next_due = next_calibration_date(gauge.last_calibration_date, gauge.calibration_frequency)?;

    if remaining <= thresholds.overdue_cutoff * max || next_due < today {
        return Ok(GaugeStatus::Overdue);
    }

    let months_since = months_between(gauge.last_calibration_date, today);
    let due_soon =
        months_since >= gauge.calibration_frequency - thresholds.calibration_warning_months;
    if remaining <= thresholds.calibration_required_cutoff * max || due_soon {
        return Ok(GaugeStatus::CalibrationRequired);
    }

    if remaining <= thresholds.near_limit_cutoff * max {
        return Ok(GaugeStatus::NearLimit);
    }

    Ok(GaugeStatus::Safe)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
