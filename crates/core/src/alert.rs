//! Alert generation for capacity and calibration conditions.
//!
//! Two entry points:
//!
//! - [`generate_alerts`] is level-triggered: it reports every condition that
//!   currently holds for a gauge. Used on create and on explicit
//!   recalculation.
//! - [`generate_transition_alerts`] is edge-triggered: it compares an old and
//!   a new snapshot and reports only conditions the gauge has just entered.
//!   Used on update so that an already-flagged gauge is not re-announced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::{months_between, next_calibration_date};
use crate::error::CoreError;
use crate::gauge::GaugeSnapshot;
use crate::thresholds::ThresholdConfig;
use crate::types::Date;

// ---------------------------------------------------------------------------
// Alert classification enums
// ---------------------------------------------------------------------------

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Capacity,
    Calibration,
}

impl AlertType {
    pub const ALL: [AlertType; 2] = [AlertType::Capacity, AlertType::Calibration];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Capacity => "capacity",
            AlertType::Calibration => "calibration",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("Unknown alert type: {s}")))
    }
}

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 3] =
        [AlertSeverity::Low, AlertSeverity::Medium, AlertSeverity::High];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
        }
    }

    /// Upper-case label embedded at the start of alert messages.
    fn label(self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertSeverity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("Unknown alert severity: {s}")))
    }
}

/// An alert produced by the generator, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedAlert {
    pub gauge_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
}

impl GeneratedAlert {
    fn new(
        gauge_id: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        detail: String,
    ) -> Self {
        Self {
            gauge_id: gauge_id.to_string(),
            alert_type,
            severity,
            message: format!("[{}] Gauge {gauge_id}: {detail}", severity.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition levels
// ---------------------------------------------------------------------------

/// Capacity condition, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CapacityLevel {
    Ok,
    NearLimit,
    Exhausted,
}

fn capacity_level(gauge: &GaugeSnapshot, thresholds: &ThresholdConfig) -> CapacityLevel {
    let remaining = gauge.remaining_capacity();
    if remaining <= 0.0 {
        CapacityLevel::Exhausted
    } else if remaining <= thresholds.near_limit_cutoff * gauge.max_capacity {
        CapacityLevel::NearLimit
    } else {
        CapacityLevel::Ok
    }
}

/// Calibration condition relative to `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalibrationLevel {
    Ok,
    DueSoon { months_until: i32 },
    Overdue { months_overdue: i32 },
}

impl CalibrationLevel {
    fn rank(self) -> u8 {
        match self {
            CalibrationLevel::Ok => 0,
            CalibrationLevel::DueSoon { .. } => 1,
            CalibrationLevel::Overdue { .. } => 2,
        }
    }
}

fn calibration_level(
    gauge: &GaugeSnapshot,
    thresholds: &ThresholdConfig,
    today: Date,
) -> CalibrationLevel {
    let months_since = months_between(gauge.last_calibration_date, today);
    if months_since >= gauge.calibration_frequency {
        return CalibrationLevel::Overdue {
            months_overdue: months_since - gauge.calibration_frequency,
        };
    }
    let months_until = gauge.calibration_frequency - months_since;
    if months_until <= thresholds.calibration_warning_months {
        CalibrationLevel::DueSoon { months_until }
    } else {
        CalibrationLevel::Ok
    }
}

// ---------------------------------------------------------------------------
// Alert builders
// ---------------------------------------------------------------------------

fn capacity_exceeded_alert(gauge: &GaugeSnapshot) -> GeneratedAlert {
    GeneratedAlert::new(
        &gauge.gauge_id,
        AlertType::Capacity,
        AlertSeverity::High,
        format!(
            "capacity exceeded, produced {} of max capacity {}",
            gauge.produced_quantity, gauge.max_capacity
        ),
    )
}

fn near_limit_alert(gauge: &GaugeSnapshot, thresholds: &ThresholdConfig) -> GeneratedAlert {
    GeneratedAlert::new(
        &gauge.gauge_id,
        AlertType::Capacity,
        AlertSeverity::Medium,
        format!(
            "capacity utilization at {:.1}% (near-limit threshold {:.1}%)",
            gauge.capacity_utilization(),
            thresholds.near_limit_utilization_pct()
        ),
    )
}

fn near_limit_crossed_alert(
    old: &GaugeSnapshot,
    new: &GaugeSnapshot,
    thresholds: &ThresholdConfig,
) -> GeneratedAlert {
    GeneratedAlert::new(
        &new.gauge_id,
        AlertType::Capacity,
        AlertSeverity::Medium,
        format!(
            "capacity utilization crossed the near-limit threshold of {:.1}% \
             (was {:.1}%, now {:.1}%)",
            thresholds.near_limit_utilization_pct(),
            old.capacity_utilization(),
            new.capacity_utilization()
        ),
    )
}

/// Build the calibration alert for `level`.
///
/// In the month the calibration falls due `months_overdue` is 0 while the
/// due date may still be ahead, so that case names the date instead of a
/// month count.
fn calibration_alert(
    gauge: &GaugeSnapshot,
    level: CalibrationLevel,
    today: Date,
) -> Option<GeneratedAlert> {
    let next_due = next_calibration_date(gauge.last_calibration_date, gauge.calibration_frequency);
    let due = next_due
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();
    match level {
        CalibrationLevel::Ok => None,
        CalibrationLevel::Overdue { months_overdue: 0 } => {
            let summary = match next_due {
                Ok(date) if date >= today => format!("calibration due this month (on {due})"),
                _ => format!("calibration overdue since {due}"),
            };
            Some(GeneratedAlert::new(
                &gauge.gauge_id,
                AlertType::Calibration,
                AlertSeverity::High,
                format!(
                    "{summary} (last calibrated {}, frequency {} months)",
                    gauge.last_calibration_date, gauge.calibration_frequency
                ),
            ))
        }
        CalibrationLevel::Overdue { months_overdue } => Some(GeneratedAlert::new(
            &gauge.gauge_id,
            AlertType::Calibration,
            AlertSeverity::High,
            format!(
                "calibration overdue by {months_overdue} month(s) \
                 (last calibrated {}, frequency {} months)",
                gauge.last_calibration_date, gauge.calibration_frequency
            ),
        )),
        CalibrationLevel::DueSoon { months_until } => Some(GeneratedAlert::new(
            &gauge.gauge_id,
            AlertType::Calibration,
            AlertSeverity::Medium,
            format!("calibration due within {months_until} month(s) (next calibration {due})"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Report every capacity and calibration condition that currently holds.
///
/// Emits at most one capacity alert and at most one calibration alert. A
/// gauge whose status is `safe` yields no alerts.
pub fn generate_alerts(
    gauge: &GaugeSnapshot,
    thresholds: &ThresholdConfig,
    today: Date,
) -> Result<Vec<GeneratedAlert>, CoreError> {
    gauge.validate()?;
    thresholds.validate()?;

    let mut alerts = Vec::new();

    match capacity_level(gauge, thresholds) {
        CapacityLevel::Exhausted => alerts.push(capacity_exceeded_alert(gauge)),
        CapacityLevel::NearLimit => alerts.push(near_limit_alert(gauge, thresholds)),
        CapacityLevel::Ok => {}
    }

    alerts.extend(calibration_alert(
        gauge,
        calibration_level(gauge, thresholds, today),
        today,
    ));

    Ok(alerts)
}

/// Report only the conditions `new` has entered since `old`.
///
/// Capacity: crossing into over-capacity emits a high alert; otherwise
/// crossing the near-limit threshold emits a medium alert. Calibration: a
/// worsening from ok to due-soon, or from ok/due-soon to overdue, emits the
/// matching calibration alert. Conditions that hold in both snapshots emit
/// nothing.
pub fn generate_transition_alerts(
    old: &GaugeSnapshot,
    new: &GaugeSnapshot,
    thresholds: &ThresholdConfig,
    today: Date,
) -> Result<Vec<GeneratedAlert>, CoreError> {
    old.validate()?;
    new.validate()?;
    thresholds.validate()?;

    if old.gauge_id != new.gauge_id {
        return Err(CoreError::Validation(format!(
            "cannot compare different gauges: {} and {}",
            old.gauge_id, new.gauge_id
        )));
    }

    let mut alerts = Vec::new();

    let old_capacity = capacity_level(old, thresholds);
    let new_capacity = capacity_level(new, thresholds);
    if new_capacity > old_capacity {
        match new_capacity {
            CapacityLevel::Exhausted => alerts.push(capacity_exceeded_alert(new)),
            CapacityLevel::NearLimit => {
                alerts.push(near_limit_crossed_alert(old, new, thresholds));
            }
            CapacityLevel::Ok => {}
        }
    }

    let old_calibration = calibration_level(old, thresholds, today);
    let new_calibration = calibration_level(new, thresholds, today);
    if new_calibration.rank() > old_calibration.rank() {
        alerts.extend(calibration_alert(new, new_calibration, today));
    }

    Ok(alerts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
