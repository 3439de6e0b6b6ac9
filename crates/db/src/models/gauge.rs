//! Gauge entity model and DTOs.

use calibra_core::error::CoreError;
use calibra_core::gauge::{DerivedFields, GaugeSnapshot};
use calibra_core::status::GaugeStatus;
use calibra_core::types::{Date, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `gauges` table.
///
/// The derived columns (`remaining_capacity` through `status`) are a cache of
/// the last computation; handlers recompute them before relying on them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Gauge {
    pub id: DbId,
    pub gauge_id: String,
    pub gauge_type: String,
    pub max_capacity: f64,
    pub produced_quantity: f64,
    pub last_calibration_date: Date,
    pub calibration_frequency: i32,
    pub remaining_capacity: f64,
    pub capacity_utilization: f64,
    pub next_calibration_date: Date,
    pub status: String,
    pub last_modified_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Gauge {
    /// The source-of-truth fields, detached from persistence metadata.
    pub fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot {
            gauge_id: self.gauge_id.clone(),
            gauge_type: self.gauge_type.clone(),
            max_capacity: self.max_capacity,
            produced_quantity: self.produced_quantity,
            last_calibration_date: self.last_calibration_date,
            calibration_frequency: self.calibration_frequency,
        }
    }

    /// The stored status, parsed.
    pub fn stored_status(&self) -> Result<GaugeStatus, CoreError> {
        self.status.parse()
    }

    /// Whether the stored derived columns differ from `derived`.
    pub fn derived_differs(&self, derived: &DerivedFields) -> bool {
        self.remaining_capacity != derived.remaining_capacity
            || self.capacity_utilization != derived.capacity_utilization
            || self.next_calibration_date != derived.next_calibration_date
            || self.status != derived.status.as_str()
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for creating a gauge.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGauge {
    pub gauge_id: String,
    #[serde(default)]
    pub gauge_type: Option<String>,
    pub max_capacity: f64,
    #[serde(default)]
    pub produced_quantity: Option<f64>,
    pub last_calibration_date: Date,
    pub calibration_frequency: i32,
}

impl CreateGauge {
    /// Build a normalized snapshot. Validation happens in the core.
    pub fn into_snapshot(self) -> GaugeSnapshot {
        let mut snapshot = GaugeSnapshot {
            gauge_id: self.gauge_id,
            gauge_type: self.gauge_type.unwrap_or_default(),
            max_capacity: self.max_capacity,
            produced_quantity: self.produced_quantity.unwrap_or(0.0),
            last_calibration_date: self.last_calibration_date,
            calibration_frequency: self.calibration_frequency,
        };
        snapshot.normalize();
        snapshot
    }
}

/// Request body for updating a gauge. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGauge {
    pub gauge_type: Option<String>,
    pub max_capacity: Option<f64>,
    pub produced_quantity: Option<f64>,
    pub last_calibration_date: Option<Date>,
    pub calibration_frequency: Option<i32>,
}

impl UpdateGauge {
    /// Apply the present fields on top of `current`.
    pub fn apply_to(&self, current: &GaugeSnapshot) -> GaugeSnapshot {
        let mut next = GaugeSnapshot {
            gauge_id: current.gauge_id.clone(),
            gauge_type: self
                .gauge_type
                .clone()
                .unwrap_or_else(|| current.gauge_type.clone()),
            max_capacity: self.max_capacity.unwrap_or(current.max_capacity),
            produced_quantity: self.produced_quantity.unwrap_or(current.produced_quantity),
            last_calibration_date: self
                .last_calibration_date
                .unwrap_or(current.last_calibration_date),
            calibration_frequency: self
                .calibration_frequency
                .unwrap_or(current.calibration_frequency),
        };
        next.normalize();
        next
    }
}

/// Filters for listing gauges.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GaugeListQuery {
    pub status: Option<String>,
    pub gauge_type: Option<String>,
    /// Case-insensitive substring match on `gauge_id` or `gauge_type`.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GaugeStats {
    pub total: i64,
    pub safe: i64,
    pub near_limit: i64,
    pub calibration_required: i64,
    pub overdue: i64,
    pub unacknowledged_alerts: i64,
}
