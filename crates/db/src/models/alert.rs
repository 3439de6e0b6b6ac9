//! Alert entity model and DTOs.

use calibra_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `alerts` table.
///
/// Only the acknowledgment columns ever change after insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Alert {
    pub id: DbId,
    pub gauge_id: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub acknowledged: bool,
    pub acknowledged_by: Option<DbId>,
    pub acknowledged_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Filters for listing alerts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertListQuery {
    pub acknowledged: Option<bool>,
    pub severity: Option<String>,
    pub alert_type: Option<String>,
    pub gauge_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
