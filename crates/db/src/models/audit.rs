//! Audit entry model and DTOs.
//!
//! Entries are immutable once written (no `updated_at`).

use calibra_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A single gauge audit entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEntry {
    pub id: DbId,
    pub gauge_id: String,
    pub action: String,
    pub actor_user_id: Option<DbId>,
    pub before_json: Option<serde_json::Value>,
    pub after_json: Option<serde_json::Value>,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry. The hash is computed on insert.
#[derive(Debug, Clone)]
pub struct CreateAuditEntry {
    pub gauge_id: String,
    pub action: &'static str,
    pub actor_user_id: Option<DbId>,
    pub before_json: Option<serde_json::Value>,
    pub after_json: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filter parameters for querying the audit log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub gauge_id: Option<String>,
    pub action: Option<String>,
    pub actor_user_id: Option<DbId>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Integrity check result
// ---------------------------------------------------------------------------

/// Result of re-walking the audit hash chain.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityCheckResult {
    pub verified_entries: i64,
    pub chain_valid: bool,
    /// ID of the first entry whose hash does not match, if any.
    pub first_break: Option<DbId>,
}
