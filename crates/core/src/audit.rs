//! Gauge audit trail constants and integrity hashing.
//!
//! Audit entries are append-only. Each entry carries a SHA-256 hash chained
//! to the previous entry so that edits or deletions in the table are
//! detectable by re-walking the chain.

use crate::hashing;

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Known action types for gauge audit entries.
pub mod actions {
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const IMPORT: &str = "import";
    pub const RECALCULATE: &str = "recalculate";

    /// Every valid action, used to validate query filters.
    pub const ALL: &[&str] = &[CREATE, UPDATE, DELETE, IMPORT, RECALCULATE];
}

/// Returns `true` if `action` is one of [`actions::ALL`].
pub fn is_known_action(action: &str) -> bool {
    actions::ALL.contains(&action)
}

// ---------------------------------------------------------------------------
// Integrity hash computation
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "GAUGE_AUDIT_CHAIN_SEED_V1";

/// Compute the SHA-256 integrity hash for an audit entry.
///
/// `prev_hash` is the `integrity_hash` of the previous entry, or `None` for
/// the first entry in the chain (which uses a known seed value).
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    hashing::sha256_hex_joined(&[prev_hash.unwrap_or(CHAIN_SEED), entry_data])
}

/// Build the canonical string that is hashed for an audit entry.
///
/// Field order is fixed, and `serde_json` serializes object keys in sorted
/// order, so the same snapshot always produces the same string.
pub fn canonical_entry_data(
    gauge_id: &str,
    action: &str,
    actor_user_id: Option<i64>,
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
) -> String {
    let actor = actor_user_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let before = before.map_or_else(|| "null".to_string(), |v| v.to_string());
    let after = after.map_or_else(|| "null".to_string(), |v| v.to_string());
    format!("{gauge_id}|{action}|{actor}|{before}|{after}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
