//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for inserts, updates and list filters

pub mod alert;
pub mod audit;
pub mod gauge;
pub mod role;
pub mod session;
pub mod threshold;
pub mod user;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: i64 = 50;
/// Upper bound on any requested page size.
pub const MAX_LIMIT: i64 = 500;

/// Clamp optional `limit` / `offset` query values to sane bounds.
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset.unwrap_or(0).max(0),
    )
}

/// A page of results plus the total number of matching rows.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
