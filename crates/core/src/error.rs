//! Domain error type shared by every calibra crate.
//!
//! The API layer maps each variant onto an HTTP status; nothing here knows
//! about transport.

use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A lookup by id or business key came back empty.
    ///
    /// `key` is the rendered identifier: a numeric row id for alerts and
    /// users, the gauge id string for gauges.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// Caller input that can never succeed as sent.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The request collides with current state (duplicate gauge id,
    /// already-acknowledged alert, taken username).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Broken invariant or infrastructure failure. Never shown verbatim.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl Display) -> Self {
        CoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }
}
