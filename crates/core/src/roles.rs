//! Access roles.
//!
//! Names must match the rows seeded by
//! `20260301000002_create_users_and_roles.sql`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Roles in increasing order of privilege; each role can do everything the
/// roles below it can.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Read gauges, alerts and thresholds.
    Viewer,
    /// Edit, import and recalculate gauges; acknowledge alerts.
    Operator,
    /// Manage users and thresholds, read the audit trail, delete alerts.
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Viewer => "viewer",
            UserRole::Operator => "operator",
            UserRole::Admin => "admin",
        }
    }

    /// Whether this role grants at least the privileges of `required`.
    pub fn satisfies(self, required: UserRole) -> bool {
        self >= required
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(UserRole::Viewer),
            "operator" => Ok(UserRole::Operator),
            "admin" => Ok(UserRole::Admin),
            other => Err(CoreError::validation(format!("Unknown role: {other}"))),
        }
    }
}
