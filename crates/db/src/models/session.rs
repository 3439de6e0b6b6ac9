//! Refresh-token sessions.

use calibra_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from `refresh_sessions`.
///
/// Never serialized: the hash is only ever compared inside SQL.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
    /// Set when the token is exchanged or the user logs out.
    pub consumed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl RefreshSession {
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }
}

/// Insert DTO for a freshly issued refresh token.
#[derive(Debug)]
pub struct NewRefreshSession<'a> {
    pub user_id: DbId,
    pub refresh_token_hash: &'a str,
    pub expires_at: Timestamp,
}
