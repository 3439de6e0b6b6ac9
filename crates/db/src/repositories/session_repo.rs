//! Repository for `refresh_sessions`.
//!
//! Tokens are single-use: [`SessionRepo::consume`] marks the row in the same
//! statement that looks it up, so two concurrent refreshes with one token
//! cannot both succeed.

use calibra_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::session::{NewRefreshSession, RefreshSession};

pub struct SessionRepo;

impl SessionRepo {
    pub async fn insert(
        pool: &PgPool,
        input: &NewRefreshSession<'_>,
    ) -> Result<RefreshSession, sqlx::Error> {
        sqlx::query_as::<_, RefreshSession>(
            "INSERT INTO refresh_sessions (user_id, refresh_token_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, refresh_token_hash, expires_at, consumed_at, created_at",
        )
        .bind(input.user_id)
        .bind(input.refresh_token_hash)
        .bind(input.expires_at)
        .fetch_one(pool)
        .await
    }

    /// Atomically consume a live session by token hash.
    ///
    /// Returns the owning user id, or `None` when the token is unknown,
    /// already used, or expired.
    pub async fn consume(pool: &PgPool, token_hash: &str) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "UPDATE refresh_sessions SET consumed_at = NOW()
             WHERE refresh_token_hash = $1
               AND consumed_at IS NULL
               AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Consume every live session of `user_id` (logout). Returns the count.
    pub async fn consume_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_sessions SET consumed_at = NOW()
             WHERE user_id = $1 AND consumed_at IS NULL",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete sessions that expired or were consumed before `cutoff`.
    pub async fn purge_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM refresh_sessions WHERE expires_at < $1 OR consumed_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_live_for_user(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM refresh_sessions
             WHERE user_id = $1 AND consumed_at IS NULL AND expires_at > NOW()",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
