//! Repository for the `users` table.

use calibra_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, FailedLogin, User};

const COLUMNS: &str = "id, username, email, password_hash, role_id, is_active, \
                        last_login_at, failed_login_count, locked_until, created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(input.role_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// List all users, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users ORDER BY created_at DESC");
        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Count a failed password attempt, locking the account for
    /// `lock_minutes` once the count reaches `max_attempts`.
    ///
    /// Counting and locking happen in one statement so concurrent bad
    /// logins cannot both slip under the limit.
    pub async fn record_failed_login(
        pool: &PgPool,
        id: DbId,
        max_attempts: i32,
        lock_minutes: i32,
    ) -> Result<FailedLogin, sqlx::Error> {
        sqlx::query_as::<_, FailedLogin>(
            "UPDATE users SET
                failed_login_count = failed_login_count + 1,
                locked_until = CASE
                    WHEN failed_login_count + 1 >= $2 THEN NOW() + make_interval(mins => $3)
                    ELSE locked_until
                END
             WHERE id = $1
             RETURNING failed_login_count, locked_until",
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_minutes)
        .fetch_one(pool)
        .await
    }

    /// Reset the failure counter and lock, and stamp `last_login_at`.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                failed_login_count = 0,
                locked_until = NULL,
                last_login_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
