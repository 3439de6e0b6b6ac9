//! Repository for `roles`.

use std::collections::HashMap;

use calibra_core::types::DbId;
use sqlx::PgPool;

use crate::models::role::Role;

pub struct RoleRepo;

impl RoleRepo {
    /// Look up a role by its exact name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Name of the role with `role_id`.
    ///
    /// `users.role_id` is a restricting foreign key, so a missing row surfaces
    /// as `RowNotFound` rather than a placeholder name.
    pub async fn name_of(pool: &PgPool, role_id: DbId) -> Result<String, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT name FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_one(pool)
            .await
    }

    /// All role names keyed by id, for rendering user lists in one query.
    pub async fn names_by_id(pool: &PgPool) -> Result<HashMap<DbId, String>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (DbId, String)>("SELECT id, name FROM roles")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().collect())
    }
}
