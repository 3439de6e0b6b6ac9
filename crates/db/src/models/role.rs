//! Access roles. The set is fixed by migration: `admin`, `operator`, `viewer`.

use calibra_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
}
