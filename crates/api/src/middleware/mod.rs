//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`]: the user behind a JWT Bearer token.
//! - [`rbac::RequireAdmin`]: `admin` only.
//! - [`rbac::RequireOperator`]: `operator` or `admin`.
//! - [`rbac::RequireAuth`]: any authenticated user.

pub mod auth;
pub mod rbac;
