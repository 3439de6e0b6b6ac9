//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod alert_repo;
pub mod audit_repo;
pub mod gauge_repo;
pub mod role_repo;
pub mod session_repo;
pub mod threshold_repo;
pub mod user_repo;

pub use alert_repo::AlertRepo;
pub use audit_repo::AuditRepo;
pub use gauge_repo::GaugeRepo;
pub use role_repo::RoleRepo;
pub use session_repo::SessionRepo;
pub use threshold_repo::ThresholdRepo;
pub use user_repo::UserRepo;
