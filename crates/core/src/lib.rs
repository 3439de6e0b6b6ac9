//! Calibra domain core.
//!
//! Everything in this crate is pure: no database, network, or clock access
//! beyond what callers pass in. The API server and background jobs call
//! into these functions with a gauge snapshot and a threshold snapshot.

pub mod alert;
pub mod audit;
pub mod calendar;
pub mod error;
pub mod event_names;
pub mod gauge;
pub mod hashing;
pub mod roles;
pub mod spreadsheet;
pub mod status;
pub mod thresholds;
pub mod types;
