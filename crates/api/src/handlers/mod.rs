pub mod admin;
pub mod alerts;
pub mod audit;
pub mod auth;
pub mod gauges;
pub mod thresholds;
