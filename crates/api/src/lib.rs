//! Calibra API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! WebSocket infrastructure, background jobs) so integration tests and the
//! binary entrypoint share one router and one set of handlers.

pub mod auth;
pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod live;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
