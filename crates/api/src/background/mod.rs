//! Background jobs.
//!
//! Each submodule provides a long-running async function meant for
//! `tokio::spawn`, stopped through a [`CancellationToken`].
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod status_refresh;
