use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body, which bounds spreadsheet uploads.
    pub max_upload_bytes: usize,
    /// Period of the background status refresh (default: one hour).
    pub status_refresh_interval_secs: u64,
    /// Period of the WebSocket ping sweep (default: `30`).
    pub ws_heartbeat_interval_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `HOST`                         | `0.0.0.0`               |
    /// | `PORT`                         | `3000`                  |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                    |
    /// | `MAX_UPLOAD_BYTES`             | `10485760`              |
    /// | `STATUS_REFRESH_INTERVAL_SECS` | `3600`                  |
    /// | `WS_HEARTBEAT_INTERVAL_SECS`   | `30`                    |
    ///
    /// JWT settings are read by [`JwtConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_or("PORT", 3000u16)?;

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", 30u64)?;
        let max_upload_bytes = env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?;
        let status_refresh_interval_secs = env_interval("STATUS_REFRESH_INTERVAL_SECS", 3600)?;
        let ws_heartbeat_interval_secs = env_interval("WS_HEARTBEAT_INTERVAL_SECS", 30)?;

        let jwt = JwtConfig::from_env()?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes,
            status_refresh_interval_secs,
            ws_heartbeat_interval_secs,
            jwt,
        })
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
pub(crate) fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

/// Like [`env_or`] for tick periods, which must be non-zero.
fn env_interval(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_or(name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".into(),
        }),
        secs => Ok(secs),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
