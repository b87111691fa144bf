//! API server configuration.

use pith_core::defaults::{RATE_LIMIT_PERIOD_SECS, RATE_LIMIT_REQUESTS, SERVER_PORT};
use pith_core::{Error, Result};

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen port.
    pub port: u16,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// HMAC key verifying session tokens issued by the auth service.
    pub session_signing_key: String,
    /// Global rate limit (requests per period); `None` disables limiting.
    pub rate_limit: Option<(u64, u64)>,
}

impl ApiConfig {
    /// Read configuration from the environment.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PORT` | `3000` | Listen port |
    /// | `DATABASE_URL` | — | PostgreSQL URL (required) |
    /// | `SESSION_SIGNING_KEY` | — | Session token HMAC key (required) |
    /// | `RATE_LIMIT_DISABLED` | unset | Set to disable rate limiting |
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is required".to_string()))?;
        let session_signing_key = std::env::var("SESSION_SIGNING_KEY")
            .map_err(|_| Error::Config("SESSION_SIGNING_KEY is required".to_string()))?;

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(SERVER_PORT);

        let rate_limit = if std::env::var("RATE_LIMIT_DISABLED").is_ok() {
            None
        } else {
            Some((RATE_LIMIT_REQUESTS, RATE_LIMIT_PERIOD_SECS))
        };

        Ok(Self {
            port,
            database_url,
            session_signing_key,
            rate_limit,
        })
    }
}
