//! API server configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;
use folio_core::auth::jwt::resolve_jwt_secret;
use folio_core::auth::session::{
    ACCESS_TOKEN_TTL_SECS, DEFAULT_STORE_TIMEOUT, REFRESH_TOKEN_TTL_DAYS, SessionConfig,
};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Token lifetimes and store-call bound.
    pub session: SessionConfig,
    /// Public site URL used to build password-reset links.
    pub reset_url_base: String,
    /// Mail relay endpoint for reset links. Links are only logged when unset.
    pub reset_webhook_url: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                               |
    /// |--------------------------|---------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:3100`                      |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/folio`     |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file     |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `900`                                 |
    /// | `REFRESH_TOKEN_TTL_DAYS` | `7`                                   |
    /// | `STORE_TIMEOUT_MS`       | `5000`                                |
    /// | `RESET_URL_BASE`         | `http://localhost:3000`               |
    /// | `RESET_WEBHOOK_URL`      | unset                                 |
    pub fn from_env() -> Self {
        let defaults = SessionConfig::default();
        let session = SessionConfig {
            access_ttl: Duration::seconds(env_parse("ACCESS_TOKEN_TTL_SECS", ACCESS_TOKEN_TTL_SECS)),
            refresh_ttl: Duration::days(env_parse("REFRESH_TOKEN_TTL_DAYS", REFRESH_TOKEN_TTL_DAYS)),
            store_timeout: StdDuration::from_millis(env_parse(
                "STORE_TIMEOUT_MS",
                DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            )),
            ..defaults
        };
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/folio".into()),
            jwt_secret: resolve_jwt_secret(),
            session,
            reset_url_base: std::env::var("RESET_URL_BASE")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            reset_webhook_url: std::env::var("RESET_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
