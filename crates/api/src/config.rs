use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Read `key` from the environment and parse it, falling back to `default`
/// when the variable is unset.
pub fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Trim a trailing slash and reject paths the router cannot nest under.
fn normalize_base_path(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !trimmed.starts_with('/') {
        return Err(ConfigError::Invalid {
            key: "API_BASE_PATH",
            reason: "must start with '/' and not be the root".into(),
        });
    }
    Ok(trimmed.to_string())
}

/// Attributes of the refresh-token cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Prefix the API is mounted under; the cookie path is `{base_path}/auth`.
    /// The router nests the API routes here too.
    pub base_path: String,
    /// Optional `Domain` attribute. Host-only cookie when `None`.
    pub domain: Option<String>,
}

impl CookieConfig {
    pub fn path(&self) -> String {
        format!("{}/auth", self.base_path.trim_end_matches('/'))
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL and JWT secret have defaults suitable
/// for local development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Postgres connection string.
    pub database_url: String,
    /// Token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `DATABASE_URL`         | required                   |
    /// | `API_BASE_PATH`        | `/api/v1`                  |
    /// | `COOKIE_DOMAIN`        | unset                      |
    ///
    /// See [`JwtConfig::from_env`] for the token variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", 3000)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 30)?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let base_path = std::env::var("API_BASE_PATH").unwrap_or_else(|_| "/api/v1".into());
        let cookie = CookieConfig {
            base_path: normalize_base_path(&base_path)?,
            domain: std::env::var("COOKIE_DOMAIN")
                .ok()
                .filter(|d| !d.trim().is_empty()),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            jwt: JwtConfig::from_env()?,
            cookie,
        })
    }
}
