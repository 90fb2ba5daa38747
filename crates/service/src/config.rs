//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Database (one of)
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT`, `DB_NAME` - Parts of the
//!   connection string, used when `DATABASE_URL` is unset
//!
//! ## Optional
//! - `SERVER_HOST` - Bind address (default: 0.0.0.0)
//! - `SERVER_PORT` - Listen port (default: 8080)
//! - `REQUEST_TIMEOUT_SECS` - Deadline for each order request (default: 5)
//! - `WARMUP_TIMEOUT_SECS` - Deadline for the startup cache warm-up (default: 30)
//! - `DB_MAX_CONNECTIONS` - Connection pool size (default: 10)
//! - `STATIC_DIR` - Browser UI assets (default: crates/service/static)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Order service configuration.
///
/// `Debug` is derived; the database URL is a `SecretString` and prints redacted.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum number of pooled database connections
    pub db_max_connections: u32,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deadline applied to each order request
    pub request_timeout: Duration,
    /// Deadline applied to the startup cache warm-up
    pub warmup_timeout: Duration,
    /// Directory holding the browser UI (`index.html`, `script.js`, `styles.css`)
    pub static_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database location is missing or a
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: database_url_from_env()?,
            db_max_connections: parse_env_or_default("DB_MAX_CONNECTIONS", 10)?,
            host: parse_env_or_default("SERVER_HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_env_or_default("SERVER_PORT", 8080)?,
            request_timeout: Duration::from_secs(parse_env_or_default("REQUEST_TIMEOUT_SECS", 5)?),
            warmup_timeout: Duration::from_secs(parse_env_or_default("WARMUP_TIMEOUT_SECS", 30)?),
            static_dir: PathBuf::from(get_env_or_default("STATIC_DIR", "crates/service/static")),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Resolve the database URL from `DATABASE_URL` or the `DB_*` parts.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` naming the first missing part.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    if let Some(url) = get_optional_env("DATABASE_URL") {
        return Ok(SecretString::from(url));
    }

    let url = build_database_url(
        &get_required_env("DB_USER")?,
        &get_required_env("DB_PASSWORD")?,
        &get_required_env("DB_HOST")?,
        &get_env_or_default("DB_PORT", "5432"),
        &get_required_env("DB_NAME")?,
    );
    Ok(SecretString::from(url))
}

fn build_database_url(user: &str, password: &str, host: &str, port: &str, name: &str) -> String {
    format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode=disable")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| parse_value(key, &value))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
