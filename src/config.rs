//! Configuration handling for the table-accessor binary.
//!
//! Settings come from CLI flags with environment fallbacks. A `.env` file in
//! the working directory is loaded first (see [`load_dotenv`]); variables that
//! are already set win over it.

use crate::models::{
    ConnectionConfig, ConnectionConfigError, DEFAULT_CONNECT_ATTEMPTS,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_STATEMENT_TIMEOUT_SECS, DatabaseType, RetryPolicy,
};
use clap::Args;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Load `.env` from the current directory, if present.
///
/// Returns the loaded path. Missing files are not an error.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    dotenvy::dotenv().ok()
}

/// Errors raised while turning flags and environment into a connection config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No database configured: set DATABASE_URL or {0}")]
    MissingSetting(String),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("No table given: pass --table or set DB_TABLE")]
    MissingTable,

    #[error(transparent)]
    Connection(#[from] ConnectionConfigError),
}

/// Connection, timeout and logging settings.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Full connection URL (postgres://... or sqlite:...). Overrides the DB_* parts.
    #[arg(long, value_name = "URL", env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// PostgreSQL host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// PostgreSQL port
    #[arg(long, default_value_t = DEFAULT_DB_PORT, env = "DB_PORT")]
    pub db_port: u16,

    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Table the command operates on
    #[arg(short, long, env = "DB_TABLE")]
    pub table: Option<String>,

    /// Connection timeout in seconds (per attempt)
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "DB_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Statement timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS,
        env = "DB_STATEMENT_TIMEOUT"
    )]
    pub statement_timeout: u64,

    /// Connection attempts before giving up
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_ATTEMPTS,
        env = "DB_CONNECT_ATTEMPTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub connect_attempts: u32,

    /// Delay before the first retry, in milliseconds; doubles per attempt
    #[arg(
        long,
        default_value_t = DEFAULT_INITIAL_BACKOFF_MS,
        env = "DB_RETRY_BACKOFF_MS"
    )]
    pub retry_backoff_ms: u64,

    /// Upper bound for the retry delay, in milliseconds
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_BACKOFF_MS,
        env = "DB_RETRY_MAX_BACKOFF_MS"
    )]
    pub retry_max_backoff_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database_url: None,
            db_host: None,
            db_port: DEFAULT_DB_PORT,
            db_user: None,
            db_password: None,
            db_name: None,
            table: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT_SECS,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            retry_max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }

    /// The connection URL: `DATABASE_URL` as given, or one built from the DB_* parts.
    pub fn connection_string(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }

        let host = required(&self.db_host, "DB_HOST")?;
        let user = required(&self.db_user, "DB_USER")?;
        let name = required(&self.db_name, "DB_NAME")?;

        let mut url = Url::parse("postgres://localhost")
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        url.set_host(Some(host))
            .map_err(|e| ConfigError::InvalidUrl(format!("DB_HOST: {}", e)))?;
        url.set_port(Some(self.db_port))
            .map_err(|_| ConfigError::InvalidUrl("DB_PORT cannot be set".to_string()))?;
        url.set_username(user)
            .map_err(|_| ConfigError::InvalidUrl("DB_USER cannot be set".to_string()))?;
        if let Some(password) = self.db_password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| ConfigError::InvalidUrl("DB_PASSWORD cannot be set".to_string()))?;
        }
        // Percent-encodes anything that is not a path character
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl("URL cannot have a path".to_string()))?
            .push(name);

        Ok(url.to_string())
    }

    /// Build the injected connection configuration.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        let config = ConnectionConfig::new(self.connection_string()?)?
            .with_connect_timeout(self.connect_timeout_duration())
            .with_statement_timeout(self.statement_timeout_duration())
            .with_retry(self.retry_policy());
        Ok(config)
    }

    /// The table name, required by every command.
    pub fn table_name(&self) -> Result<&str, ConfigError> {
        self.table
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTable)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_backoff: Duration::from_millis(
                self.retry_max_backoff_ms.max(self.retry_backoff_ms),
            ),
        }
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Get the statement timeout as a Duration.
    pub fn statement_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.statement_timeout)
    }

    /// Backend the configuration points at, if it can be determined.
    pub fn database_type(&self) -> Option<DatabaseType> {
        self.connection_string()
            .ok()
            .and_then(|url| DatabaseType::from_connection_string(&url))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingSetting(name.to_string()))
}
