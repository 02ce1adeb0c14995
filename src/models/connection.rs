//! Connection-related data models.
//!
//! This module defines types for database connection configuration and state.

use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Bounded retry policy for establishing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one; at least 1
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CONNECT_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Configuration for a database connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    pub connect_timeout: Duration,
    /// Default budget for each statement run by a table accessor
    pub statement_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ConnectionConfig {
    /// Create a new connection configuration with default timeouts and retries.
    pub fn new(connection_string: impl Into<String>) -> Result<Self, ConnectionConfigError> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(ConnectionConfigError::Empty);
        }

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| {
                ConnectionConfigError::UnknownDatabaseType(scheme_of(&connection_string))
            })?;

        Ok(Self {
            db_type,
            connection_string,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            statement_timeout: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        match url::Url::parse(&self.connection_string) {
            Ok(mut parsed) if parsed.password().is_some() => {
                if parsed.set_password(Some("****")).is_ok() {
                    parsed.to_string()
                } else {
                    scheme_of(&self.connection_string)
                }
            }
            Ok(_) => self.connection_string.clone(),
            // Unparseable strings may still hold credentials
            Err(_) => format!("{}://****", scheme_of(&self.connection_string)),
        }
    }

    /// Database name (PostgreSQL) or file path (SQLite) the session targets.
    pub fn database_name(&self) -> Option<String> {
        match self.db_type {
            DatabaseType::PostgreSQL => url::Url::parse(&self.connection_string)
                .ok()
                .map(|u| u.path().trim_start_matches('/').to_string())
                .filter(|name| !name.is_empty()),
            DatabaseType::SQLite => {
                let rest = self
                    .connection_string
                    .strip_prefix("sqlite://")
                    .or_else(|| self.connection_string.strip_prefix("sqlite:"))
                    .unwrap_or(&self.connection_string);
                let path = rest.split('?').next().unwrap_or(rest);
                (!path.is_empty()).then(|| path.to_string())
            }
        }
    }
}

fn scheme_of(connection_string: &str) -> String {
    connection_string
        .split(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Connection string cannot be empty")]
    Empty,

    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string (scheme '{0}')")]
    UnknownDatabaseType(String),
}

/// Information about an active session, returned after a successful connect.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub session_id: u64,
    pub database_type: DatabaseType,
    pub server_version: Option<String>,
    pub database: Option<String>,
}
