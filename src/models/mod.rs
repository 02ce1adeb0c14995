//! Data models for the table accessor.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod row;
pub mod schema;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionConfigError, ConnectionInfo, DEFAULT_CONNECT_ATTEMPTS,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS,
    DEFAULT_STATEMENT_TIMEOUT_SECS, DatabaseType, RetryPolicy,
};
pub use row::{DATE_FORMAT, Row, Value, ValueKind};
pub use schema::{ColumnInfo, DEFAULT_PRIMARY_KEY, TableSchema};
