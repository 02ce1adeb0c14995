//! Error types for the table accessor.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every variant maps to one [`ErrorKind`] so that a boundary layer (HTTP, CLI, ...)
//! can translate failures without inspecting messages.

use crate::db::statement::Operation;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// SQLSTATE for an undefined column.
pub const SQLSTATE_UNDEFINED_COLUMN: &str = "42703";
/// SQLSTATE for an undefined table.
pub const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for a value whose type does not match the column.
pub const SQLSTATE_DATATYPE_MISMATCH: &str = "42804";

/// Coarse error classification for boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionFailure,
    DuplicateKey,
    RecordNotFound,
    QueryFailure,
    Timeout,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionFailure => "connection_failure",
            Self::DuplicateKey => "duplicate_key",
            Self::RecordNotFound => "record_not_found",
            Self::QueryFailure => "query_failure",
            Self::Timeout => "timeout",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Duplicate key in '{table}': {message}")]
    DuplicateKey {
        table: String,
        constraint: Option<String>,
        message: String,
    },

    #[error("Record {id} not found in '{table}'")]
    RecordNotFound { table: String, id: i64 },

    #[error("{operation} failed: {message}")]
    Query {
        operation: String,
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a duplicate key error.
    pub fn duplicate_key(
        table: impl Into<String>,
        constraint: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DuplicateKey {
            table: table.into(),
            constraint,
            message: message.into(),
        }
    }

    /// Create a record not found error.
    pub fn record_not_found(table: impl Into<String>, id: i64) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            id,
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(
        operation: impl Into<String>,
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create an error for a column that is not part of the table.
    pub fn undefined_column(operation: Operation, table: &str, column: &str) -> Self {
        Self::query(
            operation.as_str(),
            format!("column \"{}\" does not exist in table \"{}\"", column, table),
            Some(SQLSTATE_UNDEFINED_COLUMN.to_string()),
            "Check the column name against the table schema",
        )
    }

    /// Create an error for a table that does not exist.
    pub fn undefined_table(operation: Operation, table: &str) -> Self {
        Self::query(
            operation.as_str(),
            format!("relation \"{}\" does not exist", table),
            Some(SQLSTATE_UNDEFINED_TABLE.to_string()),
            "Check the table name; it is case-sensitive",
        )
    }

    /// Create an error for a value whose kind does not fit the column.
    pub fn datatype_mismatch(
        operation: Operation,
        column: &str,
        column_type: &str,
        value_kind: &str,
    ) -> Self {
        Self::query(
            operation.as_str(),
            format!(
                "column \"{}\" is of type {} but the value is {}",
                column, column_type, value_kind
            ),
            Some(SQLSTATE_DATATYPE_MISMATCH.to_string()),
            "Pass a value of the column's type",
        )
    }

    /// Create a timeout error for an operation that ran out of `budget`.
    pub fn timeout(operation: impl Into<String>, budget: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error returned when an operation runs without a live session.
    pub fn not_connected() -> Self {
        Self::connection(
            "Not connected to the database",
            "Call connect() and create a new table accessor",
        )
    }

    /// Convert a driver error raised while running `operation` against `table`.
    ///
    /// Unique violations become [`DbError::DuplicateKey`]; any other database-reported
    /// failure keeps its SQLSTATE and is tagged with the operation name.
    pub fn from_sqlx(operation: Operation, table: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                    return DbError::duplicate_key(
                        table,
                        db_err.constraint().map(String::from),
                        db_err.message(),
                    );
                }
                let code = db_err.code().map(|c| c.to_string());
                DbError::query(
                    operation.as_str(),
                    db_err.message(),
                    code,
                    "Check the column names and value types",
                )
            }
            other => match DbError::from(other) {
                DbError::Internal { message } => DbError::query(
                    operation.as_str(),
                    message,
                    None,
                    "Check the column names and value types",
                ),
                converted => converted,
            },
        }
    }

    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::ConnectionFailure,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::RecordNotFound { .. } => ErrorKind::RecordNotFound,
            Self::Query { .. } => ErrorKind::QueryFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// SQLSTATE reported by the backend (or assigned locally), if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Query { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            Self::DuplicateKey { .. } => Some("Use a value that is not already present"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// True when the session that produced this error can no longer be used.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Driver errors outside a table operation (introspection, connect).
///
/// Transport failures mean the session is gone and map to
/// [`DbError::Connection`]; anything the driver could not decode is internal.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;

        let lost = |what: &str, detail: String| {
            DbError::connection(format!("{}: {}", what, detail), "Reconnect to the database")
        };

        match err {
            E::Configuration(msg) => DbError::invalid_input(format!(
                "Invalid connection configuration: {}",
                msg
            )),
            E::Database(db_err) => DbError::query(
                "statement",
                db_err.message(),
                db_err.code().map(String::from),
                "Check the table and column names",
            ),
            E::Io(e) => lost("I/O error", e.to_string()),
            E::Tls(e) => lost("TLS error", e.to_string()),
            E::Protocol(msg) => lost("Protocol error", msg),
            E::WorkerCrashed => lost("Connection closed", "database worker crashed".to_string()),
            other => DbError::internal(other.to_string()),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::query("insert", "bad value", Some("22P02".to_string()), "Fix it");
        assert_eq!(err.suggestion(), Some("Fix it"));
        assert_eq!(err.sql_state(), Some("22P02"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::timeout("query", Duration::from_secs(30)).is_retryable());
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::invalid_input("bad").is_retryable());
        assert!(!DbError::record_not_found("users", 1).is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DbError::not_connected().kind(), ErrorKind::ConnectionFailure);
        assert_eq!(
            DbError::duplicate_key("users", None, "dup").kind(),
            ErrorKind::DuplicateKey
        );
        assert_eq!(
            DbError::record_not_found("users", 7).kind(),
            ErrorKind::RecordNotFound
        );
        assert_eq!(
            DbError::undefined_column(Operation::Update, "users", "sta").kind(),
            ErrorKind::QueryFailure
        );
        assert_eq!(
            DbError::timeout("x", Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_timeout_keeps_sub_second_budgets() {
        let err = DbError::timeout("insert", Duration::from_millis(250));
        assert_eq!(err.to_string(), "Timeout: insert exceeded 250ms");

        let err = DbError::timeout("get_all", Duration::from_secs(90));
        assert_eq!(err.to_string(), "Timeout: get_all exceeded 90000ms");
    }

    #[test]
    fn test_undefined_column_carries_sql_state() {
        let err = DbError::undefined_column(Operation::Update, "users", "sta");
        assert_eq!(err.sql_state(), Some(SQLSTATE_UNDEFINED_COLUMN));
        let msg = err.to_string();
        assert!(msg.starts_with("update failed"));
        assert!(msg.contains("\"sta\""));
    }

    #[test]
    fn test_undefined_table() {
        let err = DbError::undefined_table(Operation::Describe, "ghosts");
        assert_eq!(err.sql_state(), Some(SQLSTATE_UNDEFINED_TABLE));
        assert_eq!(err.to_string(), "describe failed: relation \"ghosts\" does not exist");
    }

    #[test]
    fn test_datatype_mismatch_message() {
        let err = DbError::datatype_mismatch(Operation::GetByParam, "age", "integer", "text");
        assert_eq!(err.sql_state(), Some(SQLSTATE_DATATYPE_MISMATCH));
        assert!(err.to_string().contains("is of type integer but the value is text"));
    }

    #[test]
    fn test_from_sqlx_io_is_connection_lost() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = DbError::from_sqlx(Operation::GetAll, "users", sqlx::Error::Io(io));
        assert!(err.is_connection_lost());
        assert_eq!(err.kind(), ErrorKind::ConnectionFailure);
    }

    #[test]
    fn test_from_sqlx_decode_is_tagged_with_operation() {
        let err = DbError::from_sqlx(Operation::GetById, "users", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::QueryFailure);
        assert!(err.to_string().starts_with("get_by_id failed"));
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::DuplicateKey.to_string(), "duplicate_key");
        assert_eq!(
            serde_json::to_string(&ErrorKind::RecordNotFound).unwrap(),
            "\"record_not_found\""
        );
    }
}
