//! Table Accessor Library
//!
//! Typed, injection-safe access to a single table in PostgreSQL or SQLite.
//! A [`ConnectionManager`] owns one session; [`Table`] accessors created from
//! it validate every column and value against the introspected schema before
//! running parameterized statements in their own transactions.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{ConnectionManager, Table};
pub use error::{DbError, DbResult, ErrorKind};
pub use models::{ConnectionConfig, Row, Value};
