//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Session management (one live connection per manager)
//! - Table accessors
//! - Statement building and execution
//! - Schema introspection
//! - Type mappings

pub mod connection;
pub mod executor;
pub mod params;
pub mod schema;
pub mod statement;
pub mod table;
pub mod types;

pub use connection::{ConnectionManager, DbConnection};
pub use executor::StatementExecutor;
pub use schema::SchemaInspector;
pub use statement::{Dialect, Operation, Statement, StatementBuilder};
pub use table::Table;
pub use types::TypeCategory;
