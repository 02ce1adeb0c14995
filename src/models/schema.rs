//! Schema-related data models.
//!
//! A [`TableSchema`] is the allow-list an accessor checks every column name
//! against before it is interpolated into a statement.

use crate::db::types::TypeCategory;
use serde::Serialize;

/// Column name used for `*_by_id` operations when the table declares no
/// single-column primary key.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as reported by the backend
    pub data_type: String,
    #[serde(skip)]
    pub category: TypeCategory,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl ColumnInfo {
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        category: TypeCategory,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            category,
            nullable,
            is_primary_key: false,
        }
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }
}

/// Introspected columns of one table, in ordinal order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    /// Single-column primary key, if the table declares one
    pub primary_key: Option<String>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    /// Record the primary key from the flagged columns.
    ///
    /// Composite keys are not usable for `*_by_id`, so they leave the key unset.
    pub fn resolve_primary_key(mut self) -> Self {
        let mut pk_columns = self.columns.iter().filter(|c| c.is_primary_key);
        self.primary_key = match (pk_columns.next(), pk_columns.next()) {
            (Some(only), None) => Some(only.name.clone()),
            _ => None,
        };
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The key column for `*_by_id` operations.
    pub fn primary_key_column(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
