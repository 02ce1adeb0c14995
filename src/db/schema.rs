//! Schema introspection module.
//!
//! Builds the [`TableSchema`] allow-list for a table accessor.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules (postgres, sqlite), each providing the same interface.

use crate::db::connection::DbConnection;
use crate::db::statement::Operation;
use crate::db::types::categorize_type;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, DatabaseType, TableSchema};
use tracing::debug;

/// Schema inspector for table introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Describe a table's columns, in ordinal order.
    ///
    /// A table without visible columns does not exist as far as the accessor is
    /// concerned and yields an undefined-table error.
    pub async fn describe_table(
        conn: &mut DbConnection,
        table_name: &str,
    ) -> DbResult<TableSchema> {
        let schema = match conn {
            DbConnection::Postgres(c) => postgres::describe_table(c, table_name).await?,
            DbConnection::SQLite(c) => sqlite::describe_table(c, table_name).await?,
        };

        if schema.columns.is_empty() {
            return Err(DbError::undefined_table(Operation::Describe, table_name));
        }

        debug!(
            table = %table_name,
            columns = schema.columns.len(),
            primary_key = %schema.primary_key_column(),
            "Described table"
        );
        Ok(schema)
    }
}

mod queries {
    pub mod postgres {
        /// Columns of a table in the current schema with a primary key flag.
        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            c.udt_name::text AS udt_name,
            c.is_nullable::text AS is_nullable,
            EXISTS (
                SELECT 1
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                    AND tc.table_name = kcu.table_name
                WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = c.table_schema
                AND tc.table_name = c.table_name
                AND kcu.column_name = c.column_name
            ) AS is_primary_key
        FROM information_schema.columns c
        WHERE c.table_name = $1 AND c.table_schema = current_schema()
        ORDER BY c.ordinal_position
        "#;
    }

    pub mod sqlite {
        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT name, type, "notnull", pk
        FROM pragma_table_info(?1)
        ORDER BY cid
        "#;
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgConnection, Row};

    pub async fn describe_table(
        conn: &mut PgConnection,
        table_name: &str,
    ) -> DbResult<TableSchema> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DbError::from_sqlx(Operation::Describe, table_name, e))?;

        let mut schema = TableSchema::new(table_name);
        for row in &rows {
            let name: String = row.try_get("column_name")?;
            let udt_name: String = row.try_get("udt_name")?;
            let nullable: String = row.try_get("is_nullable")?;
            let is_pk: bool = row.try_get("is_primary_key")?;

            let category = categorize_type(&udt_name, DatabaseType::PostgreSQL);
            let column = ColumnInfo::new(name, udt_name, category, nullable == "YES");
            schema = schema.with_column(column.with_primary_key(is_pk));
        }
        Ok(schema.resolve_primary_key())
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqliteConnection};

    pub async fn describe_table(
        conn: &mut SqliteConnection,
        table_name: &str,
    ) -> DbResult<TableSchema> {
        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DbError::from_sqlx(Operation::Describe, table_name, e))?;

        let mut schema = TableSchema::new(table_name);
        for row in &rows {
            let name: String = row.try_get("name")?;
            let data_type: String = row.try_get("type")?;
            let notnull: i64 = row.try_get("notnull")?;
            // Position within the primary key, 0 when not part of it
            let pk: i64 = row.try_get("pk")?;

            let category = categorize_type(&data_type, DatabaseType::SQLite);
            schema = schema.with_column(
                ColumnInfo::new(name, data_type, category, notnull == 0).with_primary_key(pk > 0),
            );
        }
        Ok(schema.resolve_primary_key())
    }
}
