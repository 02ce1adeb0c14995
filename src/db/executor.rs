//! Statement execution engine.
//!
//! Every statement runs inside its own implicit transaction:
//! - committed when the statement and row decoding succeed
//! - rolled back on any backend error or when the timeout budget runs out
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `postgres`: PostgreSQL-specific execution
//! - `sqlite`: SQLite-specific execution
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::connection::DbConnection;
use crate::db::statement::{Operation, Statement};
use crate::db::types::RowToValues;
use crate::error::{DbError, DbResult};
use crate::models::{Row, TableSchema};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

/// Runs built statements against a session connection.
#[derive(Debug, Clone, Copy)]
pub struct StatementExecutor {
    timeout: Duration,
}

impl StatementExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for an operation starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    /// Execute one statement in a transaction and decode the returned rows.
    ///
    /// Every step, including the rollback after a failure, finishes by `deadline`.
    pub async fn execute(
        &self,
        conn: &mut DbConnection,
        schema: &TableSchema,
        statement: &Statement,
        deadline: Instant,
    ) -> DbResult<Vec<Row>> {
        let start = Instant::now();

        debug!(
            operation = %statement.operation,
            table = %schema.table_name,
            sql = %statement.sql,
            params = statement.params.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Executing statement"
        );

        let run = Run {
            schema,
            statement,
            deadline,
            budget: self.timeout,
        };
        let result = match conn {
            DbConnection::Postgres(c) => postgres::execute(c, run).await,
            DbConnection::SQLite(c) => sqlite::execute(c, run).await,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(rows) => debug!(
                operation = %statement.operation,
                table = %schema.table_name,
                rows = rows.len(),
                elapsed_ms,
                "Statement committed"
            ),
            Err(e) => warn!(
                operation = %statement.operation,
                table = %schema.table_name,
                kind = %e.kind(),
                error = %e,
                elapsed_ms,
                "Statement rolled back"
            ),
        }
        result
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// One statement execution and its time limit.
#[derive(Clone, Copy)]
struct Run<'a> {
    schema: &'a TableSchema,
    statement: &'a Statement,
    deadline: Instant,
    /// Reported in timeout errors
    budget: Duration,
}

impl Run<'_> {
    fn op(&self) -> Operation {
        self.statement.operation
    }

    fn table(&self) -> &str {
        &self.schema.table_name
    }

    fn timed_out(&self) -> DbError {
        DbError::timeout(self.op().as_str(), self.budget)
    }

    fn failed(&self, err: sqlx::Error) -> DbError {
        DbError::from_sqlx(self.op(), self.table(), err)
    }

    /// Decode fetched rows; one undecodable column fails the statement.
    fn decode<R: RowToValues>(&self, rows: &[R]) -> DbResult<Vec<Row>> {
        rows.iter()
            .map(|r| r.to_value_row(self.schema).map_err(|e| self.failed(e)))
            .collect()
    }
}

/// Roll back by the deadline, logging failures. The caller's error is what gets reported.
///
/// A rollback cut short by the deadline drops the transaction, which leaves
/// the driver to roll it back before the connection's next statement.
async fn rollback<DB: sqlx::Database>(tx: sqlx::Transaction<'_, DB>, run: Run<'_>) {
    match timeout_at(run.deadline, tx.rollback()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(operation = %run.op(), error = %e, "Rollback failed"),
        Err(_) => warn!(operation = %run.op(), "Rollback deferred past the deadline"),
    }
}

/// Commit by the deadline.
async fn commit<DB: sqlx::Database>(
    tx: sqlx::Transaction<'_, DB>,
    run: Run<'_>,
) -> DbResult<()> {
    match timeout_at(run.deadline, tx.commit()).await {
        Ok(result) => result.map_err(|e| run.failed(e)),
        Err(_) => Err(run.timed_out()),
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::{Connection, PgConnection};

    pub async fn execute(conn: &mut PgConnection, run: Run<'_>) -> DbResult<Vec<Row>> {
        let mut tx = match timeout_at(run.deadline, conn.begin()).await {
            Ok(Ok(tx)) => tx,
            Ok(Err(e)) => return Err(run.failed(e)),
            Err(_) => return Err(run.timed_out()),
        };

        // Server-side limit as well, so an abandoned statement does not keep running
        let remaining = run.deadline.saturating_duration_since(Instant::now());
        let set_timeout = format!(
            "SET LOCAL statement_timeout = {}",
            remaining.as_millis().max(1)
        );
        match timeout_at(run.deadline, sqlx::query(&set_timeout).execute(&mut *tx)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                let err = run.failed(e);
                rollback(tx, run).await;
                return Err(err);
            }
            Err(_) => {
                rollback(tx, run).await;
                return Err(run.timed_out());
            }
        }

        let mut query = sqlx::query(&run.statement.sql);
        for param in &run.statement.params {
            query = bind_postgres_param(query, param);
        }

        let fetched = match timeout_at(run.deadline, query.fetch_all(&mut *tx)).await {
            Ok(Ok(rows)) => run.decode(&rows),
            Ok(Err(e)) => Err(run.failed(e)),
            Err(_) => Err(run.timed_out()),
        };
        match fetched {
            Ok(rows) => {
                commit(tx, run).await?;
                Ok(rows)
            }
            Err(err) => {
                rollback(tx, run).await;
                Err(err)
            }
        }
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::{Connection, SqliteConnection};

    pub async fn execute(conn: &mut SqliteConnection, run: Run<'_>) -> DbResult<Vec<Row>> {
        let mut tx = match timeout_at(run.deadline, conn.begin()).await {
            Ok(Ok(tx)) => tx,
            Ok(Err(e)) => return Err(run.failed(e)),
            Err(_) => return Err(run.timed_out()),
        };

        let mut query = sqlx::query(&run.statement.sql);
        for param in &run.statement.params {
            query = bind_sqlite_param(query, param);
        }

        let fetched = match timeout_at(run.deadline, query.fetch_all(&mut *tx)).await {
            Ok(Ok(rows)) => run.decode(&rows),
            Ok(Err(e)) => Err(run.failed(e)),
            Err(_) => Err(run.timed_out()),
        };
        match fetched {
            Ok(rows) => {
                commit(tx, run).await?;
                Ok(rows)
            }
            Err(err) => {
                rollback(tx, run).await;
                Err(err)
            }
        }
    }
}
