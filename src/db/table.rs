//! Table accessor.
//!
//! A [`Table`] is bound to one table on one session. Each operation validates
//! its inputs against the introspected schema, builds a parameterized
//! statement, and runs it in its own transaction.

use crate::db::connection::SessionState;
use crate::db::executor::StatementExecutor;
use crate::db::statement::{Dialect, Statement, StatementBuilder};
use crate::error::{DbError, DbResult};
use crate::models::{Row, TableSchema, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Table {
    state: Arc<SessionState>,
    session_id: u64,
    dialect: Dialect,
    schema: Arc<TableSchema>,
    executor: StatementExecutor,
}

impl Table {
    pub(crate) fn new(
        state: Arc<SessionState>,
        session_id: u64,
        dialect: Dialect,
        schema: TableSchema,
        timeout: Duration,
    ) -> Self {
        Self {
            state,
            session_id,
            dialect,
            schema: Arc::new(schema),
            executor: StatementExecutor::new(timeout),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.table_name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Column used by the `*_by_id` operations.
    pub fn primary_key(&self) -> &str {
        self.schema.primary_key_column()
    }

    /// Id of the session this accessor was created on.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn timeout(&self) -> Duration {
        self.executor.timeout()
    }

    /// Same accessor with a different per-statement budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.executor = StatementExecutor::new(timeout);
        self
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(self.dialect, &self.schema)
    }

    /// Run a statement on this accessor's session.
    ///
    /// Waiting for the session counts against the same budget as the statement.
    async fn execute(&self, statement: Statement) -> DbResult<Vec<Row>> {
        let deadline = self.executor.deadline();
        let mut guard = self
            .state
            .acquire(
                Some(self.session_id),
                deadline,
                self.executor.timeout(),
                statement.operation,
            )
            .await?;

        let result = {
            let session = guard.session()?;
            self.executor
                .execute(&mut session.conn, &self.schema, &statement, deadline)
                .await
        };

        if let Err(e) = &result {
            guard.invalidate_if_lost(e);
        }
        result
    }

    /// Row whose primary key equals `id`, if any.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Row>> {
        let statement = self.builder().get_by_id(id)?;
        Ok(self.execute(statement).await?.into_iter().next())
    }

    /// Rows where `column` equals `value`; a NULL value matches NULL cells.
    pub async fn get_by_param(&self, column: &str, value: impl Into<Value>) -> DbResult<Vec<Row>> {
        let statement = self.builder().get_by_param(column, value.into())?;
        self.execute(statement).await
    }

    /// Rows whose `column`, read as text, contains `substring` ignoring case.
    pub async fn get_by_pattern(&self, column: &str, substring: &str) -> DbResult<Vec<Row>> {
        let statement = self.builder().get_by_pattern(column, substring)?;
        self.execute(statement).await
    }

    /// Rows with `low <= column <= high`.
    pub async fn get_by_range(
        &self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> DbResult<Vec<Row>> {
        let statement = self.builder().get_by_range(column, low.into(), high.into())?;
        self.execute(statement).await
    }

    pub async fn get_all(&self) -> DbResult<Vec<Row>> {
        let statement = self.builder().get_all();
        self.execute(statement).await
    }

    /// Insert one row and return it as stored, defaults included.
    pub async fn insert(&self, fields: &Row) -> DbResult<Row> {
        let statement = self.builder().insert(fields)?;
        let row = self
            .execute(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::internal("INSERT ... RETURNING produced no row"))?;
        debug!(table = %self.name(), "Inserted row");
        Ok(row)
    }

    /// Update the row with primary key `id` and return its new state.
    pub async fn update(&self, id: i64, fields: &Row) -> DbResult<Row> {
        let statement = self.builder().update(id, fields)?;
        self.execute(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::record_not_found(self.name(), id))
    }

    /// Delete the row with primary key `id`, returning it if it existed.
    pub async fn delete_by_id(&self, id: i64) -> DbResult<Option<Row>> {
        let statement = self.builder().delete_by_id(id)?;
        Ok(self.execute(statement).await?.into_iter().next())
    }

    /// Delete every row where `column` equals `value`, returning the deleted rows.
    pub async fn delete_by_param(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> DbResult<Vec<Row>> {
        let statement = self.builder().delete_by_param(column, value.into())?;
        self.execute(statement).await
    }

    /// Rows where any of `columns`, read as text, contains `value` (case-sensitive).
    pub async fn search_in_table(&self, columns: &[&str], value: &str) -> DbResult<Vec<Row>> {
        let statement = self.builder().search_in_table(columns, value)?;
        self.execute(statement).await
    }
}
