//! Statement building.
//!
//! Everything here is pure: a [`StatementBuilder`] turns an accessor operation
//! into SQL text plus an ordered list of bound [`Value`]s. Column names are
//! validated and checked against the table's [`TableSchema`] before they are
//! interpolated; values never are.

use crate::db::types::{TypeCategory, pg_decodes_natively};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, DATE_FORMAT, DatabaseType, Row, TableSchema, Value};
use chrono::NaiveDate;
use std::borrow::Cow;

/// Maximum identifier length (PostgreSQL's NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Accessor operations, used to tag statements, logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetById,
    GetByParam,
    GetByPattern,
    GetByRange,
    GetAll,
    Insert,
    Update,
    DeleteById,
    DeleteByParam,
    SearchInTable,
    /// Schema introspection when an accessor is created
    Describe,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetById => "get_by_id",
            Self::GetByParam => "get_by_param",
            Self::GetByPattern => "get_by_pattern",
            Self::GetByRange => "get_by_range",
            Self::GetAll => "get_all",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::DeleteById => "delete_by_id",
            Self::DeleteByParam => "delete_by_param",
            Self::SearchInTable => "search_in_table",
            Self::Describe => "describe",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Validate a table or column name.
///
/// Accepted names match `[A-Za-z_][A-Za-z0-9_]*` and are at most
/// [`MAX_IDENTIFIER_LEN`] bytes long.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::invalid_input("Identifier cannot be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::invalid_input(format!(
            "Identifier exceeds {} bytes",
            MAX_IDENTIFIER_LEN
        )));
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::invalid_input(format!(
            "Invalid identifier '{}': only letters, digits and underscores are allowed, \
             and it must not start with a digit",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// Double-quote an identifier.
///
/// Caller-supplied names pass [`validate_identifier`] first; introspected
/// names may contain anything, so embedded quotes are doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape `%`, `_` and `\` so a substring matches literally under `LIKE ... ESCAPE '\'`.
pub fn escape_like(substring: &str) -> String {
    let mut escaped = String::with_capacity(substring.len() + 2);
    for c in substring.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Dialect
// =============================================================================

/// SQL dialect differences between the supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl From<DatabaseType> for Dialect {
    fn from(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::PostgreSQL => Self::Postgres,
            DatabaseType::SQLite => Self::Sqlite,
        }
    }
}

impl Dialect {
    /// Positional placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${}", n),
            Self::Sqlite => format!("?{}", n),
        }
    }

    /// Cast applied to a bound value compared with or assigned to `column`.
    ///
    /// `None` means the placeholder is used as is.
    pub fn cast_for(&self, value: &Value, column: &ColumnInfo) -> Option<Cow<'static, str>> {
        match self {
            Self::Postgres => match value {
                Value::Int(_) => Some(Cow::Borrowed("BIGINT")),
                Value::Float(_) => Some(Cow::Borrowed("DOUBLE PRECISION")),
                Value::Bool(_) => Some(Cow::Borrowed("BOOLEAN")),
                Value::Date(_) => Some(Cow::Borrowed("DATE")),
                Value::Text(_) if column.category == TypeCategory::Text => {
                    Some(Cow::Borrowed("VARCHAR"))
                }
                // Text into timestamp/uuid/json/... columns and typed NULLs
                Value::Text(_) | Value::Null => Some(pg_column_type(column)),
            },
            Self::Sqlite => match value {
                Value::Int(_) => Some(Cow::Borrowed("INTEGER")),
                Value::Float(_) => Some(Cow::Borrowed("REAL")),
                Value::Text(_) => Some(Cow::Borrowed("VARCHAR")),
                // Booleans bind as 0/1, dates as ISO text
                Value::Bool(_) | Value::Date(_) | Value::Null => None,
            },
        }
    }

    /// Cast target used to compare any column as text.
    fn text_type(&self) -> &'static str {
        match self {
            Self::Postgres => "VARCHAR",
            Self::Sqlite => "TEXT",
        }
    }

    /// Case-insensitive pattern operator.
    fn ilike(&self) -> &'static str {
        match self {
            Self::Postgres => "ILIKE",
            // ASCII case-insensitive by default
            Self::Sqlite => "LIKE",
        }
    }
}

/// The column's own type name when it is a plain identifier, else its category's type.
fn pg_column_type(column: &ColumnInfo) -> Cow<'static, str> {
    if validate_identifier(&column.data_type).is_ok() {
        return Cow::Owned(quote_identifier(&column.data_type));
    }
    Cow::Borrowed(match column.category {
        TypeCategory::Integer => "BIGINT",
        TypeCategory::Float => "DOUBLE PRECISION",
        TypeCategory::Decimal => "NUMERIC",
        TypeCategory::Boolean => "BOOLEAN",
        TypeCategory::Date => "DATE",
        TypeCategory::Timestamp => "TIMESTAMP",
        TypeCategory::Text | TypeCategory::Other => "VARCHAR",
    })
}

// =============================================================================
// Type checking
// =============================================================================

/// Check a value against its target column, coercing where the column allows it.
///
/// Text bound to a date column is parsed as `YYYY-MM-DD`. Every other
/// combination outside the compatibility table is a datatype mismatch, so an
/// integer never matches a text column even on backends with loose typing.
pub fn coerce_value(operation: Operation, column: &ColumnInfo, value: Value) -> DbResult<Value> {
    use TypeCategory as C;

    let compatible = match (&value, column.category) {
        (Value::Null, _) => true,
        (Value::Int(_), C::Integer | C::Float | C::Decimal) => true,
        (Value::Float(_), C::Float | C::Decimal | C::Integer) => true,
        (Value::Bool(_), C::Boolean) => true,
        (Value::Date(_), C::Date | C::Timestamp) => true,
        (Value::Text(text), C::Date) => {
            return NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| {
                    DbError::invalid_input(format!(
                        "Column '{}' expects a date in YYYY-MM-DD format",
                        column.name
                    ))
                });
        }
        (Value::Text(_), C::Text | C::Timestamp | C::Other) => true,
        _ => false,
    };

    if compatible {
        Ok(value)
    } else {
        Err(DbError::datatype_mismatch(
            operation,
            &column.name,
            &column.data_type,
            value.kind().as_str(),
        ))
    }
}

// =============================================================================
// Statements
// =============================================================================

/// SQL text plus its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub operation: Operation,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds parameterized statements for one table.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    dialect: Dialect,
    schema: &'a TableSchema,
}

/// Accumulates bound parameters while a statement is assembled.
struct Params {
    dialect: Dialect,
    values: Vec<Value>,
}

impl Params {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder, cast for `column`.
    fn bind(&mut self, value: Value, column: &ColumnInfo) -> String {
        let cast = self.dialect.cast_for(&value, column);
        self.values.push(value);
        let placeholder = self.dialect.placeholder(self.values.len());
        match cast {
            Some(target) => format!("CAST({} AS {})", placeholder, target),
            None => placeholder,
        }
    }

    /// Bind a value compared as plain text.
    fn bind_text(&mut self, text: String) -> String {
        self.values.push(Value::Text(text));
        self.dialect.placeholder(self.values.len())
    }
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: Dialect, schema: &'a TableSchema) -> Self {
        Self { dialect, schema }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table(&self) -> String {
        quote_identifier(&self.schema.table_name)
    }

    /// Resolve a caller-supplied column name against the allow-list.
    fn column(&self, operation: Operation, name: &str) -> DbResult<&'a ColumnInfo> {
        validate_identifier(name)?;
        self.schema
            .column(name)
            .ok_or_else(|| DbError::undefined_column(operation, &self.schema.table_name, name))
    }

    fn primary_key(&self, operation: Operation) -> DbResult<&'a ColumnInfo> {
        self.column(operation, self.schema.primary_key_column())
    }

    /// `ORDER BY` clause on the primary key, when the table has that column.
    fn order_by(&self) -> String {
        let pk = self.schema.primary_key_column();
        if self.schema.has_column(pk) {
            format!(" ORDER BY {}", quote_identifier(pk))
        } else {
            String::new()
        }
    }

    /// `column = value` (or `IS NULL`) predicate with a type-checked value.
    fn equals(
        &self,
        operation: Operation,
        column: &ColumnInfo,
        value: Value,
        params: &mut Params,
    ) -> DbResult<String> {
        let ident = quote_identifier(&column.name);
        let value = coerce_value(operation, column, value)?;
        match value {
            Value::Null => Ok(format!("{} IS NULL", ident)),
            Value::Date(day) if column.category == TypeCategory::Timestamp => {
                Ok(self.whole_days(column, day, day, params))
            }
            value => Ok(format!("{} = {}", ident, params.bind(value, column))),
        }
    }

    /// Timestamps falling on any day from `first` through `last`.
    fn whole_days(
        &self,
        column: &ColumnInfo,
        first: NaiveDate,
        last: NaiveDate,
        params: &mut Params,
    ) -> String {
        let ident = quote_identifier(&column.name);
        let from = format!("{} >= {}", ident, params.bind(Value::Date(first), column));
        match last.succ_opt() {
            Some(next) => format!(
                "{} AND {} < {}",
                from,
                ident,
                params.bind(Value::Date(next), column)
            ),
            None => from,
        }
    }

    /// Result column list.
    ///
    /// PostgreSQL columns without a native row decoding (intervals, network
    /// types, arrays, ...) are selected as text.
    fn projection(&self) -> String {
        let as_text = |c: &ColumnInfo| {
            self.dialect == Dialect::Postgres && !pg_decodes_natively(&c.data_type)
        };
        if !self.schema.columns.iter().any(|c| as_text(c)) {
            return "*".to_string();
        }
        self.schema
            .columns
            .iter()
            .map(|c| {
                let ident = quote_identifier(&c.name);
                if as_text(c) {
                    format!("CAST({} AS TEXT) AS {}", ident, ident)
                } else {
                    ident
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select(&self, operation: Operation, predicate: Option<String>, params: Params) -> Statement {
        let where_clause = predicate
            .map(|p| format!(" WHERE {}", p))
            .unwrap_or_default();
        Statement {
            operation,
            sql: format!(
                "SELECT {} FROM {}{}{}",
                self.projection(),
                self.table(),
                where_clause,
                self.order_by()
            ),
            params: params.values,
        }
    }

    pub fn get_by_id(&self, id: i64) -> DbResult<Statement> {
        let op = Operation::GetById;
        let mut params = Params::new(self.dialect);
        let pk = self.primary_key(op)?;
        let predicate = self.equals(op, pk, Value::Int(id), &mut params)?;
        Ok(self.select(op, Some(predicate), params))
    }

    pub fn get_by_param(&self, column: &str, value: Value) -> DbResult<Statement> {
        let op = Operation::GetByParam;
        let mut params = Params::new(self.dialect);
        let column = self.column(op, column)?;
        let predicate = self.equals(op, column, value, &mut params)?;
        Ok(self.select(op, Some(predicate), params))
    }

    /// Case-insensitive substring match on the column's text form.
    pub fn get_by_pattern(&self, column: &str, substring: &str) -> DbResult<Statement> {
        let op = Operation::GetByPattern;
        let mut params = Params::new(self.dialect);
        let column = self.column(op, column)?;
        let placeholder = params.bind_text(format!("%{}%", escape_like(substring)));
        let predicate = format!(
            "CAST({} AS {}) {} {} ESCAPE '\\'",
            quote_identifier(&column.name),
            self.dialect.text_type(),
            self.dialect.ilike(),
            placeholder
        );
        Ok(self.select(op, Some(predicate), params))
    }

    /// Inclusive range on a numeric or date column.
    pub fn get_by_range(&self, column: &str, low: Value, high: Value) -> DbResult<Statement> {
        let op = Operation::GetByRange;
        let mut params = Params::new(self.dialect);
        let column = self.column(op, column)?;
        let low = coerce_value(op, column, low)?;
        let high = coerce_value(op, column, high)?;

        let numeric = |v: &Value| matches!(v, Value::Int(_) | Value::Float(_));
        let both_numeric = numeric(&low) && numeric(&high);
        let both_dates = matches!((&low, &high), (Value::Date(_), Value::Date(_)));
        if !both_numeric && !both_dates {
            return Err(DbError::invalid_input(format!(
                "Range bounds must both be numbers or both be dates, got {} and {}",
                low.kind(),
                high.kind()
            )));
        }

        if let (Value::Date(first), Value::Date(last), TypeCategory::Timestamp) =
            (&low, &high, column.category)
        {
            let predicate = self.whole_days(column, *first, *last, &mut params);
            return Ok(self.select(op, Some(predicate), params));
        }

        let low = params.bind(low, column);
        let high = params.bind(high, column);
        let predicate = format!(
            "{} BETWEEN {} AND {}",
            quote_identifier(&column.name),
            low,
            high
        );
        Ok(self.select(op, Some(predicate), params))
    }

    pub fn get_all(&self) -> Statement {
        self.select(Operation::GetAll, None, Params::new(self.dialect))
    }

    pub fn insert(&self, fields: &Row) -> DbResult<Statement> {
        let op = Operation::Insert;
        if fields.is_empty() {
            return Ok(Statement {
                operation: op,
                sql: format!(
                    "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                    self.table(),
                    self.projection()
                ),
                params: Vec::new(),
            });
        }

        let mut params = Params::new(self.dialect);
        let mut columns = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len());
        for (name, value) in fields.iter() {
            let column = self.column(op, name)?;
            let value = coerce_value(op, column, value.clone())?;
            columns.push(quote_identifier(&column.name));
            values.push(params.bind(value, column));
        }

        Ok(Statement {
            operation: op,
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                self.table(),
                columns.join(", "),
                values.join(", "),
                self.projection()
            ),
            params: params.values,
        })
    }

    pub fn update(&self, id: i64, fields: &Row) -> DbResult<Statement> {
        let op = Operation::Update;
        if fields.is_empty() {
            return Err(DbError::invalid_input("Update requires at least one field"));
        }

        let mut params = Params::new(self.dialect);
        let mut assignments = Vec::with_capacity(fields.len());
        for (name, value) in fields.iter() {
            let column = self.column(op, name)?;
            let value = coerce_value(op, column, value.clone())?;
            assignments.push(format!(
                "{} = {}",
                quote_identifier(&column.name),
                params.bind(value, column)
            ));
        }
        let pk = self.primary_key(op)?;
        let predicate = self.equals(op, pk, Value::Int(id), &mut params)?;

        Ok(Statement {
            operation: op,
            sql: format!(
                "UPDATE {} SET {} WHERE {} RETURNING {}",
                self.table(),
                assignments.join(", "),
                predicate,
                self.projection()
            ),
            params: params.values,
        })
    }

    fn delete(&self, operation: Operation, predicate: String, params: Params) -> Statement {
        Statement {
            operation,
            sql: format!(
                "DELETE FROM {} WHERE {} RETURNING {}",
                self.table(),
                predicate,
                self.projection()
            ),
            params: params.values,
        }
    }

    pub fn delete_by_id(&self, id: i64) -> DbResult<Statement> {
        let op = Operation::DeleteById;
        let mut params = Params::new(self.dialect);
        let pk = self.primary_key(op)?;
        let predicate = self.equals(op, pk, Value::Int(id), &mut params)?;
        Ok(self.delete(op, predicate, params))
    }

    pub fn delete_by_param(&self, column: &str, value: Value) -> DbResult<Statement> {
        let op = Operation::DeleteByParam;
        let mut params = Params::new(self.dialect);
        let column = self.column(op, column)?;
        let predicate = self.equals(op, column, value, &mut params)?;
        Ok(self.delete(op, predicate, params))
    }

    /// Case-sensitive "contains" across several columns, OR-combined.
    pub fn search_in_table(&self, columns: &[&str], value: &str) -> DbResult<Statement> {
        let op = Operation::SearchInTable;
        if columns.is_empty() {
            return Err(DbError::invalid_input(
                "search_in_table requires at least one column",
            ));
        }

        let mut params = Params::new(self.dialect);
        let placeholder = match self.dialect {
            Dialect::Postgres => params.bind_text(format!("%{}%", escape_like(value))),
            Dialect::Sqlite => params.bind_text(value.to_string()),
        };

        let mut predicates = Vec::with_capacity(columns.len());
        for name in columns {
            let column = quote_identifier(&self.column(op, name)?.name);
            predicates.push(match self.dialect {
                Dialect::Postgres => {
                    format!("CAST({} AS VARCHAR) LIKE {} ESCAPE '\\'", column, placeholder)
                }
                // SQLite's LIKE ignores case, instr does not
                Dialect::Sqlite => format!("instr(CAST({} AS TEXT), {}) > 0", column, placeholder),
            });
        }

        let predicate = if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            format!("({})", predicates.join(" OR "))
        };
        Ok(self.select(op, Some(predicate), params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SQLSTATE_DATATYPE_MISMATCH, SQLSTATE_UNDEFINED_COLUMN};

    fn users(dialect: Dialect) -> TableSchema {
        let (int_type, text_type, date_type) = match dialect {
            Dialect::Postgres => ("int8", "varchar", "date"),
            Dialect::Sqlite => ("INTEGER", "TEXT", "DATE"),
        };
        TableSchema::new("users")
            .with_column(
                ColumnInfo::new("id", int_type, TypeCategory::Integer, false)
                    .with_primary_key(true),
            )
            .with_column(ColumnInfo::new("name", text_type, TypeCategory::Text, true))
            .with_column(ColumnInfo::new("age", int_type, TypeCategory::Integer, true))
            .with_column(ColumnInfo::new("born", date_type, TypeCategory::Date, true))
            .resolve_primary_key()
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_private_2").is_ok());
        assert!(validate_identifier(&"a".repeat(63)).is_ok());

        for bad in [
            "",
            "2users",
            "users; DROP TABLE users",
            "name\"--",
            "user name",
            "naïve",
            &"a".repeat(64),
        ] {
            let err = validate_identifier(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_postgres_get_by_id() {
        let schema = users(Dialect::Postgres);
        let stmt = StatementBuilder::new(Dialect::Postgres, &schema)
            .get_by_id(7)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"id\" = CAST($1 AS BIGINT) ORDER BY \"id\""
        );
        assert_eq!(stmt.params, vec![Value::Int(7)]);
        assert_eq!(stmt.operation, Operation::GetById);
    }

    #[test]
    fn test_sqlite_get_by_param_text() {
        let schema = users(Dialect::Sqlite);
        let stmt = StatementBuilder::new(Dialect::Sqlite, &schema)
            .get_by_param("name", Value::from("John"))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"name\" = CAST(?1 AS VARCHAR) ORDER BY \"id\""
        );
    }

    #[test]
    fn test_get_by_param_null_uses_is_null() {
        let schema = users(Dialect::Postgres);
        let stmt = StatementBuilder::new(Dialect::Postgres, &schema)
            .get_by_param("age", Value::Null)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"age\" IS NULL ORDER BY \"id\""
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let schema = users(Dialect::Sqlite);
        let builder = StatementBuilder::new(Dialect::Sqlite, &schema);
        let err = builder.get_by_param("name", Value::Int(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryFailure);
        assert_eq!(err.sql_state(), Some(SQLSTATE_DATATYPE_MISMATCH));

        let err = builder.get_by_param("age", Value::from("5")).unwrap_err();
        assert_eq!(err.sql_state(), Some(SQLSTATE_DATATYPE_MISMATCH));
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let schema = users(Dialect::Postgres);
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        let err = builder
            .update(1, &Row::new().with("sta", "x"))
            .unwrap_err();
        assert_eq!(err.sql_state(), Some(SQLSTATE_UNDEFINED_COLUMN));

        let err = builder
            .get_by_param("name; DROP TABLE users", Value::from("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_text_is_coerced_to_date() {
        let schema = users(Dialect::Postgres);
        let stmt = StatementBuilder::new(Dialect::Postgres, &schema)
            .get_by_param("born", Value::from("1990-04-12"))
            .unwrap();
        assert!(stmt.sql.contains("\"born\" = CAST($1 AS DATE)"));
        assert_eq!(
            stmt.params,
            vec![Value::Date(NaiveDate::from_ymd_opt(1990, 4, 12).unwrap())]
        );

        let err = StatementBuilder::new(Dialect::Postgres, &schema)
            .get_by_param("born", Value::from("April"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_pattern_statement() {
        let schema = users(Dialect::Postgres);
        let stmt = StatementBuilder::new(Dialect::Postgres, &schema)
            .get_by_pattern("name", "jo_")
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE CAST(\"name\" AS VARCHAR) ILIKE $1 ESCAPE '\\' \
             ORDER BY \"id\""
        );
        assert_eq!(stmt.params, vec![Value::Text("%jo\\_%".to_string())]);

        let schema = users(Dialect::Sqlite);
        let stmt = StatementBuilder::new(Dialect::Sqlite, &schema)
            .get_by_pattern("name", "jo")
            .unwrap();
        assert!(stmt.sql.contains("CAST(\"name\" AS TEXT) LIKE ?1 ESCAPE '\\'"));
    }

    #[test]
    fn test_range_statement() {
        let schema = users(Dialect::Postgres);
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        let stmt = builder
            .get_by_range("age", Value::Int(18), Value::Int(30))
            .unwrap();
        assert!(
            stmt.sql
                .contains("\"age\" BETWEEN CAST($1 AS BIGINT) AND CAST($2 AS BIGINT)")
        );

        let stmt = builder
            .get_by_range("born", Value::from("1990-01-01"), Value::from("1999-12-31"))
            .unwrap();
        assert!(stmt.sql.contains("BETWEEN CAST($1 AS DATE) AND CAST($2 AS DATE)"));

        let err = builder
            .get_by_range("name", Value::from("a"), Value::from("z"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    fn events() -> TableSchema {
        TableSchema::new("events")
            .with_column(
                ColumnInfo::new("id", "int4", TypeCategory::Integer, false).with_primary_key(true),
            )
            .with_column(ColumnInfo::new("at", "timestamp", TypeCategory::Timestamp, false))
            .with_column(ColumnInfo::new("span", "interval", TypeCategory::Other, true))
            .resolve_primary_key()
    }

    #[test]
    fn test_date_bounds_on_timestamp_cover_whole_days() {
        let schema = events();
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

        let err = builder
            .get_by_range("at", Value::from("2024-01-01"), Value::from("2024-01-05"))
            .unwrap_err();
        // Text is not a date bound on a timestamp column
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let stmt = builder
            .get_by_range("at", Value::Date(day(1)), Value::Date(day(5)))
            .unwrap();
        assert!(
            stmt.sql
                .contains("\"at\" >= CAST($1 AS DATE) AND \"at\" < CAST($2 AS DATE)"),
            "{}",
            stmt.sql
        );
        assert_eq!(stmt.params, vec![Value::Date(day(1)), Value::Date(day(6))]);

        let stmt = builder.get_by_param("at", Value::Date(day(5))).unwrap();
        assert_eq!(stmt.params, vec![Value::Date(day(5)), Value::Date(day(6))]);

        let stmt = builder
            .get_by_range("at", Value::Date(day(1)), Value::Date(NaiveDate::MAX))
            .unwrap();
        assert_eq!(stmt.params, vec![Value::Date(day(1))]);
    }

    #[test]
    fn test_postgres_selects_undecodable_columns_as_text() {
        let schema = events();
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        assert_eq!(
            builder.get_all().sql,
            "SELECT \"id\", \"at\", CAST(\"span\" AS TEXT) AS \"span\" FROM \"events\" \
             ORDER BY \"id\""
        );
        assert!(
            builder
                .delete_by_id(1)
                .unwrap()
                .sql
                .ends_with("RETURNING \"id\", \"at\", CAST(\"span\" AS TEXT) AS \"span\"")
        );

        // SQLite values decode by storage class and need no casts
        let stmt = StatementBuilder::new(Dialect::Sqlite, &schema).get_all();
        assert_eq!(stmt.sql, "SELECT * FROM \"events\" ORDER BY \"id\"");
    }

    #[test]
    fn test_insert_statement() {
        let schema = users(Dialect::Postgres);
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        let stmt = builder
            .insert(&Row::new().with("name", "John").with("age", 30).with("born", Value::Null))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"name\", \"age\", \"born\") VALUES \
             (CAST($1 AS VARCHAR), CAST($2 AS BIGINT), CAST($3 AS \"date\")) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 3);

        let stmt = builder.insert(&Row::new()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"users\" DEFAULT VALUES RETURNING *");
    }

    #[test]
    fn test_sqlite_insert_null_is_uncast() {
        let schema = users(Dialect::Sqlite);
        let stmt = StatementBuilder::new(Dialect::Sqlite, &schema)
            .insert(&Row::new().with("name", Value::Null).with("age", 3))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES (?1, CAST(?2 AS INTEGER)) RETURNING *"
        );
    }

    #[test]
    fn test_update_statement() {
        let schema = users(Dialect::Sqlite);
        let builder = StatementBuilder::new(Dialect::Sqlite, &schema);
        let stmt = builder.update(3, &Row::new().with("age", 31)).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"users\" SET \"age\" = CAST(?1 AS INTEGER) \
             WHERE \"id\" = CAST(?2 AS INTEGER) RETURNING *"
        );
        assert_eq!(stmt.params, vec![Value::Int(31), Value::Int(3)]);

        let err = builder.update(3, &Row::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_delete_statements() {
        let schema = users(Dialect::Postgres);
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        assert_eq!(
            builder.delete_by_id(9).unwrap().sql,
            "DELETE FROM \"users\" WHERE \"id\" = CAST($1 AS BIGINT) RETURNING *"
        );
        assert_eq!(
            builder
                .delete_by_param("name", Value::from("x"))
                .unwrap()
                .sql,
            "DELETE FROM \"users\" WHERE \"name\" = CAST($1 AS VARCHAR) RETURNING *"
        );
    }

    #[test]
    fn test_search_statement() {
        let schema = users(Dialect::Sqlite);
        let stmt = StatementBuilder::new(Dialect::Sqlite, &schema)
            .search_in_table(&["name", "age"], "Jo")
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE (instr(CAST(\"name\" AS TEXT), ?1) > 0 \
             OR instr(CAST(\"age\" AS TEXT), ?1) > 0) ORDER BY \"id\""
        );
        assert_eq!(stmt.params, vec![Value::Text("Jo".to_string())]);

        let schema = users(Dialect::Postgres);
        let builder = StatementBuilder::new(Dialect::Postgres, &schema);
        let stmt = builder.search_in_table(&["name"], "J%").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE CAST(\"name\" AS VARCHAR) LIKE $1 ESCAPE '\\' \
             ORDER BY \"id\""
        );
        assert_eq!(stmt.params, vec![Value::Text("%J\\%%".to_string())]);
        assert_eq!(
            builder.search_in_table(&[], "x").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_missing_primary_key_column() {
        let schema = TableSchema::new("logs")
            .with_column(ColumnInfo::new("message", "TEXT", TypeCategory::Text, true))
            .resolve_primary_key();
        let builder = StatementBuilder::new(Dialect::Sqlite, &schema);
        assert_eq!(builder.get_all().sql, "SELECT * FROM \"logs\"");
        let err = builder.get_by_id(1).unwrap_err();
        assert_eq!(err.sql_state(), Some(SQLSTATE_UNDEFINED_COLUMN));
    }
}
