//! Command-line front end.
//!
//! Each subcommand maps to one table operation. Results are printed to stdout
//! as JSON; failures are reported on stderr as a JSON object carrying the
//! error kind, message, SQLSTATE and suggestion.

use crate::config::{Config, ConfigError};
use crate::db::{ConnectionManager, Table};
use crate::error::{DbError, ErrorKind};
use crate::models::{Row, Value};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "table-accessor")]
#[command(about = "Typed single-table access for PostgreSQL and SQLite")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

/// Literal values are inferred: `null`, `true`/`false`, integers, floats and
/// `YYYY-MM-DD` dates are typed, anything else is text. Prefix with `text:` to
/// force text.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the introspected columns and primary key
    Describe,

    /// Fetch the row with the given primary key
    Get {
        #[arg(allow_hyphen_values = true)]
        id: i64,
    },

    /// Rows where COLUMN equals VALUE
    Find {
        column: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Rows where COLUMN contains SUBSTRING, ignoring case
    Pattern {
        column: String,
        #[arg(allow_hyphen_values = true)]
        substring: String,
    },

    /// Rows with LOW <= COLUMN <= HIGH
    Range {
        column: String,
        #[arg(allow_hyphen_values = true)]
        low: String,
        #[arg(allow_hyphen_values = true)]
        high: String,
    },

    /// Every row, ordered by primary key
    All,

    /// Insert a row from column=value pairs
    Insert {
        #[arg(value_parser = parse_field, value_name = "COLUMN=VALUE", conflicts_with = "json")]
        fields: Vec<(String, Value)>,
        /// Fields as a JSON object instead, e.g. '{"name": "Ann", "age": 41}'
        #[arg(long, value_parser = parse_json_fields, value_name = "OBJECT")]
        json: Option<Row>,
    },

    /// Update the row with the given primary key
    Update {
        #[arg(allow_hyphen_values = true)]
        id: i64,
        #[arg(
            value_parser = parse_field,
            value_name = "COLUMN=VALUE",
            required_unless_present = "json",
            conflicts_with = "json"
        )]
        fields: Vec<(String, Value)>,
        /// Fields as a JSON object instead of column=value pairs
        #[arg(long, value_parser = parse_json_fields, value_name = "OBJECT")]
        json: Option<Row>,
    },

    /// Delete the row with the given primary key
    Delete {
        #[arg(allow_hyphen_values = true)]
        id: i64,
    },

    /// Delete every row where COLUMN equals VALUE
    DeleteWhere {
        column: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Rows where any of the given columns contains VALUE (case-sensitive)
    Search {
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[arg(short, long = "column", required = true, num_args = 1..)]
        columns: Vec<String>,
    },
}

/// Parse a `column=value` argument.
pub fn parse_field(arg: &str) -> Result<(String, Value), String> {
    let (column, literal) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{}'", arg))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in '{}'", arg));
    }
    Ok((column.to_string(), Value::infer(literal)))
}

/// Parse a `--json` object of column values.
///
/// JSON scalars keep their own types, so `"30"` stays text where `30` is an integer.
pub fn parse_json_fields(arg: &str) -> Result<Row, String> {
    let json: JsonValue =
        serde_json::from_str(arg).map_err(|e| format!("invalid JSON: {}", e))?;
    let object = json
        .as_object()
        .ok_or_else(|| "expected a JSON object of column values".to_string())?;
    Row::from_json_object(object).map_err(|e| e.to_string())
}

fn fields_to_row(fields: &[(String, Value)], json: &Option<Row>) -> Row {
    if let Some(row) = json {
        return row.clone();
    }
    fields
        .iter()
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::InvalidInput,
            Self::Db(e) => e.kind(),
            Self::Output(_) => ErrorKind::Internal,
        }
    }
}

/// JSON shape of an error written to stderr.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&CliError> for ErrorReport {
    fn from(err: &CliError) -> Self {
        let (sql_state, suggestion) = match err {
            CliError::Db(e) => (
                e.sql_state().map(str::to_string),
                e.suggestion().map(str::to_string),
            ),
            CliError::Config(_) => (
                None,
                Some("Run with --help to see the connection settings".to_string()),
            ),
            CliError::Output(_) => (None, None),
        };
        Self {
            error: err.kind(),
            message: err.to_string(),
            sql_state,
            suggestion,
        }
    }
}

/// Connect, run the command against the configured table, and disconnect.
///
/// The session is closed whether or not the command succeeded.
pub async fn run(cli: &Cli) -> Result<JsonValue, CliError> {
    let table_name = cli.config.table_name()?;
    let manager = ConnectionManager::new(cli.config.connection_config()?);

    let info = manager.connect().await?;
    debug!(session_id = info.session_id, table = %table_name, "Session ready");

    let result = async {
        let table = manager.table(table_name).await?;
        execute(&table, &cli.command).await
    }
    .await;

    if let Err(e) = manager.disconnect().await {
        warn!(error = %e, "Disconnect failed");
    }
    result
}

/// Run one command on an accessor and render its result as JSON.
pub async fn execute(table: &Table, command: &Command) -> Result<JsonValue, CliError> {
    let output = match command {
        Command::Describe => serde_json::to_value(table.schema())?,
        Command::Get { id } => serde_json::to_value(table.get_by_id(*id).await?)?,
        Command::Find { column, value } => {
            serde_json::to_value(table.get_by_param(column, Value::infer(value)).await?)?
        }
        Command::Pattern { column, substring } => {
            serde_json::to_value(table.get_by_pattern(column, substring).await?)?
        }
        Command::Range { column, low, high } => serde_json::to_value(
            table
                .get_by_range(column, Value::infer(low), Value::infer(high))
                .await?,
        )?,
        Command::All => serde_json::to_value(table.get_all().await?)?,
        Command::Insert { fields, json } => {
            serde_json::to_value(table.insert(&fields_to_row(fields, json)).await?)?
        }
        Command::Update { id, fields, json } => {
            let fields = fields_to_row(fields, json);
            serde_json::to_value(table.update(*id, &fields).await?)?
        }
        Command::Delete { id } => serde_json::to_value(table.delete_by_id(*id).await?)?,
        Command::DeleteWhere { column, value } => {
            serde_json::to_value(table.delete_by_param(column, Value::infer(value)).await?)?
        }
        Command::Search { value, columns } => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            serde_json::to_value(table.search_in_table(&columns, value).await?)?
        }
    };
    Ok(output)
}
