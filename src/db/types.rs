//! Database-agnostic type mappings.
//!
//! This module maps backend column types onto the crate's [`Value`] model.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. [`TypeCategory`] classifies declared column types into logical categories.
//!    The allow-list uses it to type-check criteria before any SQL runs.
//! 2. Backend-specific decoders turn result columns into [`Value`]s. PostgreSQL
//!    result columns carry exact types; SQLite values are decoded by their runtime
//!    storage class with the table schema as a hint (booleans and dates).

use crate::models::{DATE_FORMAT, DatabaseType, Row, TableSchema, Value};
use chrono::NaiveDate;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Date,
    Timestamp,
    /// uuid, json, bytea, time, arrays, ...
    Other,
}

impl TypeCategory {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }
}

/// Classify a declared database type name into a logical category.
///
/// Length/precision suffixes such as `VARCHAR(50)` are ignored. SQLite types
/// outside the known names fall back to SQLite's own affinity rules.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();
    let base = lower.split('(').next().unwrap_or_default().trim();

    match base {
        "int" | "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "tinyint"
        | "mediumint" | "serial" | "serial2" | "serial4" | "serial8" | "smallserial"
        | "bigserial" => TypeCategory::Integer,
        "real" | "float" | "float4" | "float8" | "double" | "double precision" => {
            TypeCategory::Float
        }
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "character varying" | "char" | "character" | "bpchar" | "name"
        | "citext" | "string" | "nvarchar" | "nchar" | "clob" => TypeCategory::Text,
        "date" => TypeCategory::Date,
        "timestamp" | "timestamptz" | "timestamp without time zone"
        | "timestamp with time zone" | "datetime" => TypeCategory::Timestamp,
        _ if db == DatabaseType::SQLite => sqlite_affinity(base),
        _ => TypeCategory::Other,
    }
}

/// SQLite's column affinity rules for declared types outside the known names.
fn sqlite_affinity(lower: &str) -> TypeCategory {
    if lower.contains("int") {
        TypeCategory::Integer
    } else if lower.contains("char") || lower.contains("clob") || lower.contains("text") {
        TypeCategory::Text
    } else if lower.contains("real") || lower.contains("floa") || lower.contains("doub") {
        TypeCategory::Float
    } else {
        TypeCategory::Other
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(RawDecimal(pg_numeric::decode(value.as_bytes()?)?)),
        }
    }
}

mod pg_numeric {
    //! PostgreSQL binary NUMERIC decoding to its canonical text form.

    use sqlx::error::BoxDynError;

    const SIGN_NEG: u16 = 0x4000;
    const SIGN_NAN: u16 = 0xC000;
    const SIGN_PINF: u16 = 0xD000;
    const SIGN_NINF: u16 = 0xF000;

    fn read_u16(bytes: &[u8], at: usize) -> Result<u16, BoxDynError> {
        bytes
            .get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    }

    /// Header: ndigits, weight, sign, dscale; then base-10000 digits.
    pub fn decode(bytes: &[u8]) -> Result<String, BoxDynError> {
        let ndigits = read_u16(bytes, 0)? as usize;
        let weight = read_u16(bytes, 2)? as i16 as i32;
        let sign = read_u16(bytes, 4)?;
        let dscale = read_u16(bytes, 6)? as usize;

        match sign {
            SIGN_NAN => return Ok("NaN".to_string()),
            SIGN_PINF => return Ok("Infinity".to_string()),
            SIGN_NINF => return Ok("-Infinity".to_string()),
            _ => {}
        }

        let mut digits = Vec::with_capacity(ndigits);
        for i in 0..ndigits {
            digits.push(read_u16(bytes, 8 + i * 2)?);
        }

        let mut int_part = String::new();
        for pos in 0..=weight.max(-1) {
            let group = digits.get(pos as usize).copied().unwrap_or(0);
            if int_part.is_empty() {
                int_part.push_str(&group.to_string());
            } else {
                int_part.push_str(&format!("{:04}", group));
            }
        }
        if int_part.is_empty() {
            int_part.push('0');
        }

        let mut frac_part = String::new();
        if dscale > 0 {
            let mut pos = weight + 1;
            while frac_part.len() < dscale {
                let group = if pos >= 0 {
                    digits.get(pos as usize).copied().unwrap_or(0)
                } else {
                    0
                };
                frac_part.push_str(&format!("{:04}", group));
                pos += 1;
            }
            frac_part.truncate(dscale);
        }

        let mut out = String::with_capacity(int_part.len() + frac_part.len() + 2);
        if sign == SIGN_NEG {
            out.push('-');
        }
        out.push_str(&int_part);
        if !frac_part.is_empty() {
            out.push('.');
            out.push_str(&frac_part);
        }
        Ok(out)
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Render binary column data as text.
///
/// Valid UTF-8 is returned as is; anything else is base64 encoded so the
/// original bytes stay recoverable.
pub fn decode_binary_value(bytes: &[u8]) -> Value {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => Value::Text(s.to_string()),
        Err(_) => Value::Text(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// PostgreSQL types (by `udt_name`) the row decoder reads directly.
///
/// Columns of any other type are selected as text.
const PG_NATIVE_TYPES: &[&str] = &[
    "bool",
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
    "numeric",
    "date",
    "timestamp",
    "timestamptz",
    "time",
    "json",
    "jsonb",
    "uuid",
    "bytea",
    "text",
    "varchar",
    "bpchar",
    "name",
];

/// Whether result columns of this PostgreSQL type decode without a text cast.
pub fn pg_decodes_natively(udt_name: &str) -> bool {
    PG_NATIVE_TYPES.contains(&udt_name.to_lowercase().as_str())
}

/// Trait for converting backend rows into [`Row`]s.
pub trait RowToValues {
    /// Decode every result column, in result order.
    ///
    /// `schema` supplies category hints for backends whose result columns do
    /// not carry declared types. A column that cannot be decoded fails the
    /// whole row; it is never reported as NULL.
    fn to_value_row(&self, schema: &TableSchema) -> Result<Row, sqlx::Error>;
}

impl RowToValues for PgRow {
    fn to_value_row(&self, _schema: &TableSchema) -> Result<Row, sqlx::Error> {
        let mut row = Row::with_capacity(self.columns().len());
        for (idx, column) in self.columns().iter().enumerate() {
            let type_name = column.type_info().name();
            let value = postgres::decode_column(self, idx, type_name)?;
            row.insert(column.name(), value);
        }
        Ok(row)
    }
}

impl RowToValues for SqliteRow {
    fn to_value_row(&self, schema: &TableSchema) -> Result<Row, sqlx::Error> {
        let mut row = Row::with_capacity(self.columns().len());
        for (idx, column) in self.columns().iter().enumerate() {
            let category = match schema.column(column.name()) {
                Some(c) => c.category,
                None => categorize_type(column.type_info().name(), DatabaseType::SQLite),
            };
            let value = sqlite::decode_column(self, idx, category)?;
            row.insert(column.name(), value);
        }
        Ok(row)
    }
}

mod postgres {
    use super::*;

    type Decoded = Result<Value, sqlx::Error>;

    pub fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Decoded {
        match type_name {
            "BOOL" => decode::<bool>(row, idx, Value::Bool),
            "INT2" => decode::<i16>(row, idx, |v| Value::Int(v.into())),
            "INT4" => decode::<i32>(row, idx, |v| Value::Int(v.into())),
            "INT8" => decode::<i64>(row, idx, Value::Int),
            "FLOAT4" => decode::<f32>(row, idx, |v| Value::Float(v.into())),
            "FLOAT8" => decode::<f64>(row, idx, Value::Float),
            "NUMERIC" => decode::<RawDecimal>(row, idx, |v| Value::Text(v.0)),
            "DATE" => decode::<NaiveDate>(row, idx, Value::Date),
            "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, idx, |v| {
                Value::Text(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }),
            "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, idx, |v| {
                Value::Text(v.to_rfc3339())
            }),
            "TIME" => decode::<chrono::NaiveTime>(row, idx, |v| Value::Text(v.to_string())),
            "JSON" | "JSONB" => {
                decode::<serde_json::Value>(row, idx, |v| Value::Text(v.to_string()))
            }
            "UUID" => decode::<uuid::Uuid>(row, idx, |v| Value::Text(v.to_string())),
            "BYTEA" => decode::<Vec<u8>>(row, idx, |v| decode_binary_value(&v)),
            _ => decode::<String>(row, idx, Value::Text),
        }
    }

    fn decode<'r, T>(row: &'r PgRow, idx: usize, wrap: impl FnOnce(T) -> Value) -> Decoded
    where
        T: Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        Ok(row
            .try_get::<Option<T>, _>(idx)?
            .map(wrap)
            .unwrap_or(Value::Null))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let storage_class = raw.type_info().name().to_string();

        let value = match storage_class.as_str() {
            "INTEGER" => {
                let v = row.try_get::<i64, _>(idx)?;
                if category == TypeCategory::Boolean {
                    Value::Bool(v != 0)
                } else {
                    Value::Int(v)
                }
            }
            "REAL" => Value::Float(row.try_get::<f64, _>(idx)?),
            "BLOB" => decode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?),
            _ => {
                let text = row.try_get::<String, _>(idx)?;
                if category != TypeCategory::Date {
                    Value::Text(text)
                } else {
                    match NaiveDate::parse_from_str(&text, DATE_FORMAT) {
                        Ok(date) => Value::Date(date),
                        Err(_) => Value::Text(text),
                    }
                }
            }
        };
        Ok(value)
    }
}
