use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::error::{Result, TableError};
use crate::models::{Record, Value};

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Only plain reads are accepted as a record source.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if head == "select" || head == "with" {
        Ok(())
    } else {
        Err(TableError::InvalidConfig(format!(
            "record queries must start with SELECT or WITH, got '{head}'"
        )))
    }
}

pub async fn fetch_records(pool: &PgPool, sql: &str) -> Result<Vec<Record>> {
    ensure_read_only(sql)?;
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    tracing::info!(rows = rows.len(), "loaded records from database");
    rows.iter().map(row_to_record).collect()
}

fn row_to_record(row: &PgRow) -> Result<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.name(), column.type_info().name())?;
        record.set(column.name(), value);
    }
    Ok(record)
}

/// How a Postgres column type is carried into a record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Uuid,
    Unsupported,
}

fn column_kind(type_name: &str) -> ColumnKind {
    match type_name {
        "BOOL" => ColumnKind::Bool,
        "INT2" => ColumnKind::Int2,
        "INT4" => ColumnKind::Int4,
        "INT8" => ColumnKind::Int8,
        "FLOAT4" => ColumnKind::Float4,
        "FLOAT8" => ColumnKind::Float8,
        "NUMERIC" => ColumnKind::Numeric,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => ColumnKind::Text,
        "DATE" => ColumnKind::Date,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "TIMESTAMPTZ" => ColumnKind::TimestampTz,
        "UUID" => ColumnKind::Uuid,
        _ => ColumnKind::Unsupported,
    }
}

/// Scores are usually `numeric(5,2)`; they stay numbers unless out of f64 range.
fn numeric_value(decimal: Decimal) -> Value {
    match decimal.to_f64() {
        Some(number) if number.is_finite() => Value::Number(number),
        _ => Value::Text(decimal.to_string()),
    }
}

fn decode_column(row: &PgRow, index: usize, name: &str, type_name: &str) -> Result<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match column_kind(type_name) {
        ColumnKind::Bool => Value::Bool(row.try_get::<bool, _>(index)?),
        ColumnKind::Int2 => Value::from(row.try_get::<i16, _>(index)? as i64),
        ColumnKind::Int4 => Value::from(row.try_get::<i32, _>(index)? as i64),
        ColumnKind::Int8 => Value::from(row.try_get::<i64, _>(index)?),
        ColumnKind::Float4 => Value::Number(row.try_get::<f32, _>(index)? as f64),
        ColumnKind::Float8 => Value::Number(row.try_get::<f64, _>(index)?),
        ColumnKind::Numeric => numeric_value(row.try_get::<Decimal, _>(index)?),
        ColumnKind::Text => Value::Text(row.try_get::<String, _>(index)?),
        ColumnKind::Date => Value::Text(row.try_get::<NaiveDate, _>(index)?.to_string()),
        ColumnKind::Timestamp => Value::Text(
            row.try_get::<NaiveDateTime, _>(index)?
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
        ),
        ColumnKind::TimestampTz => {
            Value::Text(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339())
        }
        ColumnKind::Uuid => Value::Text(row.try_get::<Uuid, _>(index)?.to_string()),
        ColumnKind::Unsupported => {
            tracing::warn!(
                column = name,
                column_type = type_name,
                "unsupported column type; cast it in the query"
            );
            Value::Null
        }
    };
    Ok(value)
}
