use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};
use tracing::debug;
use uuid::Uuid;

use quarry_core::datastore::{QueryExecutor, SqlParam};
use quarry_core::domain::Row;
use quarry_core::errors::QueryExecutionError;

use crate::DbPool;

/// Executes validated SELECT statements against the shared pool.
#[derive(Clone)]
pub struct PgQueryExecutor {
    pool: DbPool,
}

impl PgQueryExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<Row>, QueryExecutionError> {
        let started = Instant::now();
        let query = params.iter().fold(sqlx::query(sql), bind_param);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|error| QueryExecutionError(error.to_string()))?;

        let decoded = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        debug!(
            event_name = "system.datastore.query",
            params = params.len(),
            rows = decoded.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "executed parameterized select"
        );
        Ok(decoded)
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(value) => query.bind(*value),
        SqlParam::Int(value) => query.bind(*value),
        SqlParam::Float(value) => query.bind(*value),
        SqlParam::Timestamptz(value) => query.bind(*value),
        SqlParam::Timestamp(value) => query.bind(*value),
        SqlParam::Date(value) => query.bind(*value),
        SqlParam::Text(value) => query.bind(value.clone()),
        SqlParam::Json(value) => query.bind(sqlx::types::Json(value.clone())),
    }
}

fn decode_row(row: &PgRow) -> Result<Row, QueryExecutionError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let (index, type_name) = (column.ordinal(), column.type_info().name());
        let value = match decode_column(row, index, type_name) {
            Ok(value) => value,
            Err(error) => {
                debug!(
                    event_name = "system.datastore.decode_fallback",
                    column = column.name(),
                    type_name,
                    error = %error,
                    "column type has no typed decoder"
                );
                decode_raw(row, index, type_name)
                    .map_err(|error| QueryExecutionError(error.to_string()))?
            }
        };
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(|value| float(f64::from(value))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(float),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(index)?.map(decimal),
        "UUID" => row.try_get::<Option<Uuid>, _>(index)?.map(|value| Value::String(value.to_string())),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.map(date),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|value| Value::String(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|value| Value::String(value.to_rfc3339())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|value| Value::String(value.format("%H:%M:%S%.f").to_string())),
        "INTERVAL" => row.try_get::<Option<PgInterval>, _>(index)?.map(|value| {
            Value::String(iso_duration(value.months, value.days, value.microseconds))
        }),
        "\"CHAR\"" => row
            .try_get::<Option<i8>, _>(index)?
            .map(|value| Value::String(char::from(value.to_ne_bytes()[0]).to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        "BOOL[]" => array(row.try_get::<Option<Vec<bool>>, _>(index)?, Value::Bool),
        "INT2[]" => array(row.try_get::<Option<Vec<i16>>, _>(index)?, Value::from),
        "INT4[]" => array(row.try_get::<Option<Vec<i32>>, _>(index)?, Value::from),
        "INT8[]" => array(row.try_get::<Option<Vec<i64>>, _>(index)?, Value::from),
        "FLOAT8[]" => array(row.try_get::<Option<Vec<f64>>, _>(index)?, float),
        "NUMERIC[]" => array(row.try_get::<Option<Vec<Decimal>>, _>(index)?, decimal),
        "DATE[]" => array(row.try_get::<Option<Vec<NaiveDate>>, _>(index)?, date),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            array(row.try_get::<Option<Vec<String>>, _>(index)?, Value::String)
        }
        _ => row.try_get::<Option<String>, _>(index)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Last resort for types without a typed decoder, such as enums or arrays holding NULLs.
/// Printable payloads (enum labels arrive as text) are kept; anything else becomes `<TYPE>`.
fn decode_raw(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let printable = raw
        .as_str()
        .ok()
        .filter(|text| !text.is_empty() && !text.chars().any(char::is_control));
    Ok(Value::String(match printable {
        Some(text) => text.to_string(),
        None => format!("<{type_name}>"),
    }))
}

fn array<T>(values: Option<Vec<T>>, convert: impl Fn(T) -> Value) -> Option<Value> {
    values.map(|values| Value::Array(values.into_iter().map(convert).collect()))
}

fn decimal(value: Decimal) -> Value {
    value.to_f64().map(float).unwrap_or_else(|| Value::String(value.to_string()))
}

fn date(value: NaiveDate) -> Value {
    Value::String(value.format("%Y-%m-%d").to_string())
}

/// ISO 8601 duration, e.g. `P1M2DT3H4M5.5S`; a zero interval is `PT0S`.
fn iso_duration(months: i32, days: i32, microseconds: i64) -> String {
    let mut out = String::from("P");
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if days != 0 {
        out.push_str(&format!("{days}D"));
    }
    if microseconds != 0 || out.len() == 1 {
        out.push('T');
        let hours = microseconds / 3_600_000_000;
        let minutes = (microseconds % 3_600_000_000) / 60_000_000;
        let micros = microseconds % 60_000_000;
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if micros != 0 || (hours == 0 && minutes == 0) {
            let seconds = format!("{:.6}", micros as f64 / 1_000_000.0);
            out.push_str(seconds.trim_end_matches('0').trim_end_matches('.'));
            out.push('S');
        }
    }
    out
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::iso_duration;

    #[test]
    fn intervals_render_as_iso_durations() {
        assert_eq!(iso_duration(0, 0, 0), "PT0S");
        assert_eq!(iso_duration(0, 3, 0), "P3D");
        assert_eq!(iso_duration(1, 2, 3_723_500_000), "P1M2DT1H2M3.5S");
        assert_eq!(iso_duration(0, 0, 7_200_000_000), "PT2H");
        assert_eq!(iso_duration(0, 0, -90_000_000), "PT-1M-30S");
    }
}
