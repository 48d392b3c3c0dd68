use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::domain::Row;
use crate::errors::QueryExecutionError;

/// A positional (`$1`, `$2`, ...) bind value.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamptz(DateTime<FixedOffset>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Text(String),
    Json(Value),
}

impl SqlParam {
    /// Models hand back parameters as strings; coerce them to the narrowest scalar that parses.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Int(integer),
                None => number.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            Value::String(text) => Self::from_text(text),
            Value::Array(_) | Value::Object(_) => Self::Json(value.clone()),
        }
    }

    pub fn from_text(text: &str) -> Self {
        if let Ok(integer) = text.parse::<i64>() {
            return Self::Int(integer);
        }
        if let Ok(float) = text.parse::<f64>() {
            if float.is_finite() {
                return Self::Float(float);
            }
        }
        if text.contains('T') {
            if text.ends_with('Z') || text.contains('+') || has_negative_offset(text) {
                if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
                    return Self::Timestamptz(timestamp);
                }
            }
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
                return Self::Timestamp(timestamp);
            }
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M") {
                return Self::Timestamp(timestamp);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Self::Date(date);
        }
        Self::Text(text.to_string())
    }
}

fn has_negative_offset(text: &str) -> bool {
    text.split_once('T').map(|(_, time)| time.contains('-')).unwrap_or(false)
}

/// Read-only executor of parameterized SELECT statements.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[SqlParam])
        -> Result<Vec<Row>, QueryExecutionError>;
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Timelike};
    use serde_json::json;

    use super::SqlParam;

    #[test]
    fn string_parameters_coerce_in_priority_order() {
        assert_eq!(SqlParam::infer(&json!("10")), SqlParam::Int(10));
        assert_eq!(SqlParam::infer(&json!("99.95")), SqlParam::Float(99.95));
        assert_eq!(
            SqlParam::infer(&json!("2025-11-01")),
            SqlParam::Date(NaiveDate::from_ymd_opt(2025, 11, 1).expect("date"))
        );
        assert_eq!(SqlParam::infer(&json!("Europe")), SqlParam::Text("Europe".to_owned()));
        assert_eq!(SqlParam::infer(&json!("NaN")), SqlParam::Text("NaN".to_owned()));
    }

    #[test]
    fn timestamps_keep_offset_when_present() {
        match SqlParam::infer(&json!("2025-10-01T00:00:00Z")) {
            SqlParam::Timestamptz(value) => assert_eq!(value.offset().local_minus_utc(), 0),
            other => panic!("expected timestamptz, got {other:?}"),
        }
        match SqlParam::infer(&json!("2025-10-01T08:30:00-05:00")) {
            SqlParam::Timestamptz(value) => assert_eq!(value.offset().local_minus_utc(), -5 * 3600),
            other => panic!("expected timestamptz, got {other:?}"),
        }
        match SqlParam::infer(&json!("2025-10-01T08:30:00")) {
            SqlParam::Timestamp(value) => assert_eq!(value.hour(), 8),
            other => panic!("expected naive timestamp, got {other:?}"),
        }
    }

    #[test]
    fn non_string_values_map_directly() {
        assert_eq!(SqlParam::infer(&json!(3)), SqlParam::Int(3));
        assert_eq!(SqlParam::infer(&json!(true)), SqlParam::Bool(true));
        assert_eq!(SqlParam::infer(&json!(null)), SqlParam::Null);
        assert_eq!(SqlParam::infer(&json!(["a"])), SqlParam::Json(json!(["a"])));
    }
}
