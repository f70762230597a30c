//! Field values and their per-type codecs.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as Json;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Row};

use crate::libs::error::{Error, Result};
use crate::libs::schema::DataType;

/// A single field value of a dynamic record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::DateTime(_) => "datetime",
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Integer(v) => Json::from(*v),
            Value::Float(v) => Json::from(*v),
            Value::Boolean(v) => Json::from(*v),
            Value::Text(v) => Json::from(v.clone()),
            Value::DateTime(v) => Json::from(v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }

    /// Read a JSON value as `data_type`.
    pub fn from_json(json: &Json, data_type: &DataType) -> Result<Value> {
        let value = match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => match data_type {
                DataType::DateTime => Value::DateTime(parse_datetime(s)?),
                _ => Value::Text(s.clone()),
            },
            Json::Array(_) | Json::Object(_) => {
                return Err(Error::validation(format!(
                    "cannot store a JSON {} in a {data_type} field",
                    if json.is_array() { "array" } else { "object" }
                )));
            }
        };
        coerce(value, data_type)
    }
}

/// Check `value` against `data_type`, widening integers into float fields.
/// `Null` always passes; nullability is checked by the model.
pub fn coerce(value: Value, data_type: &DataType) -> Result<Value> {
    match (data_type, value) {
        (_, Value::Null) => Ok(Value::Null),
        (DataType::Integer, v @ Value::Integer(_)) => Ok(v),
        (DataType::Float, v @ Value::Float(_)) => Ok(v),
        (DataType::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
        (DataType::Boolean, v @ Value::Boolean(_)) => Ok(v),
        (DataType::Character { max_length }, Value::Text(s)) => {
            if s.chars().count() > *max_length as usize {
                return Err(Error::validation(format!(
                    "value is longer than {max_length} characters"
                )));
            }
            Ok(Value::Text(s))
        }
        (DataType::Text, v @ Value::Text(_)) => Ok(v),
        (DataType::DateTime, v @ Value::DateTime(_)) => Ok(v),
        (DataType::DateTime, Value::Text(s)) => Ok(Value::DateTime(parse_datetime(&s)?)),
        (data_type, other) => Err(Error::validation(format!(
            "{} value does not fit a {data_type} field",
            other.kind()
        ))),
    }
}

/// Accepts RFC 3339 and PostgreSQL's `timestamptz::text` output.
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::validation(format!("invalid datetime {raw:?}: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Bind `value` as a parameter for a column of `data_type`. Nulls are bound
/// with the column's type so PostgreSQL accepts them.
pub(crate) fn bind_value<'q>(query: AnyQuery<'q>, value: Value, data_type: &DataType) -> AnyQuery<'q> {
    match value {
        Value::Integer(v) => query.bind(v),
        Value::Float(v) => query.bind(v),
        Value::Boolean(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::DateTime(v) => query.bind(format_datetime(&v)),
        Value::Null => match data_type {
            DataType::Integer => query.bind(None::<i64>),
            DataType::Float => query.bind(None::<f64>),
            DataType::Boolean => query.bind(None::<bool>),
            DataType::Character { .. } | DataType::Text | DataType::DateTime => {
                query.bind(None::<String>)
            }
        },
    }
}

/// Decode `column` of `row` as `data_type`.
pub(crate) fn decode_value(row: &AnyRow, column: &str, data_type: &DataType) -> Result<Value> {
    let value = match data_type {
        DataType::Integer => row
            .try_get::<Option<i64>, _>(column)?
            .map_or(Value::Null, Value::Integer),
        DataType::Float => match row.try_get::<Option<f64>, _>(column) {
            Ok(v) => v.map_or(Value::Null, Value::Float),
            // SQLite hands back whole-number REALs stored through integer affinity
            Err(_) => row
                .try_get::<Option<i64>, _>(column)?
                .map_or(Value::Null, |i| Value::Float(i as f64)),
        },
        DataType::Boolean => match row.try_get::<Option<bool>, _>(column) {
            Ok(v) => v.map_or(Value::Null, Value::Boolean),
            Err(_) => row
                .try_get::<Option<i64>, _>(column)?
                .map_or(Value::Null, |i| Value::Boolean(i != 0)),
        },
        DataType::Character { .. } | DataType::Text => row
            .try_get::<Option<String>, _>(column)?
            .map_or(Value::Null, Value::Text),
        DataType::DateTime => match row.try_get::<Option<String>, _>(column)? {
            Some(raw) => Value::DateTime(parse_datetime(&raw)?),
            None => Value::Null,
        },
    };
    Ok(value)
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
