use sea_orm::{Iden, QueryResult};
use sea_orm::sea_query::Value as SeaValue;

use crate::db::SegmentColumn;
use vitalsql_core::{GeoLocation, Truth, Value, ValueKind, VitalSqlError, VitalSqlResult};

/// Stored in the regular column when the real value lives in `value_full_text`.
pub const OVERFLOW_MARKER: &str = ":::TEXT:::";
/// Longest string or opaque value kept in its own column.
pub const OVERFLOW_THRESHOLD: usize = 5000;

#[derive(Clone, Debug, PartialEq)]
pub struct EncodedValue {
    pub column: SegmentColumn,
    pub stored: Value,
    pub full_text: Option<String>,
}

pub fn encode(value: &Value, multi: bool) -> EncodedValue {
    let column = SegmentColumn::value_column(value.kind(), multi);
    match value {
        Value::String(text) if text.chars().count() > OVERFLOW_THRESHOLD => EncodedValue {
            column,
            stored: Value::String(OVERFLOW_MARKER.to_string()),
            full_text: Some(text.clone()),
        },
        Value::Other(text) if text.chars().count() > OVERFLOW_THRESHOLD => EncodedValue {
            column,
            stored: Value::Other(OVERFLOW_MARKER.to_string()),
            full_text: Some(text.clone()),
        },
        _ => EncodedValue {
            column,
            stored: value.clone(),
            full_text: None,
        },
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowMode {
    /// The full-text column was fetched with the row.
    Inline,
    /// Overflowed values are collected and fetched in a later batch.
    Deferred,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Ready(Value),
    Deferred(ValueKind),
}

pub fn is_overflow(stored: &Value) -> bool {
    matches!(stored, Value::String(text) | Value::Other(text) if text == OVERFLOW_MARKER)
}

pub fn decode(stored: &Value, full_text: Option<&str>, mode: OverflowMode) -> VitalSqlResult<Decoded> {
    if !is_overflow(stored) {
        return Ok(Decoded::Ready(stored.clone()));
    }
    let kind = stored.kind();
    match (mode, full_text) {
        (OverflowMode::Deferred, _) => Ok(Decoded::Deferred(kind)),
        (OverflowMode::Inline, Some(text)) => Ok(Decoded::Ready(with_kind(kind, text))),
        (OverflowMode::Inline, None) => Err(VitalSqlError::integrity(
            "overflow marker found without full text value",
        )),
    }
}

/// Rebuilds a text value of the given kind from its full-text column.
pub fn with_kind(kind: ValueKind, text: &str) -> Value {
    match kind {
        ValueKind::Other => Value::Other(text.to_string()),
        _ => Value::String(text.to_string()),
    }
}

pub fn to_sea(value: &Value) -> SeaValue {
    match value {
        Value::Boolean(value) => (*value).into(),
        Value::Date(value) | Value::Long(value) => (*value).into(),
        Value::Double(value) => (*value).into(),
        Value::Float(value) => (*value).into(),
        Value::GeoLocation(value) => value.to_wkt().into(),
        Value::Integer(value) => (*value).into(),
        Value::Other(value) | Value::String(value) | Value::Uri(value) => value.clone().into(),
        Value::Truth(value) => value.as_i16().into(),
    }
}

pub fn read_value(kind: ValueKind, row: &QueryResult, column: &str) -> VitalSqlResult<Option<Value>> {
    Ok(match kind {
        ValueKind::Boolean => row.try_get::<Option<bool>>("", column)?.map(Value::Boolean),
        ValueKind::Date => row.try_get::<Option<i64>>("", column)?.map(Value::Date),
        ValueKind::Double => row.try_get::<Option<f64>>("", column)?.map(Value::Double),
        ValueKind::Float => row.try_get::<Option<f32>>("", column)?.map(Value::Float),
        ValueKind::GeoLocation => match row.try_get::<Option<String>>("", column)? {
            Some(raw) => Some(Value::GeoLocation(GeoLocation::parse_wkt(&raw)?)),
            None => None,
        },
        ValueKind::Integer => row.try_get::<Option<i32>>("", column)?.map(Value::Integer),
        ValueKind::Long => row.try_get::<Option<i64>>("", column)?.map(Value::Long),
        ValueKind::Other => row.try_get::<Option<String>>("", column)?.map(Value::Other),
        ValueKind::String => row.try_get::<Option<String>>("", column)?.map(Value::String),
        ValueKind::Truth => match row.try_get::<Option<i16>>("", column)? {
            Some(code) => Some(Value::Truth(Truth::from_i16(code).ok_or_else(|| {
                VitalSqlError::integrity(format!("invalid truth code: {code}"))
            })?)),
            None => None,
        },
        ValueKind::Uri => row.try_get::<Option<String>>("", column)?.map(Value::Uri),
    })
}

/// First populated value column of a row, in kind order with single before multi.
pub fn read_row_value(row: &QueryResult) -> VitalSqlResult<(Value, bool)> {
    for kind in ValueKind::ALL {
        for multi in [false, true] {
            let column = SegmentColumn::value_column(kind, multi).to_string();
            if let Some(value) = read_value(kind, row, &column)? {
                return Ok((value, multi));
            }
        }
    }
    Err(VitalSqlError::integrity("row has no populated value column"))
}
