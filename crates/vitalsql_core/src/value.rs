use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{VitalSqlError, VitalSqlResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Date,
    Double,
    Float,
    GeoLocation,
    Integer,
    Long,
    Other,
    String,
    Truth,
    Uri,
}

impl ValueKind {
    /// Column read order used when reconstructing a value from an EAV row.
    pub const ALL: [ValueKind; 11] = [
        ValueKind::Boolean,
        ValueKind::Date,
        ValueKind::Double,
        ValueKind::Float,
        ValueKind::GeoLocation,
        ValueKind::Integer,
        ValueKind::Long,
        ValueKind::Other,
        ValueKind::String,
        ValueKind::Truth,
        ValueKind::Uri,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Double => "double",
            ValueKind::Float => "float",
            ValueKind::GeoLocation => "geolocation",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Other => "other",
            ValueKind::String => "string",
            ValueKind::Truth => "truth",
            ValueKind::Uri => "uri",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::Date
                | ValueKind::Double
                | ValueKind::Float
                | ValueKind::Integer
                | ValueKind::Long
        )
    }
}

impl ValueKind {
    fn order_rank(self) -> u8 {
        match self {
            ValueKind::Boolean => 0,
            ValueKind::Date => 1,
            ValueKind::Double | ValueKind::Float | ValueKind::Integer | ValueKind::Long => 2,
            ValueKind::GeoLocation => 3,
            ValueKind::Other => 4,
            ValueKind::String => 5,
            ValueKind::Truth => 6,
            ValueKind::Uri => 7,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-valued logical truth.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i16)]
pub enum Truth {
    No = 0,
    Yes = 1,
    Unknown = 2,
    Mu = 3,
}

impl Truth {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Truth::No),
            1 => Some(Truth::Yes),
            2 => Some(Truth::Unknown),
            3 => Some(Truth::Mu),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Well-known-text point, longitude first.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }

    pub fn parse_wkt(raw: &str) -> VitalSqlResult<Self> {
        let inner = raw
            .trim()
            .strip_prefix("POINT(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| VitalSqlError::integrity(format!("invalid geolocation: {raw}")))?;
        let mut parts = inner.split_whitespace();
        let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(VitalSqlError::integrity(format!(
                "invalid geolocation: {raw}"
            )));
        };
        let parse = |part: &str| {
            part.parse::<f64>()
                .map_err(|err| VitalSqlError::integrity(format!("invalid geolocation: {err}")))
        };
        Ok(Self::new(parse(lat)?, parse(lon)?))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    /// Milliseconds since the unix epoch.
    Date(i64),
    Double(f64),
    Float(f32),
    GeoLocation(GeoLocation),
    Integer(i32),
    Long(i64),
    Other(String),
    String(String),
    Truth(Truth),
    Uri(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Date(_) => ValueKind::Date,
            Value::Double(_) => ValueKind::Double,
            Value::Float(_) => ValueKind::Float,
            Value::GeoLocation(_) => ValueKind::GeoLocation,
            Value::Integer(_) => ValueKind::Integer,
            Value::Long(_) => ValueKind::Long,
            Value::Other(_) => ValueKind::Other,
            Value::String(_) => ValueKind::String,
            Value::Truth(_) => ValueKind::Truth,
            Value::Uri(_) => ValueKind::Uri,
        }
    }

    /// Numeric view used by aggregation. Dates aggregate as epoch millis.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Date(value) | Value::Long(value) => Some(*value as f64),
            Value::Double(value) => Some(*value),
            Value::Float(value) => Some(f64::from(*value)),
            Value::Integer(value) => Some(f64::from(*value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Other(value) | Value::String(value) | Value::Uri(value) => Some(value),
            _ => None,
        }
    }

    /// Total order over values: kinds are ranked first, with the four number kinds sharing one
    /// rank and comparing numerically. Everything else compares within its kind.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        let rank = self.kind().order_rank().cmp(&other.kind().order_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Boolean(left), Value::Boolean(right)) => left.cmp(right),
            (Value::Date(left), Value::Date(right)) => left.cmp(right),
            (Value::GeoLocation(left), Value::GeoLocation(right)) => left
                .latitude
                .total_cmp(&right.latitude)
                .then(left.longitude.total_cmp(&right.longitude)),
            (Value::Truth(left), Value::Truth(right)) => left.cmp(right),
            (Value::Other(left), Value::Other(right))
            | (Value::String(left), Value::String(right))
            | (Value::Uri(left), Value::Uri(right)) => left.cmp(right),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(left), Some(right)) => left.total_cmp(&right),
                _ => self.kind().cmp(&other.kind()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Truth> for Value {
    fn from(value: Truth) -> Self {
        Value::Truth(value)
    }
}

/// Wrapper giving [`Value`] set semantics through [`Value::total_cmp`].
#[derive(Clone, Debug)]
pub struct OrderedValue(pub Value);

impl PartialEq for OrderedValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedValue {}

impl PartialOrd for OrderedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Single(Value),
    Multi(Vec<Value>),
}

impl PropertyValue {
    pub fn values(&self) -> &[Value] {
        match self {
            PropertyValue::Single(value) => std::slice::from_ref(value),
            PropertyValue::Multi(values) => values,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, PropertyValue::Multi(_))
    }

    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geolocation_wkt_is_longitude_first() {
        let point = GeoLocation::new(40.5, -73.25);
        assert_eq!(point.to_wkt(), "POINT(-73.25 40.5)");
        let parsed = GeoLocation::parse_wkt(&point.to_wkt()).expect("parse");
        assert_eq!(parsed, point);
        assert!(GeoLocation::parse_wkt("POINT(1)").is_err());
        assert!(GeoLocation::parse_wkt("LINESTRING(1 2)").is_err());
    }

    #[test]
    fn truth_codes_roundtrip() {
        for truth in [Truth::No, Truth::Yes, Truth::Unknown, Truth::Mu] {
            assert_eq!(Truth::from_i16(truth.as_i16()), Some(truth));
        }
        assert_eq!(Truth::Yes.as_i16(), 1);
        assert_eq!(Truth::from_i16(9), None);
    }

    #[test]
    fn numeric_values_compare_across_kinds() {
        assert_eq!(
            Value::Integer(3).total_cmp(&Value::Double(2.5)),
            Ordering::Greater
        );
        assert_eq!(
            Value::Long(7).total_cmp(&Value::Float(7.0)),
            Ordering::Equal
        );
        assert_eq!(
            Value::from("b").total_cmp(&Value::from("a")),
            Ordering::Greater
        );
        assert_eq!(
            Value::Boolean(true).total_cmp(&Value::from("a")),
            Ordering::Less
        );
    }

    #[test]
    fn mixed_kinds_sort_transitively() {
        let place = Value::GeoLocation(GeoLocation {
            latitude: 1.0,
            longitude: 2.0,
        });
        let mut values = vec![
            Value::Integer(1),
            place.clone(),
            Value::Double(5.0),
            Value::from("s"),
            Value::Long(3),
            Value::Date(10),
            Value::Boolean(false),
        ];
        values.sort_by(Value::total_cmp);
        assert_eq!(
            values,
            vec![
                Value::Boolean(false),
                Value::Date(10),
                Value::Integer(1),
                Value::Long(3),
                Value::Double(5.0),
                place.clone(),
                Value::from("s"),
            ]
        );
        for left in &values {
            for middle in &values {
                for right in &values {
                    if left.total_cmp(middle).is_le() && middle.total_cmp(right).is_le() {
                        assert!(left.total_cmp(right).is_le());
                    }
                }
            }
        }
    }

    #[test]
    fn ordered_values_deduplicate_in_sets() {
        let mut set = std::collections::BTreeSet::new();
        set.insert(OrderedValue(Value::from("x")));
        set.insert(OrderedValue(Value::from("x")));
        set.insert(OrderedValue(Value::Integer(1)));
        assert_eq!(set.len(), 2);
    }
}
