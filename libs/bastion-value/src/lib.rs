//! The logical value type shared by the schema, the query builders and the
//! client. Values carry their semantic type (a `Decimal` is never a plain
//! float, a `BigInt` is never a plain `Int`) so that each dialect can decide how
//! to store and read them.

mod error;
pub mod protocol;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::prelude::*;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

pub use error::ConversionFailure;
pub use protocol::{NullSentinel, TaggedValue};

pub type ValueResult<T> = std::result::Result<T, ConversionFailure>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int(i64),
    BigInt(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Enum(String),
    DateTime(DateTime<FixedOffset>),
    Bytes(Vec<u8>),
    /// A JSON document. `Json(serde_json::Value::Null)` is a stored JSON `null`,
    /// which is different from a database `NULL` (`Value::Null`).
    Json(serde_json::Value),
    List(Vec<Value>),
    /// Key-value pairs in insertion order.
    Object(Vec<(String, Value)>),
}

/// Stringify a date to the following format
/// 1999-05-01T00:00:00.000Z
pub fn stringify_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses the date formats the engine accepts: RFC 3339, a naive
/// `YYYY-MM-DD[T ]HH:MM:SS[.fff]` (interpreted as UTC) and a bare date.
pub fn parse_datetime(input: &str) -> ValueResult<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt);
    }

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
        .ok_or_else(|| ConversionFailure::new(input, "DateTime"))
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_bytes(s: &str) -> ValueResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|_| ConversionFailure::new("base64 encoded bytes", "Bytes"))
}

pub fn parse_decimal(s: &str) -> ValueResult<BigDecimal> {
    BigDecimal::from_str(s.trim())
        .map(|bd| bd.normalized())
        .map_err(|_| ConversionFailure::new(s, "Decimal"))
}

impl Value {
    pub fn object(pairs: Vec<(String, Value)>) -> Value {
        Value::Object(pairs)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) | Value::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) | Value::BigInt(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(o) => Some(o.as_slice()),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Vec<(String, Value)>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Looks up a key of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()
            .and_then(|pairs| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Object(pairs) => pairs.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Sets a key on an object value, keeping its position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Object(pairs) = self {
            let key = key.into();

            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = value,
                None => pairs.push((key, value)),
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match self {
            Value::Object(pairs) => pairs
                .iter()
                .position(|(k, _)| k == key)
                .map(|idx| pairs.remove(idx).1),
            _ => None,
        }
    }

    /// Converts the value to plain JSON, following the output conventions of
    /// the engine (dates as RFC 3339 strings, decimals and bigints as strings,
    /// bytes as base64).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::BigInt(i) => serde_json::Value::String(i.to_string()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => serde_json::Value::String(d.normalized().to_string()),
            Value::String(s) | Value::Enum(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(stringify_datetime(dt)),
            Value::Bytes(b) => serde_json::Value::String(encode_bytes(b)),
            Value::Json(j) => j.clone(),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Object(o) => serde_json::Value::Object(o.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }

    /// Converts untyped JSON to a value without any schema knowledge. Numbers
    /// become `Int` or `Float`, objects and arrays keep their structure.
    pub fn from_untyped_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from_untyped_json).collect()),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from_untyped_json(v))).collect())
            }
        }
    }

    /// Numeric view used for `Decimal` comparisons.
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Decimal(d) => Some(d.clone()),
            Value::Int(i) | Value::BigInt(i) => Some(BigDecimal::from(*i)),
            Value::Float(f) => BigDecimal::from_f64(*f),
            Value::String(s) => parse_decimal(s).ok(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::BigInt(_) => "BigInt",
            Value::Float(_) => "Float",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Enum(_) => "Enum",
            Value::DateTime(_) => "DateTime",
            Value::Bytes(_) => "Bytes",
            Value::Json(_) => "Json",
            Value::List(_) => "List",
            Value::Object(_) => "Object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Enum(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::List(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;

                for v in values {
                    seq.serialize_element(v)?;
                }

                seq.end()
            }
            Value::Object(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;

                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }

                map.end()
            }
            other => other.to_json().serialize(serializer),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<BigDecimal> for Value {
    fn from(d: BigDecimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt.fixed_offset())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn datetime_formats_are_accepted() {
        let expected = "2023-04-05T06:07:08.000Z";

        for input in [
            "2023-04-05T06:07:08Z",
            "2023-04-05T06:07:08.000+00:00",
            "2023-04-05 06:07:08",
            "2023-04-05T06:07:08",
        ] {
            let parsed = parse_datetime(input).unwrap();
            assert_eq!(expected, stringify_datetime(&parsed), "input: {input}");
        }

        let date_only = parse_datetime("2023-04-05").unwrap();
        assert_eq!("2023-04-05T00:00:00.000Z", stringify_datetime(&date_only));
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn object_insert_keeps_position() {
        let mut obj = Value::object(vec![("a".into(), Value::Int(1)), ("b".into(), Value::Int(2))]);
        obj.insert("a", Value::Int(3));
        obj.insert("c", Value::Int(4));

        assert_eq!(
            serde_json::json!({ "a": 3, "b": 2, "c": 4 }).to_string(),
            serde_json::to_string(&obj).unwrap()
        );
    }

    #[test]
    fn json_output_conventions() {
        let value = Value::object(vec![
            ("big".into(), Value::BigInt(9007199254740993)),
            ("dec".into(), Value::Decimal(parse_decimal("1.50").unwrap())),
            ("bytes".into(), Value::Bytes(vec![1, 2, 3])),
            ("json".into(), Value::Json(serde_json::Value::Null)),
            ("db".into(), Value::Null),
        ]);

        assert_eq!(
            serde_json::json!({
                "big": "9007199254740993",
                "dec": "1.5",
                "bytes": "AQID",
                "json": null,
                "db": null,
            }),
            value.to_json()
        );
    }
}
