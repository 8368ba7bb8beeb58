//! Conversions between logical values and what the databases store.

use crate::error::{QueryBuilderError, Result};
use bastion_schema::{FieldDef, FieldKind, ScalarType, Schema};
use bastion_value::{parse_datetime, parse_decimal, stringify_datetime, ConversionFailure, Value};
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{TimeZone, Utc};
use serde_json::Value as JsonValue;

/// How binary values are embedded in JSON documents built by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BytesEncoding {
    Hex,
    Base64,
}

/// The logical type a stored value is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadType {
    Scalar(ScalarType),
    Enum,
    /// Structured JSON, stored like `Json`.
    Document,
}

impl ReadType {
    pub(crate) fn of(schema: &Schema, field: &FieldDef) -> Option<ReadType> {
        match schema.field_kind(field)? {
            FieldKind::Scalar(scalar) => Some(ReadType::Scalar(scalar)),
            FieldKind::Enum(_) => Some(ReadType::Enum),
            FieldKind::TypeDef(_) => Some(ReadType::Document),
            FieldKind::Relation(_) => None,
        }
    }
}

fn mismatch(value: &Value, to: &str) -> QueryBuilderError {
    ConversionFailure::new(format!("{} value `{value}`", value.type_name()), to).into()
}

fn json_mismatch(json: &JsonValue, to: &str) -> QueryBuilderError {
    ConversionFailure::new(format!("JSON `{json}`"), to).into()
}

fn millis_to_datetime(millis: i64) -> Option<Value> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| Value::DateTime(dt.fixed_offset()))
}

/// Reads a column value of `field`, accepting every representation a driver
/// may return for it.
pub(crate) fn read_column(schema: &Schema, field: &FieldDef, value: Value, bytes: BytesEncoding) -> Result<Value> {
    let Some(typ) = ReadType::of(schema, field) else {
        return Ok(value);
    };

    if !field.array {
        return read_typed(value, typ);
    }

    match value {
        Value::Null => Ok(Value::Null),
        Value::List(items) => items
            .into_iter()
            .map(|item| read_typed(item, typ))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Value::String(text) => {
            let json: JsonValue =
                serde_json::from_str(&text).map_err(|_| ConversionFailure::new("list column", "JSON array"))?;

            read_json(json, typ, true, bytes)
        }
        Value::Json(json) => read_json(json, typ, true, bytes),
        other => Err(mismatch(&other, "List")),
    }
}

pub(crate) fn read_typed(value: Value, typ: ReadType) -> Result<Value> {
    match typ {
        ReadType::Scalar(scalar) => read_scalar(value, scalar),
        ReadType::Enum => match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) | Value::Enum(s) => Ok(Value::Enum(s)),
            other => Err(mismatch(&other, "Enum")),
        },
        ReadType::Document => read_scalar(value, ScalarType::Json),
    }
}

pub(crate) fn read_scalar(value: Value, scalar: ScalarType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let converted = match (scalar, value) {
        (ScalarType::Boolean, Value::Boolean(b)) => Value::Boolean(b),
        (ScalarType::Boolean, Value::Int(i)) => Value::Boolean(i != 0),
        (ScalarType::Boolean, Value::String(s)) => match s.as_str() {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => return Err(mismatch(&Value::String(s), "Boolean")),
        },

        (ScalarType::Int, Value::Int(i) | Value::BigInt(i)) => Value::Int(i),
        (ScalarType::Int, Value::Float(f)) if f.fract() == 0.0 => Value::Int(f as i64),
        (ScalarType::Int, Value::Decimal(d)) => d.to_i64().map(Value::Int).ok_or_else(|| mismatch(&Value::Decimal(d), "Int"))?,
        (ScalarType::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| mismatch(&Value::String(s.clone()), "Int"))?,

        (ScalarType::BigInt, Value::Int(i) | Value::BigInt(i)) => Value::BigInt(i),
        (ScalarType::BigInt, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::BigInt)
            .map_err(|_| mismatch(&Value::String(s.clone()), "BigInt"))?,
        (ScalarType::BigInt, Value::Decimal(d)) => d
            .to_i64()
            .map(Value::BigInt)
            .ok_or_else(|| mismatch(&Value::Decimal(d), "BigInt"))?,

        (ScalarType::Float, Value::Float(f)) => Value::Float(f),
        (ScalarType::Float, Value::Int(i) | Value::BigInt(i)) => Value::Float(i as f64),
        (ScalarType::Float, Value::Decimal(d)) => d.to_f64().map(Value::Float).ok_or_else(|| mismatch(&Value::Decimal(d), "Float"))?,
        (ScalarType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch(&Value::String(s.clone()), "Float"))?,

        (ScalarType::Decimal, Value::Decimal(d)) => Value::Decimal(d.normalized()),
        (ScalarType::Decimal, Value::Int(i) | Value::BigInt(i)) => Value::Decimal(BigDecimal::from(i)),
        // The shortest round-trip representation keeps `1.1` from turning into `1.100000000000000088..`.
        (ScalarType::Decimal, Value::Float(f)) => parse_decimal(&f.to_string())
            .ok()
            .or_else(|| BigDecimal::from_f64(f))
            .map(Value::Decimal)
            .ok_or_else(|| mismatch(&Value::Float(f), "Decimal"))?,
        (ScalarType::Decimal, Value::String(s)) => Value::Decimal(parse_decimal(&s)?),

        (ScalarType::String, Value::String(s) | Value::Enum(s)) => Value::String(s),
        (ScalarType::String, Value::Int(i)) => Value::String(i.to_string()),

        (ScalarType::DateTime, Value::DateTime(dt)) => Value::DateTime(dt),
        (ScalarType::DateTime, Value::String(s)) => Value::DateTime(parse_datetime(&s)?),
        (ScalarType::DateTime, Value::Int(millis)) => {
            millis_to_datetime(millis).ok_or_else(|| mismatch(&Value::Int(millis), "DateTime"))?
        }

        (ScalarType::Bytes, Value::Bytes(b)) => Value::Bytes(b),

        (ScalarType::Json, Value::Json(j)) => Value::Json(j),
        (ScalarType::Json, Value::String(s)) => match serde_json::from_str(&s) {
            Ok(json) => Value::Json(json),
            Err(_) => return Err(mismatch(&Value::String(s), "Json")),
        },
        (ScalarType::Json, other @ (Value::List(_) | Value::Object(_))) => Value::Json(other.to_json()),

        (scalar, other) => return Err(mismatch(&other, scalar.as_str())),
    };

    Ok(converted)
}

/// Reads a value embedded in a JSON document produced by the database. List
/// elements of binary fields are always base64, scalar bytes follow
/// `bytes`.
pub(crate) fn read_json(json: JsonValue, typ: ReadType, list: bool, bytes: BytesEncoding) -> Result<Value> {
    if list {
        return match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| read_json(item, typ, false, BytesEncoding::Base64))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            // Some drivers hand nested lists back as JSON text.
            JsonValue::String(text) => match serde_json::from_str::<JsonValue>(&text) {
                Ok(parsed @ JsonValue::Array(_)) => read_json(parsed, typ, true, bytes),
                _ => Err(json_mismatch(&JsonValue::String(text), "List")),
            },
            other => Err(json_mismatch(&other, "List")),
        };
    }

    if json.is_null() {
        return Ok(Value::Null);
    }

    let scalar = match typ {
        ReadType::Enum => {
            return match json {
                JsonValue::String(s) => Ok(Value::Enum(s)),
                other => Err(json_mismatch(&other, "Enum")),
            }
        }
        ReadType::Document => return Ok(Value::Json(json)),
        ReadType::Scalar(scalar) => scalar,
    };

    let value = match (scalar, json) {
        (ScalarType::Json, json) => Value::Json(json),
        (ScalarType::Boolean, JsonValue::Bool(b)) => Value::Boolean(b),
        (ScalarType::Boolean, JsonValue::Number(n)) => Value::Boolean(n.as_i64().unwrap_or_default() != 0),
        (ScalarType::Bytes, JsonValue::String(s)) => Value::Bytes(decode_embedded_bytes(&s, bytes)?),
        (ScalarType::Decimal, JsonValue::Number(n)) => Value::Decimal(parse_decimal(&n.to_string())?),
        (ScalarType::DateTime, JsonValue::Number(n)) => n
            .as_i64()
            .and_then(millis_to_datetime)
            .ok_or_else(|| json_mismatch(&JsonValue::Number(n.clone()), "DateTime"))?,
        (scalar, JsonValue::Number(n)) => {
            let number = match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            };

            read_scalar(number, scalar)?
        }
        (scalar, JsonValue::String(s)) => read_scalar(Value::String(s), scalar)?,
        (scalar, JsonValue::Bool(b)) => read_scalar(Value::Int(i64::from(b)), scalar)?,
        (scalar, other) => return Err(json_mismatch(&other, scalar.as_str())),
    };

    Ok(value)
}

fn decode_embedded_bytes(s: &str, encoding: BytesEncoding) -> Result<Vec<u8>> {
    match encoding {
        BytesEncoding::Hex => hex::decode(s).map_err(|_| ConversionFailure::new("hex encoded bytes", "Bytes").into()),
        BytesEncoding::Base64 => Ok(bastion_value::decode_bytes(s)?),
    }
}

/// Dates are stored in UTC so that their text form sorts chronologically.
pub(crate) fn utc_text(dt: &chrono::DateTime<chrono::FixedOffset>) -> String {
    stringify_datetime(&dt.with_timezone(&Utc).fixed_offset())
}

/// The JSON form of a list element as stored in a JSON array column.
pub(crate) fn list_element_json(value: &Value) -> JsonValue {
    match value {
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Int(i) | Value::BigInt(i) => JsonValue::from(*i),
        Value::DateTime(dt) => JsonValue::String(utc_text(dt)),
        other => other.to_json(),
    }
}

/// A list element as the SQL value `json_each` yields for it.
pub(crate) fn list_element_sql(value: Value) -> Value {
    match list_element_json(&value) {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Int(i64::from(b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => Value::String(s),
        other => Value::Json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sqlite_storage_is_read_back_typed() {
        assert_eq!(Value::Boolean(true), read_scalar(Value::Int(1), ScalarType::Boolean).unwrap());
        assert_eq!(
            Value::Decimal(parse_decimal("1.1").unwrap()),
            read_scalar(Value::Float(1.1), ScalarType::Decimal).unwrap()
        );
        assert_eq!(
            "2024-01-02T03:04:05.006Z",
            match read_scalar(Value::from("2024-01-02T03:04:05.006Z"), ScalarType::DateTime).unwrap() {
                Value::DateTime(dt) => stringify_datetime(&dt),
                other => panic!("unexpected {other:?}"),
            }
        );
        assert_eq!(
            Value::Json(json!({ "a": [1, 2] })),
            read_scalar(Value::from(r#"{"a":[1,2]}"#), ScalarType::Json).unwrap()
        );
    }

    #[test]
    fn embedded_values() {
        let typ = ReadType::Scalar(ScalarType::Bytes);

        assert_eq!(
            Value::Bytes(vec![1, 255]),
            read_json(json!("01FF"), typ, false, BytesEncoding::Hex).unwrap()
        );
        assert_eq!(
            Value::List(vec![Value::Bytes(vec![1, 255])]),
            read_json(json!(["Af8="]), typ, true, BytesEncoding::Hex).unwrap()
        );
        assert_eq!(
            Value::BigInt(5),
            read_json(json!(5), ReadType::Scalar(ScalarType::BigInt), false, BytesEncoding::Hex).unwrap()
        );
    }

    #[test]
    fn list_elements_match_json_each() {
        assert_eq!(Value::Int(1), list_element_sql(Value::Boolean(true)));
        assert_eq!(Value::Int(7), list_element_sql(Value::BigInt(7)));
        assert_eq!(Value::from("a"), list_element_sql(Value::Enum("a".into())));
    }

    #[test]
    fn mismatches_are_errors() {
        assert!(read_scalar(Value::from("nope"), ScalarType::Int).is_err());
        assert!(read_json(json!({}), ReadType::Scalar(ScalarType::Int), false, BytesEncoding::Hex).is_err());
    }
}
