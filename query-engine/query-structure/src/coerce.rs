//! Conversion of JSON argument values into typed [`Value`]s.

use bastion_schema::{FieldDef, FieldKind, ScalarType, Schema};
use bastion_value::{
    parse_datetime, parse_decimal,
    protocol::{decode_tagged, TaggedValue},
    NullSentinel, Value,
};
use bigdecimal::{BigDecimal, FromPrimitive};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("expected {expected}, received {received}")]
pub struct CoercionError {
    pub expected: String,
    pub received: String,
}

impl CoercionError {
    fn new(expected: impl Into<String>, received: &JsonValue) -> Self {
        Self {
            expected: expected.into(),
            received: describe(received),
        }
    }
}

fn describe(json: &JsonValue) -> String {
    match json {
        JsonValue::Null => "null".into(),
        JsonValue::Bool(b) => format!("boolean {b}"),
        JsonValue::Number(n) => format!("number {n}"),
        JsonValue::String(s) => format!("string \"{s}\""),
        JsonValue::Array(_) => "array".into(),
        JsonValue::Object(obj) => match obj.get("$type").and_then(JsonValue::as_str) {
            Some(tag) => format!("{tag} value"),
            None => "object".into(),
        },
    }
}

/// Coerces a value written to (or compared with) `field`. List fields take
/// arrays of their element type. `null` is returned as is, callers decide
/// whether it is allowed.
pub fn coerce_field(schema: &Schema, field: &FieldDef, json: &JsonValue) -> Result<Value, CoercionError> {
    if field.array {
        return match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| coerce_element(schema, field, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(CoercionError::new(format!("a list of {}", field.type_name), other)),
        };
    }

    coerce_element(schema, field, json)
}

/// Coerces a single element of `field`'s type, ignoring the list flag.
pub fn coerce_element(schema: &Schema, field: &FieldDef, json: &JsonValue) -> Result<Value, CoercionError> {
    match schema.field_kind(field) {
        Some(FieldKind::Scalar(scalar)) => coerce_scalar(scalar, json),
        Some(FieldKind::Enum(name)) => coerce_enum(schema, name, json),
        Some(FieldKind::TypeDef(name)) => coerce_type_def(schema, name, json),
        Some(FieldKind::Relation(_)) | None => Err(CoercionError::new("a scalar value", json)),
    }
}

pub fn coerce_scalar(scalar: ScalarType, json: &JsonValue) -> Result<Value, CoercionError> {
    let tagged = decode_tagged(json).map_err(|_| CoercionError::new(scalar.as_str(), json))?;

    if let Some(tagged) = tagged {
        return coerce_tagged(scalar, tagged, json);
    }

    let fail = || CoercionError::new(scalar.as_str(), json);

    if json.is_null() {
        return Ok(Value::Null);
    }

    match scalar {
        ScalarType::String => json.as_str().map(Value::from).ok_or_else(fail),
        ScalarType::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(fail),
        ScalarType::Int => match json {
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::Int(f as i64))
                    .ok_or_else(fail),
            },
            _ => Err(fail()),
        },
        ScalarType::BigInt => match json {
            JsonValue::Number(n) => n.as_i64().map(Value::BigInt).ok_or_else(fail),
            JsonValue::String(s) => s.trim().parse::<i64>().map(Value::BigInt).map_err(|_| fail()),
            _ => Err(fail()),
        },
        ScalarType::Float => match json {
            JsonValue::Number(n) => n.as_f64().map(Value::Float).ok_or_else(fail),
            _ => Err(fail()),
        },
        ScalarType::Decimal => match json {
            JsonValue::Number(n) => decimal_from_number(n).map(Value::Decimal).ok_or_else(fail),
            JsonValue::String(s) => parse_decimal(s).map(Value::Decimal).map_err(|_| fail()),
            _ => Err(fail()),
        },
        ScalarType::DateTime => match json {
            JsonValue::String(s) => parse_datetime(s).map(Value::DateTime).map_err(|_| fail()),
            _ => Err(fail()),
        },
        ScalarType::Bytes => match json {
            JsonValue::String(s) => bastion_value::decode_bytes(s).map(Value::Bytes).map_err(|_| fail()),
            JsonValue::Array(items) => items
                .iter()
                .map(|i| i.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(Value::Bytes)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        ScalarType::Json => Ok(Value::Json(json.clone())),
    }
}

fn coerce_tagged(scalar: ScalarType, tagged: TaggedValue, json: &JsonValue) -> Result<Value, CoercionError> {
    let fail = || CoercionError::new(scalar.as_str(), json);

    let value = match (scalar, tagged) {
        (ScalarType::DateTime, TaggedValue::DateTime(dt)) => Value::DateTime(dt),
        (ScalarType::BigInt, TaggedValue::BigInt(i)) => Value::BigInt(i),
        (ScalarType::Int, TaggedValue::BigInt(i)) => Value::Int(i),
        (ScalarType::Decimal, TaggedValue::Decimal(d)) => Value::Decimal(d),
        (ScalarType::Float, TaggedValue::Decimal(d)) => {
            Value::Float(d.to_string().parse::<f64>().map_err(|_| fail())?)
        }
        (ScalarType::Bytes, TaggedValue::Bytes(b)) => Value::Bytes(b),
        (ScalarType::Json, TaggedValue::Json(j)) => Value::Json(j),
        (ScalarType::Json, TaggedValue::Null(NullSentinel::JsonNull)) => Value::Json(JsonValue::Null),
        (_, TaggedValue::Null(NullSentinel::DbNull)) => Value::Null,
        _ => return Err(fail()),
    };

    Ok(value)
}

fn decimal_from_number(n: &serde_json::Number) -> Option<BigDecimal> {
    match n.as_i64() {
        Some(i) => Some(BigDecimal::from(i)),
        None => parse_decimal(&n.to_string()).ok().or_else(|| n.as_f64().and_then(BigDecimal::from_f64)),
    }
}

fn coerce_enum(schema: &Schema, name: &str, json: &JsonValue) -> Result<Value, CoercionError> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    let def = schema
        .enum_def(name)
        .ok_or_else(|| CoercionError::new(format!("enum {name}"), json))?;

    match json.as_str() {
        Some(s) if def.values.iter().any(|v| v == s) => Ok(Value::Enum(s.to_owned())),
        _ => Err(CoercionError::new(
            format!("one of {} ({})", name, def.values.join(", ")),
            json,
        )),
    }
}

/// Typed JSON fields are stored as JSON after checking the declared shape.
fn coerce_type_def(schema: &Schema, name: &str, json: &JsonValue) -> Result<Value, CoercionError> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    let def = schema
        .type_def(name)
        .ok_or_else(|| CoercionError::new(format!("type {name}"), json))?;

    let obj = json
        .as_object()
        .ok_or_else(|| CoercionError::new(format!("an object of type {name}"), json))?;

    for key in obj.keys() {
        if !def.fields.contains_key(key) {
            return Err(CoercionError::new(
                format!("fields of type {name}"),
                &JsonValue::String(key.clone()),
            ));
        }
    }

    for field in def.fields.values() {
        match obj.get(&field.name) {
            Some(value) if !value.is_null() => {
                coerce_field(schema, field, value)?;
            }
            _ if field.is_required() => {
                return Err(CoercionError::new(
                    format!("field `{}` of type {name}", field.name),
                    &JsonValue::Null,
                ))
            }
            _ => (),
        }
    }

    Ok(Value::Json(json.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn numeric_strings_become_decimals_and_bigints() {
        assert_eq!(
            Value::Decimal(parse_decimal("1.50").unwrap()),
            coerce_scalar(ScalarType::Decimal, &json!("1.50")).unwrap()
        );
        assert_eq!(
            Value::BigInt(9007199254740993),
            coerce_scalar(ScalarType::BigInt, &json!("9007199254740993")).unwrap()
        );
    }

    #[test]
    fn tagged_values() {
        let dt = coerce_scalar(
            ScalarType::DateTime,
            &json!({ "$type": "DateTime", "value": "2024-01-02T03:04:05.006Z" }),
        )
        .unwrap();

        match dt {
            Value::DateTime(dt) => assert_eq!("2024-01-02T03:04:05.006Z", bastion_value::stringify_datetime(&dt)),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            Value::Json(JsonValue::Null),
            coerce_scalar(ScalarType::Json, &json!({ "$type": "JsonNull" })).unwrap()
        );
        assert_eq!(
            Value::Null,
            coerce_scalar(ScalarType::Json, &json!({ "$type": "DbNull" })).unwrap()
        );
    }

    #[test]
    fn mismatches_are_reported() {
        let err = coerce_scalar(ScalarType::Int, &json!("12")).unwrap_err();

        assert_eq!("Int", err.expected);
        assert_eq!("string \"12\"", err.received);
        assert!(coerce_scalar(ScalarType::Int, &json!(1.5)).is_err());
    }
}
