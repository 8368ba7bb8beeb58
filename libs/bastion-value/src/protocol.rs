//! The tagged JSON argument protocol.
//!
//! Values that plain JSON cannot express are wrapped in an object carrying a
//! `$type` discriminator and a `value` payload:
//!
//! ```json
//! { "$type": "DateTime", "value": "2024-01-01T00:00:00.000Z" }
//! { "$type": "DbNull" }
//! { "$type": "FieldRef", "value": { "_ref": "y" } }
//! ```

use crate::{decode_bytes, parse_datetime, parse_decimal, ConversionFailure, ValueResult};
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value as JsonValue};

pub const TYPE_KEY: &str = "$type";
pub const VALUE_KEY: &str = "value";

/// The three null sentinels of JSON fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullSentinel {
    /// The database `NULL`.
    DbNull,
    /// A JSON document that is exactly `null`.
    JsonNull,
    /// Either of the two above. Only meaningful in filters.
    AnyNull,
}

impl NullSentinel {
    pub fn as_str(self) -> &'static str {
        match self {
            NullSentinel::DbNull => "DbNull",
            NullSentinel::JsonNull => "JsonNull",
            NullSentinel::AnyNull => "AnyNull",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    DateTime(DateTime<FixedOffset>),
    BigInt(i64),
    Decimal(BigDecimal),
    Bytes(Vec<u8>),
    Json(JsonValue),
    Null(NullSentinel),
    /// A reference to another field of the same model, used in filters.
    FieldRef(String),
    /// An explicitly absent value. Keys carrying it are removed before
    /// validation.
    Undefined,
}

/// Returns the tag of a `$type` wrapper, if the object is one.
pub fn type_tag(obj: &Map<String, JsonValue>) -> Option<&str> {
    obj.get(TYPE_KEY).and_then(JsonValue::as_str)
}

/// Decodes a tagged wrapper. Returns `Ok(None)` when the JSON value is not
/// tagged at all.
pub fn decode_tagged(json: &JsonValue) -> ValueResult<Option<TaggedValue>> {
    let obj = match json {
        JsonValue::Object(obj) => obj,
        _ => return Ok(None),
    };

    let tag = match type_tag(obj) {
        Some(tag) => tag,
        None => return Ok(None),
    };

    let payload = obj.get(VALUE_KEY);
    let payload_str = || {
        payload
            .and_then(JsonValue::as_str)
            .ok_or_else(|| ConversionFailure::new(format!("{tag} payload"), "string"))
    };

    let tagged = match tag {
        "DateTime" => TaggedValue::DateTime(parse_datetime(payload_str()?)?),
        "BigInt" => {
            let raw = match payload {
                Some(JsonValue::Number(n)) => n.as_i64(),
                Some(JsonValue::String(s)) => s.parse::<i64>().ok(),
                _ => None,
            };

            TaggedValue::BigInt(raw.ok_or_else(|| ConversionFailure::new("BigInt payload", "i64"))?)
        }
        "Decimal" => match payload {
            Some(JsonValue::Number(n)) => TaggedValue::Decimal(parse_decimal(&n.to_string())?),
            _ => TaggedValue::Decimal(parse_decimal(payload_str()?)?),
        },
        "Bytes" => TaggedValue::Bytes(decode_bytes(payload_str()?)?),
        "Json" => match payload {
            // A string payload is a serialized document.
            Some(JsonValue::String(s)) => TaggedValue::Json(
                serde_json::from_str(s).map_err(|_| ConversionFailure::new("Json payload", "JSON document"))?,
            ),
            Some(other) => TaggedValue::Json(other.clone()),
            None => TaggedValue::Json(JsonValue::Null),
        },
        "DbNull" => TaggedValue::Null(NullSentinel::DbNull),
        "JsonNull" => TaggedValue::Null(NullSentinel::JsonNull),
        "AnyNull" => TaggedValue::Null(NullSentinel::AnyNull),
        "FieldRef" => {
            let name = payload
                .and_then(|p| p.get("_ref"))
                .and_then(JsonValue::as_str)
                .ok_or_else(|| ConversionFailure::new("FieldRef payload", "field reference"))?;

            TaggedValue::FieldRef(name.to_owned())
        }
        "Undefined" => TaggedValue::Undefined,
        other => return Err(ConversionFailure::new(other, "tagged value")),
    };

    Ok(Some(tagged))
}

pub fn is_undefined(json: &JsonValue) -> bool {
    matches!(json, JsonValue::Object(obj) if type_tag(obj) == Some("Undefined"))
}

/// Recursively removes object keys whose value is the `Undefined` marker.
/// Key order of the remaining entries is preserved.
pub fn strip_undefined(json: JsonValue) -> JsonValue {
    match json {
        JsonValue::Object(obj) if type_tag(&obj).is_some() => JsonValue::Object(obj),
        JsonValue::Object(obj) => JsonValue::Object(
            obj.into_iter()
                .filter(|(_, v)| !is_undefined(v))
                .map(|(k, v)| (k, strip_undefined(v)))
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .filter(|v| !is_undefined(v))
                .map(strip_undefined)
                .collect(),
        ),
        other => other,
    }
}

/// Builds a tagged wrapper. Mostly useful for callers constructing arguments
/// programmatically.
pub fn tagged(tag: &str, value: JsonValue) -> JsonValue {
    let mut obj = Map::new();
    obj.insert(TYPE_KEY.to_owned(), JsonValue::String(tag.to_owned()));
    obj.insert(VALUE_KEY.to_owned(), value);
    JsonValue::Object(obj)
}

pub fn null_sentinel(sentinel: NullSentinel) -> JsonValue {
    let mut obj = Map::new();
    obj.insert(TYPE_KEY.to_owned(), JsonValue::String(sentinel.as_str().to_owned()));
    JsonValue::Object(obj)
}

pub fn field_ref(field: &str) -> JsonValue {
    tagged("FieldRef", serde_json::json!({ "_ref": field }))
}

pub fn undefined() -> JsonValue {
    serde_json::json!({ "$type": "Undefined" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn plain_json_is_not_tagged() {
        assert_eq!(None, decode_tagged(&json!({ "value": 1 })).unwrap());
        assert_eq!(None, decode_tagged(&json!("2024-01-01")).unwrap());
    }

    #[test]
    fn decodes_sentinels_and_refs() {
        assert_eq!(
            Some(TaggedValue::Null(NullSentinel::JsonNull)),
            decode_tagged(&null_sentinel(NullSentinel::JsonNull)).unwrap()
        );

        assert_eq!(
            Some(TaggedValue::FieldRef("y".into())),
            decode_tagged(&field_ref("y")).unwrap()
        );

        assert_eq!(
            Some(TaggedValue::BigInt(9007199254740993)),
            decode_tagged(&tagged("BigInt", json!("9007199254740993"))).unwrap()
        );
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(decode_tagged(&json!({ "$type": "Nope" })).is_err());
    }

    #[test]
    fn strip_undefined_preserves_order() {
        let input = json!({ "b": 1, "a": undefined(), "c": { "d": undefined(), "e": 2 } });
        let stripped = strip_undefined(input);

        assert_eq!(r#"{"b":1,"c":{"e":2}}"#, stripped.to_string());
    }
}
