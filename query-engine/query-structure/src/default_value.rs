use crate::coerce::{coerce_field, CoercionError};
use bastion_schema::{DefaultValue, FieldDef, ScalarType, Schema};
use bastion_value::Value;
use chrono::Utc;

const DEFAULT_NANOID_LENGTH: usize = 21;

/// Produces the default of `field` for a new row. Returns `Ok(None)` when the
/// database generates the value (`autoincrement()`) or there is no default.
pub fn generate_default(schema: &Schema, field: &FieldDef) -> Result<Option<Value>, CoercionError> {
    let default = match &field.default {
        Some(default) => default,
        None if field.updated_at => return Ok(Some(now(field))),
        None => return Ok(None),
    };

    match default {
        DefaultValue::Literal(json) => coerce_field(schema, field, json).map(Some),
        DefaultValue::Call { call, args } => {
            let value = match call.as_str() {
                "autoincrement" | "dbgenerated" => return Ok(None),
                "now" => now(field),
                "uuid" => match args.first().and_then(serde_json::Value::as_u64) {
                    Some(7) => Value::String(uuid::Uuid::now_v7().to_string()),
                    _ => Value::String(uuid::Uuid::new_v4().to_string()),
                },
                "cuid" => Value::String(generate_cuid()),
                "nanoid" => {
                    let length = args
                        .first()
                        .and_then(serde_json::Value::as_u64)
                        .map(|l| l as usize)
                        .unwrap_or(DEFAULT_NANOID_LENGTH);

                    Value::String(nanoid::nanoid!(length))
                }
                "ulid" => Value::String(ulid::Ulid::new().to_string()),
                other => {
                    return Err(CoercionError {
                        expected: "a known default function".into(),
                        received: format!("{other}()"),
                    })
                }
            };

            Ok(Some(value))
        }
    }
}

#[allow(deprecated)]
fn generate_cuid() -> String {
    cuid::cuid().unwrap_or_else(|_| uuid::Uuid::new_v4().simple().to_string())
}

fn now(field: &FieldDef) -> Value {
    let now = Utc::now();

    match field.scalar_type() {
        Some(ScalarType::String) => Value::String(bastion_value::stringify_datetime(&now.fixed_offset())),
        _ => Value::DateTime(now.fixed_offset()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_schema::{ModelDef, Provider};

    fn single_field(field: FieldDef) -> (Schema, FieldDef) {
        let schema = Schema::builder(Provider::Sqlite)
            .model(
                ModelDef::new("M")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(field.clone()),
            )
            .build()
            .unwrap();

        (schema, field)
    }

    #[test]
    fn autoincrement_is_left_to_the_database() {
        let (schema, field) = single_field(FieldDef::new("n", "Int").default_call("autoincrement"));
        assert_eq!(None, generate_default(&schema, &field).unwrap());
    }

    #[test]
    fn generated_identifiers() {
        let (schema, field) = single_field(FieldDef::new("s", "String").default_call("nanoid"));

        match generate_default(&schema, &field).unwrap() {
            Some(Value::String(s)) => assert_eq!(DEFAULT_NANOID_LENGTH, s.len()),
            other => panic!("unexpected {other:?}"),
        }

        let (schema, field) = single_field(FieldDef::new("s", "String").default_call("uuid"));
        let generated = generate_default(&schema, &field).unwrap();
        assert!(matches!(generated, Some(Value::String(s)) if s.len() == 36));
    }

    #[test]
    fn literal_defaults_are_typed() {
        let (schema, field) = single_field(FieldDef::new("d", "Decimal").default_literal(serde_json::json!("1.5")));

        assert!(matches!(generate_default(&schema, &field).unwrap(), Some(Value::Decimal(_))));
    }
}
