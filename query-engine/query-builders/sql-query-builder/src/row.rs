//! Reading result rows back into record values.

use crate::{
    aggregate::AggregateColumn,
    context::Context,
    error::{QueryBuilderError, Result},
    COUNT_KEY, DELEGATE_KEY_PREFIX,
};
use bastion_query_structure::{AggregationFunction, FieldSelection, QueryArguments, RelationSelection};
use bastion_schema::{ModelDef, ScalarType};
use bastion_sql::connector::{ResultRow, ResultSet};
use bastion_value::Value;
use bigdecimal::BigDecimal;
use itertools::Itertools;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

fn malformed(what: impl Into<String>) -> QueryBuilderError {
    QueryBuilderError::MalformedResult(what.into())
}

/// Reads the rows of a [`crate::select_records`] query into records, one
/// object per row with the selected fields in selection order.
///
/// Relation columns are parsed from the JSON the database built, nested
/// relations get their in-memory post-processing, and the columns of
/// delegate sub-models are merged into the record of the concrete type.
pub fn read_records(
    ctx: &Context<'_>,
    model: &ModelDef,
    rows: ResultSet,
    selection: &FieldSelection,
) -> Result<Vec<Value>> {
    rows.into_iter()
        .map(|row| read_record(ctx, model, row, selection))
        .collect()
}

fn read_record(ctx: &Context<'_>, model: &ModelDef, row: ResultRow, selection: &FieldSelection) -> Result<Value> {
    let mut columns: HashMap<String, Value> = row.into_pairs().into_iter().collect();
    let mut record = Value::Object(Vec::with_capacity(selection.scalars.len() + selection.relations.len()));

    for name in &selection.scalars {
        let field = model.field(name)?;
        let value = columns.remove(name).unwrap_or(Value::Null);

        record.insert(name.as_str(), ctx.dialect.read_column(ctx.schema, field, value)?);
    }

    for relation in &selection.relations {
        let json = column_json(columns.remove(&relation.field).unwrap_or(Value::Null))?;
        record.insert(relation.field.as_str(), read_relation(ctx, model, relation, json)?);
    }

    if !selection.counts.is_empty() {
        let json = column_json(columns.remove(COUNT_KEY).unwrap_or(Value::Null))?;
        record.insert(COUNT_KEY, read_counts(json)?);
    }

    if model.is_delegate {
        let mut subs = Vec::new();

        for sub in ctx.schema.sub_models(model) {
            let key = format!("{DELEGATE_KEY_PREFIX}{}", sub.name);
            let json = column_json(columns.remove(&key).unwrap_or(Value::Null))?;
            subs.push((sub, json));
        }

        merge_sub_model(ctx, model, &mut record, subs)?;
    }

    Ok(record)
}

/// A JSON result column, which some drivers hand back as text.
fn column_json(value: Value) -> Result<JsonValue> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Json(json) => Ok(json),
        Value::String(text) => serde_json::from_str(&text).map_err(|e| malformed(format!("invalid JSON column: {e}"))),
        Value::Bytes(bytes) => serde_json::from_slice(&bytes).map_err(|e| malformed(format!("invalid JSON column: {e}"))),
        other => Err(malformed(format!("expected a JSON column, got {}", other.type_name()))),
    }
}

fn read_relation(ctx: &Context<'_>, model: &ModelDef, relation: &RelationSelection, json: JsonValue) -> Result<Value> {
    let rel = ctx.relation(model, &relation.field)?;

    // Some engines double-encode nested documents.
    let json = match json {
        JsonValue::String(text) => {
            serde_json::from_str(&text).map_err(|e| malformed(format!("invalid relation JSON: {e}")))?
        }
        other => other,
    };

    if !rel.is_to_many() {
        return match json {
            JsonValue::Null => Ok(Value::Null),
            object => read_embedded(ctx, rel.target, &relation.selection, object),
        };
    }

    let items = match json {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items,
        other => return Err(malformed(format!("expected a JSON array for `{}`, got {other}", relation.field))),
    };

    let records = items
        .into_iter()
        .map(|item| read_embedded(ctx, rel.target, &relation.selection, item))
        .collect::<Result<Vec<_>>>()?;

    // Nested distinct always runs here.
    Ok(Value::List(apply_in_memory(records, &relation.args, false)))
}

/// Reads one record from a JSON object built by the database.
fn read_embedded(ctx: &Context<'_>, model: &ModelDef, selection: &FieldSelection, json: JsonValue) -> Result<Value> {
    let mut object = match json {
        JsonValue::Object(object) => object,
        JsonValue::String(text) => match serde_json::from_str(&text) {
            Ok(JsonValue::Object(object)) => object,
            _ => return Err(malformed(format!("expected a `{}` object", model.name))),
        },
        other => return Err(malformed(format!("expected a `{}` object, got {other}", model.name))),
    };

    let mut record = Value::Object(Vec::with_capacity(selection.scalars.len()));

    for name in &selection.scalars {
        let field = model.field(name)?;
        let json = object.remove(name).unwrap_or(JsonValue::Null);

        record.insert(name.as_str(), ctx.dialect.read_json_value(ctx.schema, field, json)?);
    }

    for relation in &selection.relations {
        let json = object.remove(&relation.field).unwrap_or(JsonValue::Null);
        record.insert(relation.field.as_str(), read_relation(ctx, model, relation, json)?);
    }

    if !selection.counts.is_empty() {
        record.insert(COUNT_KEY, read_counts(object.remove(COUNT_KEY).unwrap_or(JsonValue::Null))?);
    }

    if model.is_delegate {
        let subs = ctx
            .schema
            .sub_models(model)
            .map(|sub| {
                let key = format!("{DELEGATE_KEY_PREFIX}{}", sub.name);
                (sub, object.remove(&key).unwrap_or(JsonValue::Null))
            })
            .collect();

        merge_sub_model(ctx, model, &mut record, subs)?;
    }

    Ok(record)
}

fn read_counts(json: JsonValue) -> Result<Value> {
    let json = match json {
        JsonValue::String(text) => serde_json::from_str(&text).map_err(|e| malformed(format!("invalid count JSON: {e}")))?,
        other => other,
    };

    match json {
        JsonValue::Object(counts) => counts
            .into_iter()
            .map(|(field, count)| {
                let count = count
                    .as_i64()
                    .or_else(|| count.as_str().and_then(|s| s.parse().ok()))
                    .ok_or_else(|| malformed(format!("invalid count for `{field}`")))?;

                Ok((field, Value::Int(count)))
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Object),
        JsonValue::Null => Ok(Value::Object(Vec::new())),
        other => Err(malformed(format!("expected relation counts, got {other}"))),
    }
}

/// Adds the fields of the concrete sub-model named by the discriminator.
fn merge_sub_model(
    ctx: &Context<'_>,
    model: &ModelDef,
    record: &mut Value,
    subs: Vec<(&ModelDef, JsonValue)>,
) -> Result<()> {
    let concrete = model
        .discriminator()
        .and_then(|d| record.get(&d.name))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    let Some(concrete) = concrete else {
        return Ok(());
    };

    for (sub, json) in subs {
        if sub.name != concrete {
            continue;
        }

        let json = match json {
            JsonValue::String(text) => serde_json::from_str(&text).map_err(|e| malformed(format!("invalid JSON: {e}")))?,
            other => other,
        };

        let JsonValue::Object(fields) = json else {
            continue;
        };

        for (name, json) in fields {
            if record.get(&name).is_some() {
                continue;
            }

            let field = sub.field(&name)?;
            record.insert(name.as_str(), ctx.dialect.read_json_value(ctx.schema, field, json)?);
        }
    }

    Ok(())
}

/// Reads a row of plain columns, matched to fields by column name. Columns
/// that belong to no field are kept untyped.
pub fn read_scalar_row(ctx: &Context<'_>, model: &ModelDef, row: ResultRow) -> Result<Value> {
    let mut record = Value::Object(Vec::with_capacity(row.columns().len()));

    for (column, value) in row.into_pairs() {
        match model.find_field(&column).or_else(|| model.find_field_by_column(&column)) {
            Some(field) if !field.is_relation() => {
                record.insert(field.name.as_str(), ctx.dialect.read_column(ctx.schema, field, value)?);
            }
            _ => record.insert(column, value),
        }
    }

    Ok(record)
}

/// Reads one row of an aggregation into
/// `{ <by fields>, _count: { _all, f }, _sum: { f }, .. }`.
pub fn read_aggregate_row(
    ctx: &Context<'_>,
    model: &ModelDef,
    by: &[String],
    columns: &[AggregateColumn],
    row: ResultRow,
) -> Result<Value> {
    let mut values: HashMap<String, Value> = row.into_pairs().into_iter().collect();
    let mut record = Value::Object(Vec::new());

    for name in by {
        let field = model.field(name)?;
        let value = values.remove(name).unwrap_or(Value::Null);

        record.insert(name.as_str(), ctx.dialect.read_column(ctx.schema, field, value)?);
    }

    for (function, group) in &columns.iter().chunk_by(|c| c.function) {
        let mut object = Value::Object(Vec::new());

        for column in group {
            let value = values.remove(&column.name()).unwrap_or(Value::Null);
            let key = column.field.as_deref().unwrap_or("_all");

            object.insert(key, read_aggregate_value(ctx, model, column, value)?);
        }

        match record.get_mut(function.key()) {
            // Selections of the same function that are not adjacent.
            Some(Value::Object(existing)) => existing.extend(object.into_object().unwrap_or_default()),
            _ => record.insert(function.key(), object),
        }
    }

    Ok(record)
}

fn read_aggregate_value(ctx: &Context<'_>, model: &ModelDef, column: &AggregateColumn, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(match column.function {
            AggregationFunction::Count => Value::Int(0),
            _ => Value::Null,
        });
    }

    let field = match &column.field {
        Some(name) => Some(model.field(name)?),
        None => None,
    };

    match (column.function, field) {
        (AggregationFunction::Count, _) | (_, None) => value
            .as_i64()
            .or_else(|| value.to_decimal().and_then(|d| bigdecimal::ToPrimitive::to_i64(&d)))
            .map(Value::Int)
            .ok_or_else(|| malformed(format!("invalid count `{value}`"))),
        (AggregationFunction::Avg, Some(field)) if field.scalar_type() == Some(ScalarType::Decimal) => value
            .to_decimal()
            .map(|d: BigDecimal| Value::Decimal(d.normalized()))
            .ok_or_else(|| malformed(format!("invalid average `{value}`"))),
        (AggregationFunction::Avg, Some(_)) => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(Value::Float)
            .ok_or_else(|| malformed(format!("invalid average `{value}`"))),
        (_, Some(field)) => ctx.dialect.read_column(ctx.schema, field, value),
    }
}

/// Post-processing of read records that the query could not do:
/// de-duplication on the `distinct` fields where the database has no
/// `DISTINCT ON` (with the pagination that had to wait for it), and restoring
/// the requested order after a negative `take`.
pub fn apply_in_memory(records: Vec<Value>, args: &QueryArguments, supports_distinct_on: bool) -> Vec<Value> {
    let mut records = records;

    if args.requires_inmemory_distinct(supports_distinct_on) {
        let distinct_key = |record: &Value| -> String {
            args.distinct
                .iter()
                .map(|field| record.get(field).map(Value::to_json).unwrap_or(JsonValue::Null).to_string())
                .join("\u{1f}")
        };

        let skip = args.skip.unwrap_or(0).max(0) as usize;
        let deduplicated = records.into_iter().unique_by(distinct_key).skip(skip);

        records = match args.take_abs() {
            Some(take) => deduplicated.take(take as usize).collect(),
            None => deduplicated.collect(),
        };
    }

    if args.needs_reversed_order() {
        records.reverse();
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect_for, ComputedFields};
    use bastion_query_structure::{RelationCount, Filter};
    use bastion_schema::{FieldDef, RelationInfo, Schema};
    use bastion_sql::connector::Provider;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::builder(Provider::Sqlite)
            .model(
                ModelDef::new("User")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("admin", "Boolean"))
                    .with_field(FieldDef::new("posts", "Post").array().relation(RelationInfo::back())),
            )
            .model(
                ModelDef::new("Post")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("title", "String"))
                    .with_field(FieldDef::new("score", "Decimal"))
                    .with_field(FieldDef::new("authorId", "Int"))
                    .with_field(FieldDef::new("author", "User").relation(RelationInfo::owned(["authorId"], ["id"]))),
            )
            .build()
            .unwrap()
    }

    fn record(pairs: Vec<(&str, Value)>) -> Value {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
    }

    #[test]
    fn nested_relations_are_parsed_from_json_text() {
        let schema = schema();
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("User").unwrap();

        let selection = FieldSelection {
            scalars: vec!["id".into(), "admin".into()],
            relations: vec![RelationSelection {
                field: "posts".into(),
                args: QueryArguments {
                    take: Some(-2),
                    ..Default::default()
                },
                selection: FieldSelection::scalars(["title", "score"]),
            }],
            counts: vec![RelationCount {
                field: "posts".into(),
                filter: Filter::Empty,
            }],
        };

        let rows = ResultSet::new(
            vec!["id".into(), "admin".into(), "posts".into(), "_count".into()],
            vec![vec![
                Value::Int(1),
                Value::Int(1),
                Value::from(r#"[{"title":"b","score":"1.50"},{"title":"a","score":2}]"#),
                Value::from(r#"{"posts":2}"#),
            ]],
        );

        let records = read_records(&ctx, model, rows, &selection).unwrap();

        assert_eq!(
            vec![record(vec![
                ("id", Value::Int(1)),
                ("admin", Value::Boolean(true)),
                (
                    "posts",
                    Value::List(vec![
                        record(vec![("title", "a".into()), ("score", Value::Decimal(BigDecimal::from(2)))]),
                        record(vec![
                            ("title", "b".into()),
                            ("score", Value::Decimal(bastion_value::parse_decimal("1.5").unwrap()))
                        ]),
                    ])
                ),
                ("_count", record(vec![("posts", Value::Int(2))])),
            ])],
            records
        );
    }

    #[test]
    fn in_memory_distinct_paginates_after_deduplication() {
        let rows = vec![
            record(vec![("k", Value::Int(1)), ("n", Value::Int(1))]),
            record(vec![("k", Value::Int(1)), ("n", Value::Int(2))]),
            record(vec![("k", Value::Int(2)), ("n", Value::Int(3))]),
            record(vec![("k", Value::Int(3)), ("n", Value::Int(4))]),
        ];

        let args = QueryArguments {
            distinct: vec!["k".into()],
            skip: Some(1),
            take: Some(1),
            ..Default::default()
        };

        let out = apply_in_memory(rows, &args, false);

        assert_eq!(vec![record(vec![("k", Value::Int(2)), ("n", Value::Int(3))])], out);
    }

    #[test]
    fn aggregate_rows_are_grouped_by_function() {
        let schema = schema();
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let columns = vec![
            AggregateColumn {
                function: AggregationFunction::Count,
                field: None,
            },
            AggregateColumn {
                function: AggregationFunction::Avg,
                field: Some("score".into()),
            },
            AggregateColumn {
                function: AggregationFunction::Max,
                field: Some("title".into()),
            },
        ];

        let row = ResultSet::new(
            vec!["title".into(), "_count$_all".into(), "_avg$score".into(), "_max$title".into()],
            vec![vec![Value::from("x"), Value::Int(3), Value::Float(1.5), Value::Null]],
        )
        .into_single()
        .unwrap();

        let value = read_aggregate_row(&ctx, model, &["title".into()], &columns, row).unwrap();

        assert_eq!(
            record(vec![
                ("title", "x".into()),
                ("_count", record(vec![("_all", Value::Int(3))])),
                ("_avg", record(vec![("score", Value::Decimal(bastion_value::parse_decimal("1.5").unwrap()))])),
                ("_max", record(vec![("title", Value::Null)])),
            ]),
            value
        );
    }
}
