use super::Dialect;
use crate::{
    alias::Alias,
    context::Context,
    error::Result,
    select::{paginate, relation_query},
    value::{self, list_element_json, list_element_sql, utc_text, BytesEncoding, ReadType},
    JSON_DATA_IDENT,
};
use bastion_query_structure::RelationSelection;
use bastion_schema::{FieldDef, ResolvedRelation, ScalarType, Schema};
use bastion_sql::{ast::*, connector::Provider};
use bastion_value::Value;

/// SQLite nests relations with correlated scalar subqueries:
///
/// ```sql
/// SELECT User.id,
///   json((SELECT COALESCE(json_group_array(json(agg.data)), json('[]'))
///         FROM (SELECT json_object('title', p.title) AS data
///               FROM Post AS p WHERE p.authorId = User.id ORDER BY .. LIMIT ..) AS agg)) AS posts
/// FROM User
/// ```
///
/// Lists are stored as JSON arrays in text columns, booleans as integers,
/// dates as ISO-8601 text in UTC and decimals as text compared as `REAL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    fn max_bind_values(&self) -> usize {
        32766
    }

    fn like_is_case_insensitive(&self) -> bool {
        true
    }

    fn build_relation_selection(
        &self,
        ctx: &Context<'_>,
        select: Select,
        rel: &ResolvedRelation<'_>,
        selection: &RelationSelection,
        parent: &Alias,
    ) -> Result<(Select, Expression)> {
        let related = relation_query(ctx, rel, selection, parent)?;

        let nested: Expression = if rel.is_to_many() {
            let agg = related.alias.derived("agg");
            let rows = paginate(
                related.select.value(related.object.alias(JSON_DATA_IDENT)),
                related.skip,
                related.take,
            );

            let array = coalesce([
                Expression::from(json_array_agg(json_parse(Column::new(JSON_DATA_IDENT).table(&agg)))),
                json_array_empty().into(),
            ]);

            Select::from_table(Table::from(rows).alias(&agg)).value(array).into()
        } else {
            related.select.value(related.object).limit(1).into()
        };

        // Subquery results lose their JSON type.
        Ok((select, json_parse(nested).into()))
    }

    fn json_column(&self, schema: &Schema, field: &FieldDef, expr: Expression) -> Expression {
        if field.array {
            return json_parse(expr).into();
        }

        match ReadType::of(schema, field) {
            Some(ReadType::Scalar(ScalarType::Bytes)) => encode_bytes(expr).into(),
            Some(ReadType::Scalar(ScalarType::Json) | ReadType::Document) => json_parse(expr).into(),
            _ => expr,
        }
    }

    fn json_array_contains(&self, doc: Expression, value: serde_json::Value) -> ConditionTree {
        let elements = match value {
            serde_json::Value::Array(items) => items,
            single => vec![single],
        };

        let values = elements
            .into_iter()
            .map(|item| val(list_element_sql(Value::Json(item))))
            .collect();

        doc.list_has(values, ListQuantifier::Every).into()
    }

    fn transform_primitive(&self, value: Value, field: &FieldDef) -> Value {
        match value {
            Value::Boolean(b) => Value::Int(i64::from(b)),
            Value::BigInt(i) => Value::Int(i),
            Value::DateTime(dt) => Value::String(utc_text(&dt)),
            Value::Decimal(d) => Value::String(d.normalized().to_string()),
            Value::Enum(e) => Value::String(e),
            Value::List(items) if field.array => {
                Value::Json(serde_json::Value::Array(items.iter().map(list_element_json).collect()))
            }
            other @ Value::Object(_) => Value::Json(other.to_json()),
            other => other,
        }
    }

    // Decimals are stored as text.
    fn comparable_expression(&self, schema: &Schema, field: &FieldDef, expr: Expression) -> Expression {
        match ReadType::of(schema, field) {
            Some(ReadType::Scalar(ScalarType::Decimal)) if !field.array => cast(expr, "REAL").into(),
            _ => expr,
        }
    }

    fn transform_element(&self, value: Value, _field: &FieldDef) -> Value {
        list_element_sql(value)
    }

    fn sql_type(&self, _schema: &Schema, _field: &FieldDef) -> Option<&'static str> {
        None
    }

    fn read_column(&self, schema: &Schema, field: &FieldDef, value: Value) -> Result<Value> {
        value::read_column(schema, field, value, BytesEncoding::Hex)
    }

    fn read_json_value(&self, schema: &Schema, field: &FieldDef, json: serde_json::Value) -> Result<Value> {
        match ReadType::of(schema, field) {
            Some(typ) => value::read_json(json, typ, field.array, BytesEncoding::Hex),
            None => Ok(Value::Json(json)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_schema::Schema;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn stored_forms() {
        let dialect = SqliteDialect;
        let flag = FieldDef::new("flag", "Boolean");
        let tags = FieldDef::new("tags", "String").array();
        let at = FieldDef::new("at", "DateTime");

        assert_eq!(Value::Int(1), dialect.transform_primitive(Value::Boolean(true), &flag));
        assert_eq!(
            Value::Json(json!(["a", "b"])),
            dialect.transform_primitive(Value::List(vec!["a".into(), "b".into()]), &tags)
        );

        let dt = DateTime::parse_from_rfc3339("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(
            Value::String("2024-01-01T00:00:00.000Z".into()),
            dialect.transform_primitive(Value::DateTime(dt), &at)
        );
    }

    #[test]
    fn embedded_bytes_are_hex() {
        let schema = Schema::builder(Provider::Sqlite)
            .model(
                bastion_schema::ModelDef::new("File")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("data", "Bytes")),
            )
            .build()
            .unwrap();

        let field = schema.model("File").unwrap().field("data").unwrap();
        let value = SqliteDialect.read_json_value(&schema, field, json!("0aff")).unwrap();

        assert_eq!(Value::Bytes(vec![0x0a, 0xff]), value);
    }
}
