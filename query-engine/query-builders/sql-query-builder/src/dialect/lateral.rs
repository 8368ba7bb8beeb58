use super::Dialect;
use crate::{
    alias::Alias,
    context::Context,
    error::Result,
    select::{paginate, relation_query},
    value::{self, list_element_json, BytesEncoding, ReadType},
    JSON_DATA_IDENT,
};
use bastion_query_structure::RelationSelection;
use bastion_schema::{FieldDef, ResolvedRelation, ScalarType, Schema};
use bastion_sql::{ast::*, connector::Provider};
use bastion_value::Value;

/// PostgreSQL and MySQL nest relations with lateral joins, one per selected
/// relation:
///
/// ```sql
/// SELECT User.id, User$posts$@rel.data AS posts
/// FROM User
/// LEFT JOIN LATERAL (
///   SELECT COALESCE(JSON_AGG(agg.data), '[]') AS data
///   FROM (SELECT JSON_OBJECT(..) AS data FROM Post AS User$posts
///         WHERE User$posts.authorId = User.id ORDER BY .. LIMIT ..) AS agg
/// ) AS User$posts$@rel ON 1=1
/// ```
///
/// Unordered and unpaginated to-many relations aggregate directly without
/// the inner derived table.
#[derive(Debug, Clone, Copy)]
pub struct LateralDialect {
    provider: Provider,
}

impl LateralDialect {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }

    fn is_postgres(&self) -> bool {
        self.provider == Provider::Postgres
    }
}

impl Dialect for LateralDialect {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn supports_distinct_on(&self) -> bool {
        self.is_postgres()
    }

    fn supports_returning(&self) -> bool {
        self.is_postgres()
    }

    fn max_bind_values(&self) -> usize {
        if self.is_postgres() {
            32767
        } else {
            65535
        }
    }

    // PostgreSQL renders insensitive matches as ILIKE.
    fn like_is_case_insensitive(&self) -> bool {
        !self.is_postgres()
    }

    fn equality_is_case_insensitive(&self) -> bool {
        !self.is_postgres()
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
        let rel_alias = related.alias.derived("rel");
        let data = || Column::new(JSON_DATA_IDENT);

        let joined = if !rel.is_to_many() {
            related.select.value(related.object.alias(JSON_DATA_IDENT)).limit(1)
        } else if !related.is_bounded() {
            let array = coalesce([Expression::from(json_array_agg(related.object)), json_array_empty().into()]);

            related.select.value(Expression::from(array).alias(JSON_DATA_IDENT))
        } else {
            let agg = related.alias.derived("agg");
            let ordered = !related.select.ordering.is_empty();

            // MySQL drops the order of derived tables without a LIMIT.
            let take = match related.take {
                None if ordered && !self.is_postgres() => Some(i64::MAX),
                take => take,
            };

            let rows = paginate(related.select.value(related.object.alias(JSON_DATA_IDENT)), related.skip, take);
            let array = coalesce([
                Expression::from(json_array_agg(data().table(&agg))),
                json_array_empty().into(),
            ]);

            Select::from_table(Table::from(rows).alias(&agg)).value(Expression::from(array).alias(JSON_DATA_IDENT))
        };

        let join = Table::from(joined)
            .alias(&rel_alias)
            .on(ConditionTree::NoCondition)
            .lateral();

        Ok((select.left_join(join), data().table(&rel_alias).into()))
    }

    fn json_column(&self, schema: &Schema, field: &FieldDef, expr: Expression) -> Expression {
        match ReadType::of(schema, field) {
            Some(ReadType::Scalar(ScalarType::Bytes)) if !field.array => encode_bytes(expr).into(),
            _ => expr,
        }
    }

    fn json_array_contains(&self, doc: Expression, value: serde_json::Value) -> ConditionTree {
        let needle = match value {
            array @ serde_json::Value::Array(_) => array,
            single => serde_json::Value::Array(vec![single]),
        };

        let name = if self.is_postgres() { "jsonb_contains" } else { "JSON_CONTAINS" };
        let call = generic_function(name, vec![doc, json_parse(val(Value::Json(needle))).into()]);

        if self.is_postgres() {
            ConditionTree::single(Expression::from(call))
        } else {
            Expression::from(call).equals(val(1_i64)).into()
        }
    }

    fn transform_primitive(&self, value: Value, field: &FieldDef) -> Value {
        match value {
            Value::List(items) if field.array && !self.is_postgres() => {
                Value::Json(serde_json::Value::Array(items.iter().map(list_element_json).collect()))
            }
            Value::Object(_) => Value::Json(value.to_json()),
            Value::Enum(e) if !self.is_postgres() => Value::String(e),
            other => other,
        }
    }

    fn transform_element(&self, value: Value, _field: &FieldDef) -> Value {
        value
    }

    fn sql_type(&self, schema: &Schema, field: &FieldDef) -> Option<&'static str> {
        if !self.is_postgres() {
            return None;
        }

        let base = match ReadType::of(schema, field)? {
            ReadType::Scalar(ScalarType::String) | ReadType::Enum => "text",
            ReadType::Scalar(ScalarType::Int) => "integer",
            ReadType::Scalar(ScalarType::BigInt) => "bigint",
            ReadType::Scalar(ScalarType::Float) => "double precision",
            ReadType::Scalar(ScalarType::Decimal) => "decimal",
            ReadType::Scalar(ScalarType::Boolean) => "boolean",
            ReadType::Scalar(ScalarType::DateTime) => "timestamptz",
            ReadType::Scalar(ScalarType::Bytes) => "bytea",
            ReadType::Scalar(ScalarType::Json) | ReadType::Document => "jsonb",
        };

        if !field.array {
            return Some(base);
        }

        let array = match base {
            "text" => "text[]",
            "integer" => "integer[]",
            "bigint" => "bigint[]",
            "double precision" => "double precision[]",
            "decimal" => "decimal[]",
            "boolean" => "boolean[]",
            "timestamptz" => "timestamptz[]",
            "bytea" => "bytea[]",
            _ => "jsonb[]",
        };

        Some(array)
    }

    fn read_column(&self, schema: &Schema, field: &FieldDef, value: Value) -> Result<Value> {
        value::read_column(schema, field, value, BytesEncoding::Base64)
    }

    fn read_json_value(&self, schema: &Schema, field: &FieldDef, json: serde_json::Value) -> Result<Value> {
        match ReadType::of(schema, field) {
            Some(typ) => value::read_json(json, typ, field.array, BytesEncoding::Base64),
            None => Ok(Value::Json(json)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_sql::visitor::build_for;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn provider_flags() {
        let postgres = LateralDialect::new(Provider::Postgres);
        let mysql = LateralDialect::new(Provider::Mysql);

        assert!(postgres.supports_distinct_on() && postgres.supports_returning());
        assert!(!mysql.supports_distinct_on() && !mysql.supports_returning());
        assert!(mysql.equality_is_case_insensitive());
        assert!(!postgres.like_is_case_insensitive());
    }

    #[test]
    fn json_containment() {
        let condition = LateralDialect::new(Provider::Postgres).json_array_contains(Column::new("doc").into(), json!(1));
        let (sql, params) = build_for(Provider::Postgres, Select::from_table("t").so_that(condition).into()).unwrap();

        assert_eq!(r#"SELECT * FROM "t" WHERE jsonb_contains("doc", ($1)::jsonb)"#, sql);
        assert_eq!(vec![Value::Json(json!([1]))], params);

        let condition = LateralDialect::new(Provider::Mysql).json_array_contains(Column::new("doc").into(), json!(1));
        let (sql, _) = build_for(Provider::Mysql, Select::from_table("t").so_that(condition).into()).unwrap();

        assert_eq!("SELECT * FROM `t` WHERE JSON_CONTAINS(`doc`, CAST(? AS JSON)) = ?", sql);
    }
}
