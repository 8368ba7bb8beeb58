use crate::{
    aggregate::{aggregate_argument, aggregate_expression},
    alias::Alias,
    context::Context,
    error::{QueryBuilderError, Result},
    model_extensions::{field_expression, named_field_expression, relation_condition, select_model},
};
use bastion_query_structure::*;
use bastion_schema::{FieldDef, ModelDef};
use bastion_sql::ast::*;
use bastion_value::{NullSentinel, Value};

/// Escapes the `LIKE` wildcards of a literal, for use with `ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());

    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }

        escaped.push(c);
    }

    escaped
}

/// The `WHERE` condition of a filter on a model's own table, with columns
/// qualified by the table name. Used by updates and deletes.
pub fn filter_condition(ctx: &Context<'_>, model: &ModelDef, filter: &Filter) -> Result<ConditionTree> {
    FilterVisitor::new(*ctx, model, Alias::new(model.table_name())).visit(filter)
}

/// Converts a [`Filter`] over the rows of `model` aliased `alias` into a
/// condition tree.
///
/// Relation filters become correlated `EXISTS` subqueries whose aliases
/// extend the current one with the relation field.
pub struct FilterVisitor<'a> {
    ctx: Context<'a>,
    model: &'a ModelDef,
    alias: Alias,
}

impl<'a> FilterVisitor<'a> {
    pub fn new(ctx: Context<'a>, model: &'a ModelDef, alias: Alias) -> Self {
        Self { ctx, model, alias }
    }

    pub fn visit(&self, filter: &Filter) -> Result<ConditionTree> {
        match filter {
            Filter::And(filters) => filters.iter().try_fold(ConditionTree::NoCondition, |acc, f| {
                Ok(acc.and_with(self.visit(f)?))
            }),
            Filter::Or(filters) => filters.iter().try_fold(ConditionTree::NegativeCondition, |acc, f| {
                Ok(acc.or_with(self.visit(f)?))
            }),
            // Every nested condition must be false.
            Filter::Not(filters) => filters.iter().try_fold(ConditionTree::NoCondition, |acc, f| {
                Ok(acc.and_with(self.visit(f)?.negate()))
            }),
            Filter::Scalar(filter) => self.visit_scalar_filter(filter),
            Filter::Relation(filter) => self.visit_relation_filter(filter),
            Filter::Aggregation(filter) => self.visit_aggregation_filter(filter),
            Filter::BoolFilter(true) | Filter::Empty => Ok(ConditionTree::NoCondition),
            Filter::BoolFilter(false) => Ok(ConditionTree::NegativeCondition),
        }
    }

    fn visit_scalar_filter(&self, filter: &ScalarFilter) -> Result<ConditionTree> {
        let field = self.model.field(&filter.field)?;
        let lhs = field_expression(&self.ctx, self.model, field, &self.alias)?;

        self.convert_condition(lhs, Some(field), &filter.condition, filter.mode == QueryMode::Insensitive)
    }

    // SELECT 1 FROM Target AS alias$field WHERE <join> AND <nested>
    fn visit_relation_filter(&self, filter: &RelationFilter) -> Result<ConditionTree> {
        let rel = self.ctx.relation(self.model, &filter.field)?;
        let child = self.alias.child(&filter.field);

        let nested = FilterVisitor::new(self.ctx, rel.target, child.clone()).visit(&filter.nested)?;
        let related = select_model(&self.ctx, rel.target, &child)?
            .value(raw("1"))
            .so_that(relation_condition(&rel, &self.alias, &child)?);

        let condition = match filter.condition {
            RelationCondition::AtLeastOneRelatedRecord | RelationCondition::ToOneRelatedRecord => {
                exists(related.and_where(nested))
            }
            RelationCondition::NoRelatedRecord => not_exists(related.and_where(nested)),
            RelationCondition::EveryRelatedRecord => not_exists(related.and_where(nested.negate())),
        };

        Ok(condition.into())
    }

    fn visit_aggregation_filter(&self, filter: &AggregationFilter) -> Result<ConditionTree> {
        let field = match &filter.field {
            Some(name) => Some(self.model.field(name)?),
            None => None,
        };

        let argument = match field {
            Some(field) => {
                let expr = field_expression(&self.ctx, self.model, field, &self.alias)?;
                Some(aggregate_argument(&self.ctx, filter.function, field, expr))
            }
            None => None,
        };

        let lhs = aggregate_expression(filter.function, argument);

        // Counts are plain integers, other aggregates keep the field's type.
        let typed_field = match filter.function {
            AggregationFunction::Count | AggregationFunction::Avg => None,
            _ => field,
        };

        self.convert_condition(lhs, typed_field, &filter.condition, false)
    }

    fn convert_condition(
        &self,
        lhs: Expression,
        field: Option<&FieldDef>,
        condition: &ScalarCondition,
        insensitive: bool,
    ) -> Result<ConditionTree> {
        let fold_equality = insensitive && !self.ctx.dialect.equality_is_case_insensitive();
        let fold = |expr: Expression| -> Expression {
            let expr = match field {
                Some(field) => self.ctx.dialect.comparable_expression(self.ctx.schema, field, expr),
                None => expr,
            };

            if fold_equality {
                lower(expr).into()
            } else {
                expr
            }
        };

        let condition: ConditionTree = match condition {
            ScalarCondition::Equals(value) if is_null(value) => lhs.is_null().into(),
            ScalarCondition::NotEquals(value) if is_null(value) => lhs.is_not_null().into(),
            ScalarCondition::Equals(value) => fold(lhs).equals(fold(self.rhs(field, value)?)).into(),
            ScalarCondition::NotEquals(value) => fold(lhs).not_equals(fold(self.rhs(field, value)?)).into(),
            ScalarCondition::LessThan(value) => fold(lhs).less_than(fold(self.rhs(field, value)?)).into(),
            ScalarCondition::LessThanOrEquals(value) => {
                fold(lhs).less_than_or_equals(fold(self.rhs(field, value)?)).into()
            }
            ScalarCondition::GreaterThan(value) => fold(lhs).greater_than(fold(self.rhs(field, value)?)).into(),
            ScalarCondition::GreaterThanOrEquals(value) => {
                fold(lhs).greater_than_or_equals(fold(self.rhs(field, value)?)).into()
            }
            ScalarCondition::Contains(value) => self.like(lhs, field, value, "%", "%", insensitive, false)?,
            ScalarCondition::NotContains(value) => self.like(lhs, field, value, "%", "%", insensitive, true)?,
            ScalarCondition::StartsWith(value) => self.like(lhs, field, value, "", "%", insensitive, false)?,
            ScalarCondition::NotStartsWith(value) => self.like(lhs, field, value, "", "%", insensitive, true)?,
            ScalarCondition::EndsWith(value) => self.like(lhs, field, value, "%", "", insensitive, false)?,
            ScalarCondition::NotEndsWith(value) => self.like(lhs, field, value, "%", "", insensitive, true)?,
            ScalarCondition::In(values) => {
                let (nulls, values): (Vec<&Value>, Vec<&Value>) = values.iter().partition(|v| v.is_null());
                let row = row(values.into_iter().map(|v| fold(self.param(field, v.clone()))));
                let condition: ConditionTree = fold(lhs.clone()).in_selection(row).into();

                if nulls.is_empty() {
                    condition
                } else {
                    condition.or_with(lhs.is_null().into())
                }
            }
            ScalarCondition::NotIn(values) => {
                let (nulls, values): (Vec<&Value>, Vec<&Value>) = values.iter().partition(|v| v.is_null());
                let row = row(values.into_iter().map(|v| fold(self.param(field, v.clone()))));
                let condition: ConditionTree = fold(lhs.clone()).not_in_selection(row).into();

                if nulls.is_empty() {
                    condition
                } else {
                    condition.and_with(lhs.is_not_null().into())
                }
            }
            ScalarCondition::Has(value) => lhs
                .list_has(vec![self.element(field, value.clone())], ListQuantifier::Some)
                .into(),
            ScalarCondition::HasSome(values) => lhs
                .list_has(
                    values.iter().map(|v| self.element(field, v.clone())).collect(),
                    ListQuantifier::Some,
                )
                .into(),
            ScalarCondition::HasEvery(values) => lhs
                .list_has(
                    values.iter().map(|v| self.element(field, v.clone())).collect(),
                    ListQuantifier::Every,
                )
                .into(),
            ScalarCondition::IsEmpty(empty) => lhs.list_is_empty(*empty).into(),
            ScalarCondition::Json(json) => self.json_condition(lhs, json)?,
        };

        Ok(condition)
    }

    fn param(&self, field: Option<&FieldDef>, value: Value) -> Expression {
        match field {
            Some(field) => val(self.ctx.dialect.transform_primitive(value, field)),
            None => val(value),
        }
    }

    fn element(&self, field: Option<&FieldDef>, value: Value) -> Expression {
        match field {
            Some(field) => val(self.ctx.dialect.transform_element(value, field)),
            None => val(value),
        }
    }

    fn rhs(&self, field: Option<&FieldDef>, value: &ConditionValue) -> Result<Expression> {
        match value {
            ConditionValue::Value(value) => Ok(self.param(field, value.clone())),
            ConditionValue::FieldRef(other) => named_field_expression(&self.ctx, self.model, other, &self.alias),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn like(
        &self,
        lhs: Expression,
        field: Option<&FieldDef>,
        value: &ConditionValue,
        prefix: &str,
        suffix: &str,
        insensitive: bool,
        negated: bool,
    ) -> Result<ConditionTree> {
        let text = match value {
            ConditionValue::Value(Value::String(s) | Value::Enum(s)) => s,
            _ => {
                return Err(QueryBuilderError::invalid_filter(
                    &self.model.name,
                    field.map(|f| f.name.as_str()).unwrap_or_default(),
                    "string filters take a string value",
                ))
            }
        };

        let pattern = format!("{prefix}{}{suffix}", escape_like(text));
        let options = LikeOptions { insensitive, negated };

        Ok(lhs.like(val(pattern), options).into())
    }

    fn json_condition(&self, column: Expression, condition: &JsonCondition) -> Result<ConditionTree> {
        let target: Expression = if condition.path.is_empty() {
            column.clone()
        } else {
            json_extract(column.clone(), condition.path.clone(), false).into()
        };

        let as_text = || -> Expression { json_extract(column.clone(), condition.path.clone(), true).into() };
        let json_equals = |json: serde_json::Value| -> ConditionTree {
            json_parse(target.clone())
                .equals(json_parse(val(Value::Json(json))))
                .into()
        };
        let text_like = |pattern: String| -> ConditionTree { as_text().like(val(pattern), LikeOptions::default()).into() };

        let tree = match &condition.predicate {
            JsonPredicate::Equals(JsonTarget::Null(NullSentinel::DbNull)) => target.clone().is_null().into(),
            JsonPredicate::Equals(JsonTarget::Null(NullSentinel::JsonNull)) => json_equals(serde_json::Value::Null),
            JsonPredicate::Equals(JsonTarget::Null(NullSentinel::AnyNull)) => {
                let db_null: ConditionTree = target.clone().is_null().into();
                db_null.or_with(json_equals(serde_json::Value::Null))
            }
            JsonPredicate::Equals(JsonTarget::Value(json)) => json_equals(json.clone()),
            JsonPredicate::StringContains(s) => text_like(format!("%{}%", escape_like(s))),
            JsonPredicate::StringStartsWith(s) => text_like(format!("{}%", escape_like(s))),
            JsonPredicate::StringEndsWith(s) => text_like(format!("%{}", escape_like(s))),
            JsonPredicate::ArrayContains(value) => self.ctx.dialect.json_array_contains(target.clone(), value.clone()),
        };

        Ok(tree.invert_if(condition.negated))
    }
}

fn is_null(value: &ConditionValue) -> bool {
    matches!(value, ConditionValue::Value(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect_for, ComputedFields};
    use bastion_schema::{FieldDef, RelationInfo, Schema};
    use bastion_sql::{connector::Provider, visitor::build_for};
    use pretty_assertions::assert_eq;

    fn schema(provider: Provider) -> Schema {
        Schema::builder(provider)
            .model(
                ModelDef::new("User")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("email", "String").unique())
                    .with_field(FieldDef::new("tags", "String").array())
                    .with_field(FieldDef::new("posts", "Post").array().relation(RelationInfo::back())),
            )
            .model(
                ModelDef::new("Post")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("title", "String"))
                    .with_field(FieldDef::new("published", "Boolean"))
                    .with_field(FieldDef::new("price", "Decimal"))
                    .with_field(FieldDef::new("authorId", "Int"))
                    .with_field(FieldDef::new("author", "User").relation(RelationInfo::owned(["authorId"], ["id"]))),
            )
            .build()
            .unwrap()
    }

    fn render(provider: Provider, model: &str, filter: Filter) -> (String, Vec<Value>) {
        let schema = schema(provider);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(provider), &computed);
        let model = schema.model(model).unwrap();

        let condition = FilterVisitor::new(ctx, model, Alias::new(model.table_name()))
            .visit(&filter)
            .unwrap();

        build_for(provider, Select::from_table("x").value(raw("1")).so_that(condition).into()).unwrap()
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(r"100\%\_off\\", escape_like(r"100%_off\"));

        let filter = Filter::scalar("email", ScalarCondition::Contains(Value::from("a_b").into()));
        let (sql, params) = render(Provider::Sqlite, "User", filter);

        assert_eq!("SELECT 1 FROM `x` WHERE `User`.`email` LIKE ? ESCAPE '\\'", sql);
        assert_eq!(vec![Value::from(r"%a\_b%")], params);
    }

    #[test]
    fn decimals_compare_as_numbers_on_sqlite() {
        let price = bastion_value::parse_decimal("9.6").unwrap();
        let filter = Filter::scalar("price", ScalarCondition::GreaterThan(Value::Decimal(price).into()));

        let (sql, params) = render(Provider::Sqlite, "Post", filter.clone());
        assert_eq!("SELECT 1 FROM `x` WHERE CAST(`Post`.`price` AS REAL) > CAST(? AS REAL)", sql);
        assert_eq!(vec![Value::from("9.6")], params);

        let (sql, _) = render(Provider::Postgres, "Post", filter);
        assert!(!sql.contains("CAST"), "{sql}");
    }

    #[test]
    fn insensitive_filters_per_provider() {
        let filter = Filter::Scalar(ScalarFilter {
            field: "email".into(),
            condition: ScalarCondition::Equals(Value::from("A").into()),
            mode: QueryMode::Insensitive,
        });

        let (sql, _) = render(Provider::Sqlite, "User", filter.clone());
        assert_eq!("SELECT 1 FROM `x` WHERE LOWER(`User`.`email`) = LOWER(?)", sql);

        let (sql, _) = render(Provider::Mysql, "User", filter);
        assert_eq!("SELECT 1 FROM `x` WHERE `User`.`email` = ?", sql);
    }

    #[test]
    fn to_many_filters_use_correlated_subqueries() {
        let nested = Filter::scalar("published", ScalarCondition::Equals(Value::Boolean(true).into()));
        let filter = Filter::Relation(RelationFilter::new(
            "posts",
            RelationCondition::EveryRelatedRecord,
            nested,
        ));

        let (sql, params) = render(Provider::Sqlite, "User", filter);

        assert_eq!(
            "SELECT 1 FROM `x` WHERE NOT EXISTS (SELECT 1 FROM `Post` AS `User$posts` \
             WHERE (`User`.`id` = `User$posts`.`authorId` AND (NOT `User$posts`.`published` = ?)))",
            sql
        );
        assert_eq!(vec![Value::Int(1)], params);
    }

    #[test]
    fn nulls_in_lists() {
        let filter = Filter::scalar("email", ScalarCondition::In(vec![Value::from("a"), Value::Null]));
        let (sql, _) = render(Provider::Postgres, "User", filter);

        assert_eq!(
            r#"SELECT 1 FROM "x" WHERE ("User"."email" IN ($1) OR "User"."email" IS NULL)"#,
            sql
        );
    }

    #[test]
    fn empty_or_matches_nothing() {
        let (sql, _) = render(Provider::Sqlite, "User", Filter::Or(vec![]));
        assert_eq!("SELECT 1 FROM `x` WHERE 1=0", sql);
    }

    #[test]
    fn field_references_compare_columns() {
        let filter = Filter::scalar("title", ScalarCondition::Equals(ConditionValue::FieldRef("title".into())));
        let (sql, params) = render(Provider::Sqlite, "Post", filter);

        assert_eq!("SELECT 1 FROM `x` WHERE `Post`.`title` = `Post`.`title`", sql);
        assert!(params.is_empty());
    }
}
