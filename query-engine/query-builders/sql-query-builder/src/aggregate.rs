use crate::{
    alias::Alias,
    context::Context,
    error::Result,
    filter::FilterVisitor,
    model_extensions::named_field_expression,
    ordering::order_specs,
    select::{filtered_select, paginate},
};
use bastion_query_structure::{AggregationFunction, AggregationSelection, Filter, QueryArguments};
use bastion_schema::{FieldDef, ModelDef};
use bastion_sql::ast::*;
use itertools::Itertools;

const ALL: &str = "_all";

/// One result column of an aggregation, named `<function>$<field>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateColumn {
    pub function: AggregationFunction,
    /// `None` counts rows.
    pub field: Option<String>,
}

impl AggregateColumn {
    pub fn name(&self) -> String {
        format!("{}${}", self.function.key(), self.field.as_deref().unwrap_or(ALL))
    }

    fn for_selections(selections: &[AggregationSelection]) -> Vec<AggregateColumn> {
        let mut columns = Vec::new();

        for selection in selections {
            if let AggregationSelection::Count { all: true, .. } = selection {
                columns.push(AggregateColumn {
                    function: AggregationFunction::Count,
                    field: None,
                });
            }

            for field in selection.fields() {
                columns.push(AggregateColumn {
                    function: selection.function(),
                    field: Some(field.clone()),
                });
            }
        }

        columns
    }
}

pub(crate) fn aggregate_expression(function: AggregationFunction, argument: Option<Expression>) -> Expression {
    let function = match (function, argument) {
        (AggregationFunction::Count, Some(arg)) => count(arg),
        (AggregationFunction::Sum, Some(arg)) => sum(arg),
        (AggregationFunction::Avg, Some(arg)) => avg(arg),
        (AggregationFunction::Min, Some(arg)) => min(arg),
        (AggregationFunction::Max, Some(arg)) => max(arg),
        (_, None) => count_all(),
    };

    function.into()
}

/// The argument of `function` over values of `field`. `MIN` and `MAX` order
/// values the way comparisons do.
pub(crate) fn aggregate_argument(
    ctx: &Context<'_>,
    function: AggregationFunction,
    field: &FieldDef,
    expr: Expression,
) -> Expression {
    match function {
        AggregationFunction::Min | AggregationFunction::Max => {
            ctx.dialect.comparable_expression(ctx.schema, field, expr)
        }
        _ => expr,
    }
}

/// Aggregates the rows matching `args`. Pagination bounds the aggregated
/// rows, so the aggregation runs over a derived table:
///
/// ```sql
/// SELECT COUNT(*) AS `_count$_all`, SUM(sub.views) AS `_sum$views`
/// FROM (SELECT Post.views AS views FROM Post WHERE .. LIMIT ..) AS sub
/// ```
pub fn aggregate(
    ctx: &Context<'_>,
    model: &ModelDef,
    args: &QueryArguments,
    selections: &[AggregationSelection],
) -> Result<(Select, Vec<AggregateColumn>)> {
    let alias = Alias::new(model.table_name());
    let columns = AggregateColumn::for_selections(selections);
    let specs = order_specs(model, args, false);

    let mut inner = filtered_select(ctx, model, &alias, args, &specs, false)?.value(raw("1"));
    let fields: Vec<&str> = columns.iter().filter_map(|c| c.field.as_deref()).unique().collect();

    for field in fields.iter() {
        inner = inner.value(named_field_expression(ctx, model, field, &alias)?.alias(*field));
    }

    let inner = paginate(inner, args.skip, args.take_abs());
    let sub = alias.derived("aggr");
    let mut outer = Select::from_table(Table::from(inner).alias(&sub));

    for column in columns.iter() {
        let argument = match &column.field {
            Some(name) => {
                let column_expr = Expression::from(Column::new(name.as_str()).table(&sub));
                Some(aggregate_argument(ctx, column.function, model.field(name)?, column_expr))
            }
            None => None,
        };

        outer = outer.value(aggregate_expression(column.function, argument).alias(column.name()));
    }

    Ok((outer, columns))
}

/// Groups the rows matching `args` by the `by` fields, which are selected
/// under their own names next to the aggregate columns.
pub fn group_by(
    ctx: &Context<'_>,
    model: &ModelDef,
    args: &QueryArguments,
    by: &[String],
    selections: &[AggregationSelection],
    having: Option<&Filter>,
) -> Result<(Select, Vec<AggregateColumn>)> {
    let alias = Alias::new(model.table_name());
    let columns = AggregateColumn::for_selections(selections);
    let specs = order_specs(model, args, false);

    let mut select = filtered_select(ctx, model, &alias, args, &specs, false)?;

    for field in by {
        let expr = named_field_expression(ctx, model, field, &alias)?;
        select = select.value(expr.clone().alias(field.as_str())).group_by(expr);
    }

    for column in columns.iter() {
        let argument = match &column.field {
            Some(name) => {
                let field = model.field(name)?;
                let expr = named_field_expression(ctx, model, name, &alias)?;
                Some(aggregate_argument(ctx, column.function, field, expr))
            }
            None => None,
        };

        select = select.value(aggregate_expression(column.function, argument).alias(column.name()));
    }

    if let Some(having) = having {
        select = select.having(FilterVisitor::new(*ctx, model, alias.clone()).visit(having)?);
    }

    Ok((paginate(select, args.skip, args.take_abs()), columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect_for, ComputedFields};
    use bastion_query_structure::{AggregationFilter, OrderBy, OrderByAggregation, ScalarCondition, SortOrder};
    use bastion_schema::{FieldDef, Schema};
    use bastion_sql::{connector::Provider, visitor::build_for};
    use bastion_value::Value;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::builder(Provider::Sqlite)
            .model(
                ModelDef::new("Post")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("category", "String"))
                    .with_field(FieldDef::new("views", "Int"))
                    .with_field(FieldDef::new("price", "Decimal")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn aggregates_over_a_bounded_subquery() {
        let schema = schema();
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let args = QueryArguments {
            take: Some(10),
            ..Default::default()
        };

        let selections = vec![
            AggregationSelection::new(AggregationFunction::Count, vec![], true),
            AggregationSelection::new(AggregationFunction::Sum, vec!["views".into()], false),
        ];

        let (select, columns) = aggregate(&ctx, model, &args, &selections).unwrap();
        let (sql, params) = build_for(Provider::Sqlite, select.into()).unwrap();

        assert_eq!(
            "SELECT COUNT(*) AS `_count$_all`, SUM(`Post$@aggr`.`views`) AS `_sum$views` \
             FROM (SELECT 1, `Post`.`views` AS `views` FROM `Post` AS `Post` LIMIT ?) AS `Post$@aggr`",
            sql
        );
        assert_eq!(vec![Value::Int(10)], params);
        assert_eq!(vec!["_count$_all", "_sum$views"], columns.iter().map(|c| c.name()).collect::<Vec<_>>());
    }

    #[test]
    fn group_by_with_having() {
        let schema = schema();
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let args = QueryArguments {
            order_by: vec![OrderBy::Aggregation(OrderByAggregation {
                function: AggregationFunction::Sum,
                field: "views".into(),
                sort_order: SortOrder::Descending,
            })],
            ..Default::default()
        };

        let having = Filter::Aggregation(AggregationFilter {
            function: AggregationFunction::Count,
            field: None,
            condition: ScalarCondition::GreaterThan(Value::Int(1).into()),
        });

        let selections = vec![AggregationSelection::new(AggregationFunction::Sum, vec!["views".into()], false)];
        let (select, _) = group_by(&ctx, model, &args, &["category".into()], &selections, Some(&having)).unwrap();
        let (sql, _) = build_for(Provider::Sqlite, select.into()).unwrap();

        assert_eq!(
            "SELECT `Post`.`category` AS `category`, SUM(`Post`.`views`) AS `_sum$views` FROM `Post` AS `Post` \
             GROUP BY `Post`.`category` HAVING COUNT(*) > ? ORDER BY SUM(`Post`.`views`) DESC",
            sql
        );
    }

    #[test]
    fn decimal_extremes_are_numeric_on_sqlite() {
        let schema = schema();
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let selections = vec![
            AggregationSelection::new(AggregationFunction::Max, vec!["price".into()], false),
            AggregationSelection::new(AggregationFunction::Sum, vec!["price".into()], false),
        ];

        let (select, _) = aggregate(&ctx, model, &QueryArguments::default(), &selections).unwrap();
        let (sql, _) = build_for(Provider::Sqlite, select.into()).unwrap();

        assert!(
            sql.starts_with(
                "SELECT MAX(CAST(`Post$@aggr`.`price` AS REAL)) AS `_max$price`, \
                 SUM(`Post$@aggr`.`price`) AS `_sum$price`"
            ),
            "{sql}"
        );
    }
}
