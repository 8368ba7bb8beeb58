use crate::{
    aggregate::{aggregate_argument, aggregate_expression},
    alias::Alias,
    context::Context,
    error::Result,
    model_extensions::{named_field_expression, relation_condition, select_model},
};
use bastion_query_structure::{NullsOrder, OrderBy, QueryArguments, SortOrder};
use bastion_schema::ModelDef;
use bastion_sql::ast::*;

/// One `ORDER BY` item with its final SQL direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub order_by: OrderBy,
    pub order: Order,
}

/// The ordering of a read, reversed for a negative `take`.
///
/// With `tie_break`, paginated or ordered reads get the primary identifier
/// appended unless the ordering already covers a required unique
/// constraint, making the row order stable.
pub(crate) fn order_specs(model: &ModelDef, args: &QueryArguments, tie_break: bool) -> Vec<OrderSpec> {
    let mut order_bys = args.order_by.clone();

    if tie_break && (!order_bys.is_empty() || args.has_pagination()) && !covers_unique(model, &order_bys) {
        for id in model.primary_identifier() {
            if !order_bys.iter().any(|o| o.own_field() == Some(id)) {
                order_bys.push(OrderBy::scalar(id, SortOrder::Ascending));
            }
        }
    }

    let reverse = args.needs_reversed_order();

    order_bys
        .into_iter()
        .map(|order_by| {
            let order_by = if reverse { order_by.reversed() } else { order_by };

            OrderSpec {
                order: sql_order(&order_by),
                order_by,
            }
        })
        .collect()
}

fn covers_unique(model: &ModelDef, order_bys: &[OrderBy]) -> bool {
    let ordered = |field: &str| order_bys.iter().any(|o| o.own_field() == Some(field));
    let required = |field: &str| model.find_field(field).map(|f| !f.optional).unwrap_or(false);

    std::iter::once(model.primary_identifier())
        .chain(model.unique_constraints().into_iter().map(|c| c.fields))
        .any(|fields| !fields.is_empty() && fields.iter().all(|f| ordered(f) && required(f)))
}

fn sql_order(order_by: &OrderBy) -> Order {
    let nulls = match order_by {
        OrderBy::Scalar(scalar) => scalar.nulls_order,
        _ => None,
    };

    match (order_by.sort_order(), nulls) {
        (SortOrder::Ascending, None) => Order::Asc,
        (SortOrder::Ascending, Some(NullsOrder::First)) => Order::AscNullsFirst,
        (SortOrder::Ascending, Some(NullsOrder::Last)) => Order::AscNullsLast,
        (SortOrder::Descending, None) => Order::Desc,
        (SortOrder::Descending, Some(NullsOrder::First)) => Order::DescNullsFirst,
        (SortOrder::Descending, Some(NullsOrder::Last)) => Order::DescNullsLast,
    }
}

/// The value a row of `model` aliased `alias` is sorted by.
///
/// Orderings through to-one relations become scalar subqueries hopping
/// along the path; relation counts become `COUNT(*)` subqueries.
pub fn order_expression(ctx: &Context<'_>, model: &ModelDef, alias: &Alias, order_by: &OrderBy) -> Result<Expression> {
    match order_by {
        OrderBy::Scalar(scalar) => path_expression(ctx, model, alias, &scalar.path, &scalar.field),
        OrderBy::ToManyCount(count) => {
            let rel = ctx.relation(model, &count.field)?;
            let child = alias.child(&count.field);

            let counted = select_model(ctx, rel.target, &child)?
                .value(count_all())
                .so_that(relation_condition(&rel, alias, &child)?);

            Ok(counted.into())
        }
        OrderBy::Aggregation(aggregation) => {
            let argument = if aggregation.field == "_all" {
                None
            } else {
                let field = model.field(&aggregation.field)?;
                let expr = named_field_expression(ctx, model, &aggregation.field, alias)?;
                Some(aggregate_argument(ctx, aggregation.function, field, expr))
            };

            Ok(aggregate_expression(aggregation.function, argument).into())
        }
    }
}

fn path_expression(ctx: &Context<'_>, model: &ModelDef, alias: &Alias, path: &[String], field: &str) -> Result<Expression> {
    let Some((hop, rest)) = path.split_first() else {
        let expr = named_field_expression(ctx, model, field, alias)?;
        return Ok(ctx.dialect.comparable_expression(ctx.schema, model.field(field)?, expr));
    };

    let rel = ctx.relation(model, hop)?;
    let child = alias.child(hop);
    let inner = path_expression(ctx, rel.target, &child, rest, field)?;

    let related = select_model(ctx, rel.target, &child)?
        .value(inner)
        .so_that(relation_condition(&rel, alias, &child)?)
        .limit(1);

    Ok(related.into())
}

/// Adds the ordering of `args` to `select`. With `distinct_on`, the
/// distinct fields lead the ordering as `DISTINCT ON` requires.
pub(crate) fn with_ordering(
    ctx: &Context<'_>,
    model: &ModelDef,
    alias: &Alias,
    specs: &[OrderSpec],
    distinct_on: Option<&[String]>,
    mut select: Select,
) -> Result<Select> {
    if let Some(distinct) = distinct_on {
        let mut leading = Vec::with_capacity(distinct.len());

        for field in distinct {
            leading.push(named_field_expression(ctx, model, field, alias)?);
        }

        select = select.distinct_on(leading.clone());

        for expr in leading {
            select = select.order_by(expr.ascend());
        }
    }

    for spec in specs {
        let expr = order_expression(ctx, model, alias, &spec.order_by)?;
        select = select.order_by(expr.order(Some(spec.order)));
    }

    Ok(select)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_query_structure::OrderByScalar;
    use bastion_schema::{FieldDef, Schema};
    use bastion_sql::connector::Provider;
    use pretty_assertions::assert_eq;

    fn model() -> ModelDef {
        let schema = Schema::builder(Provider::Sqlite)
            .model(
                ModelDef::new("Post")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("slug", "String").unique())
                    .with_field(FieldDef::new("subtitle", "String").optional().unique())
                    .with_field(FieldDef::new("title", "String")),
            )
            .build()
            .unwrap();

        schema.model("Post").unwrap().clone()
    }

    fn fields(specs: &[OrderSpec]) -> Vec<(String, Order)> {
        specs
            .iter()
            .map(|s| match &s.order_by {
                OrderBy::Scalar(OrderByScalar { field, .. }) => (field.clone(), s.order),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn pagination_adds_the_primary_identifier() {
        let model = model();
        let args = QueryArguments {
            order_by: vec![OrderBy::scalar("title", SortOrder::Descending)],
            take: Some(2),
            ..Default::default()
        };

        assert_eq!(
            vec![("title".to_owned(), Order::Desc), ("id".to_owned(), Order::Asc)],
            fields(&order_specs(&model, &args, true))
        );
    }

    #[test]
    fn required_unique_orderings_are_stable() {
        let model = model();
        let mut args = QueryArguments {
            order_by: vec![OrderBy::scalar("slug", SortOrder::Ascending)],
            ..Default::default()
        };

        assert_eq!(1, order_specs(&model, &args, true).len());

        args.order_by = vec![OrderBy::scalar("subtitle", SortOrder::Ascending)];
        assert_eq!(2, order_specs(&model, &args, true).len());
    }

    #[test]
    fn negative_take_reverses_every_item() {
        let model = model();
        let args = QueryArguments {
            order_by: vec![OrderBy::Scalar(OrderByScalar {
                field: "title".into(),
                path: vec![],
                sort_order: SortOrder::Ascending,
                nulls_order: Some(NullsOrder::First),
            })],
            take: Some(-1),
            ..Default::default()
        };

        assert_eq!(
            vec![("title".to_owned(), Order::DescNullsLast), ("id".to_owned(), Order::Desc)],
            fields(&order_specs(&model, &args, true))
        );
    }

    #[test]
    fn unordered_reads_stay_unordered() {
        assert!(order_specs(&model(), &QueryArguments::default(), true).is_empty());
    }
}
