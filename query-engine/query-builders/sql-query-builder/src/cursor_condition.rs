use crate::{
    alias::Alias,
    context::Context,
    error::Result,
    filter::FilterVisitor,
    model_extensions::select_model,
    ordering::{order_expression, OrderSpec},
};
use bastion_query_structure::{Filter, OrderBy, QueryArguments};
use bastion_schema::ModelDef;
use bastion_sql::ast::*;

/// Restricts a read to the rows at or after the cursor row in the final
/// ordering.
///
/// For orderings `o1..on` the condition is
///
/// ```text
///    (o1 > c1)
/// OR (o1 = c1 AND o2 > c2)
/// ...
/// OR (o1 = c1 AND .. AND on >= cn)
/// ```
///
/// where each `ci` is read from the cursor row with a scalar subquery, and
/// `>` flips to `<` for descending items. A cursor that matches no row yields
/// `NULL` comparisons and thus no rows.
pub(crate) fn cursor_condition(
    ctx: &Context<'_>,
    model: &ModelDef,
    alias: &Alias,
    args: &QueryArguments,
    specs: &[OrderSpec],
) -> Result<ConditionTree> {
    let Some(cursor) = &args.cursor else {
        return Ok(ConditionTree::NoCondition);
    };

    let cursor_alias = alias.derived("cursor");
    let cursor_filter = FilterVisitor::new(*ctx, model, cursor_alias.clone()).visit(&Filter::from_selection(cursor))?;

    let cursor_value = |order_by: &OrderBy| -> Result<Expression> {
        let expr = order_expression(ctx, model, &cursor_alias, order_by)?;
        let select = select_model(ctx, model, &cursor_alias)?
            .value(expr)
            .so_that(cursor_filter.clone());

        Ok(select.into())
    };

    let mut row_values = Vec::with_capacity(specs.len());

    for spec in specs {
        row_values.push((
            order_expression(ctx, model, alias, &spec.order_by)?,
            cursor_value(&spec.order_by)?,
            spec.order,
        ));
    }

    let mut alternatives = Vec::with_capacity(row_values.len());

    for (i, (row_value, cursor_value, order)) in row_values.iter().enumerate() {
        let last = i == row_values.len() - 1;
        let mut terms: Vec<Expression> = row_values[..i]
            .iter()
            .map(|(prefix, prefix_cursor, _)| prefix.clone().equals(prefix_cursor.clone()).into())
            .collect();

        let compare = match (order.is_ascending(), last) {
            (true, false) => row_value.clone().greater_than(cursor_value.clone()),
            (true, true) => row_value.clone().greater_than_or_equals(cursor_value.clone()),
            (false, false) => row_value.clone().less_than(cursor_value.clone()),
            (false, true) => row_value.clone().less_than_or_equals(cursor_value.clone()),
        };

        terms.push(compare.into());
        alternatives.push(ConditionTree::and(terms));
    }

    // Without any ordering the cursor only has to exist.
    if alternatives.is_empty() {
        let exists_cursor = select_model(ctx, model, &cursor_alias)?
            .value(raw("1"))
            .so_that(cursor_filter);

        return Ok(exists(exists_cursor).into());
    }

    Ok(ConditionTree::or(alternatives))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect_for, ordering::order_specs, ComputedFields};
    use bastion_query_structure::{SelectionResult, SortOrder};
    use bastion_schema::{FieldDef, Schema};
    use bastion_sql::{connector::Provider, visitor::build_for};
    use bastion_value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_on_a_single_ordering() {
        let schema = Schema::builder(Provider::Sqlite)
            .model(ModelDef::new("Post").with_field(FieldDef::new("id", "Int").id()))
            .build()
            .unwrap();

        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let args = QueryArguments {
            cursor: Some(SelectionResult::new(vec![("id".into(), Value::Int(3))])),
            order_by: vec![OrderBy::scalar("id", SortOrder::Descending)],
            ..Default::default()
        };

        let specs = order_specs(model, &args, true);
        let alias = Alias::new("Post");
        let condition = cursor_condition(&ctx, model, &alias, &args, &specs).unwrap();

        let (sql, params) = build_for(Provider::Sqlite, Select::from_table("Post").so_that(condition).into()).unwrap();

        assert_eq!(
            "SELECT * FROM `Post` WHERE `Post`.`id` <= (SELECT `Post$@cursor`.`id` FROM `Post` AS `Post$@cursor` \
             WHERE `Post$@cursor`.`id` = ?)",
            sql
        );
        assert_eq!(vec![Value::Int(3)], params);
    }
}
