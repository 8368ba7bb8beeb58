use crate::{
    alias::Alias,
    context::Context,
    cursor_condition::cursor_condition,
    error::Result,
    filter::FilterVisitor,
    model_extensions::{field_column, field_expression, relation_condition, select_model, with_sub_model_joins},
    ordering::{order_specs, with_ordering, OrderSpec},
    COUNT_KEY, DELEGATE_KEY_PREFIX,
};
use bastion_query_structure::{FieldSelection, QueryArguments, RelationCount, RelationSelection};
use bastion_schema::{ModelDef, ResolvedRelation};
use bastion_sql::ast::*;

/// A read of `model` rows as one statement.
#[derive(Debug, Clone)]
pub struct ReadQuery {
    pub select: Select,
    /// Rows come back in reverse order (negative `take`).
    pub reversed: bool,
    /// Distinct and pagination are left to [`crate::apply_in_memory`].
    pub in_memory: bool,
}

/// Builds the read of `model` rows matching `args`, with the scalars,
/// relations and relation counts of `selection` as result columns named
/// after the fields.
///
/// Relation columns hold JSON built by the dialect. Delegate bases get a
/// `$delegate$<Model>` JSON column per concrete sub-model.
pub fn select_records(
    ctx: &Context<'_>,
    model: &ModelDef,
    args: &QueryArguments,
    selection: &FieldSelection,
) -> Result<ReadQuery> {
    let alias = Alias::new(model.table_name());
    let supports_distinct_on = ctx.dialect.supports_distinct_on();
    let in_memory = args.requires_inmemory_distinct(supports_distinct_on);
    let distinct_on = supports_distinct_on && !args.distinct.is_empty();

    let specs = order_specs(model, args, true);
    let select = filtered_select(ctx, model, &alias, args, &specs, distinct_on)?;
    let (mut select, columns) = selection_columns(ctx, model, &alias, selection, select, false)?;

    for (name, expr) in columns {
        select = select.value(expr.alias(name));
    }

    if !in_memory {
        select = paginate(select, args.skip, args.take_abs());
    }

    Ok(ReadQuery {
        select,
        reversed: args.needs_reversed_order(),
        in_memory,
    })
}

/// `FROM`, joins, `WHERE` and `ORDER BY` of a read, without columns.
pub(crate) fn filtered_select(
    ctx: &Context<'_>,
    model: &ModelDef,
    alias: &Alias,
    args: &QueryArguments,
    specs: &[OrderSpec],
    distinct_on: bool,
) -> Result<Select> {
    let select = select_model(ctx, model, alias)?;
    let select = with_sub_model_joins(ctx, model, alias, select)?;

    let filter = match &args.filter {
        Some(filter) => FilterVisitor::new(*ctx, model, alias.clone()).visit(filter)?,
        None => ConditionTree::NoCondition,
    };

    let cursor = cursor_condition(ctx, model, alias, args, specs)?;
    let select = select.so_that(filter.and_with(cursor));
    let distinct = distinct_on.then_some(args.distinct.as_slice());

    with_ordering(ctx, model, alias, specs, distinct, select)
}

pub(crate) fn paginate(mut select: Select, skip: Option<i64>, take: Option<i64>) -> Select {
    if let Some(take) = take {
        select = select.limit(take);
    }

    if let Some(skip) = skip.filter(|s| *s > 0) {
        select = select.offset(skip);
    }

    select
}

/// The named values of a selection for the row aliased `alias`. With
/// `embedded`, scalars are converted for use inside a JSON object.
///
/// Relations may add joins, so the select is threaded through.
pub(crate) fn selection_columns(
    ctx: &Context<'_>,
    model: &ModelDef,
    alias: &Alias,
    selection: &FieldSelection,
    mut select: Select,
    embedded: bool,
) -> Result<(Select, Vec<(String, Expression)>)> {
    let mut pairs = Vec::with_capacity(selection.scalars.len() + selection.relations.len() + 1);

    for name in &selection.scalars {
        let field = model.field(name)?;
        let expr = field_expression(ctx, model, field, alias)?;

        let expr = if embedded {
            ctx.dialect.json_column(ctx.schema, field, expr)
        } else {
            expr
        };

        pairs.push((name.clone(), expr));
    }

    for relation in &selection.relations {
        let rel = ctx.relation(model, &relation.field)?;
        let (next, expr) = ctx.dialect.build_relation_selection(ctx, select, &rel, relation, alias)?;

        select = next;
        pairs.push((relation.field.clone(), expr));
    }

    if !selection.counts.is_empty() {
        pairs.push((COUNT_KEY.to_owned(), count_object(ctx, model, alias, &selection.counts)?));
    }

    if model.is_delegate {
        for sub in ctx.schema.sub_models(model) {
            let sub_alias = alias.sub_model(&sub.name);
            let fields = sub
                .own_scalar_fields()
                .filter(|f| !sub.id_fields.contains(&f.name))
                .map(|f| {
                    let column = Column::new(f.column_name()).table(&sub_alias);
                    (f.name.clone(), ctx.dialect.json_column(ctx.schema, f, column.into()))
                })
                .collect();

            pairs.push((format!("{DELEGATE_KEY_PREFIX}{}", sub.name), json_object(fields).into()));
        }
    }

    Ok((select, pairs))
}

// json_object('posts', (SELECT COUNT(*) FROM Post AS User$posts WHERE ..), ..)
fn count_object(ctx: &Context<'_>, model: &ModelDef, alias: &Alias, counts: &[RelationCount]) -> Result<Expression> {
    let mut pairs = Vec::with_capacity(counts.len());

    for count in counts {
        let rel = ctx.relation(model, &count.field)?;
        let child = alias.child(&count.field);
        let filter = FilterVisitor::new(*ctx, rel.target, child.clone()).visit(&count.filter)?;

        let counted = select_model(ctx, rel.target, &child)?
            .value(count_all())
            .so_that(relation_condition(&rel, alias, &child)?)
            .and_where(filter);

        pairs.push((count.field.clone(), counted.into()));
    }

    Ok(json_object(pairs).into())
}

/// The parts of a nested relation read that every dialect shares.
#[derive(Debug)]
pub(crate) struct RelationQuery {
    /// Related rows of one parent row: `FROM`, joins, `WHERE`, `ORDER BY`.
    pub select: Select,
    /// The JSON object of one related row.
    pub object: Expression,
    pub alias: Alias,
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

impl RelationQuery {
    pub(crate) fn is_bounded(&self) -> bool {
        !self.select.ordering.is_empty() || self.skip.is_some() || self.take.is_some()
    }
}

pub(crate) fn relation_query(
    ctx: &Context<'_>,
    rel: &ResolvedRelation<'_>,
    relation: &RelationSelection,
    parent: &Alias,
) -> Result<RelationQuery> {
    let alias = parent.child(&rel.field.name);
    let args = &relation.args;
    let specs = order_specs(rel.target, args, rel.is_to_many());

    let select = filtered_select(ctx, rel.target, &alias, args, &specs, false)?
        .and_where(relation_condition(rel, parent, &alias)?);

    let (select, pairs) = selection_columns(ctx, rel.target, &alias, &relation.selection, select, true)?;

    // Nested distinct always runs on the read records, and pagination with it.
    let (skip, take) = if args.distinct.is_empty() {
        (args.skip, args.take_abs())
    } else {
        (None, None)
    };

    Ok(RelationQuery {
        select,
        object: json_object(pairs).into(),
        alias,
        skip,
        take,
    })
}

/// The primary identifier columns of `model` rows aliased `alias`.
pub(crate) fn identifier_columns(model: &ModelDef, alias: &Alias) -> Result<Vec<Column>> {
    model
        .primary_identifier()
        .into_iter()
        .map(|name| Ok(field_column(model, model.field(name)?, alias)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect_for, ComputedFields};
    use bastion_query_structure::{Filter, OrderBy, ScalarCondition, SortOrder};
    use bastion_schema::{FieldDef, RelationInfo, Schema};
    use bastion_sql::{connector::Provider, visitor::build_for};
    use bastion_value::Value;
    use pretty_assertions::assert_eq;

    fn schema(provider: Provider) -> Schema {
        Schema::builder(provider)
            .model(
                ModelDef::new("User")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("name", "String"))
                    .with_field(FieldDef::new("posts", "Post").array().relation(RelationInfo::back())),
            )
            .model(
                ModelDef::new("Post")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(FieldDef::new("title", "String"))
                    .with_field(FieldDef::new("authorId", "Int"))
                    .with_field(FieldDef::new("author", "User").relation(RelationInfo::owned(["authorId"], ["id"]))),
            )
            .build()
            .unwrap()
    }

    fn build(provider: Provider, model: &str, args: QueryArguments, selection: FieldSelection) -> (String, Vec<Value>) {
        let schema = schema(provider);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(provider), &computed);
        let model = schema.model(model).unwrap();

        let read = select_records(&ctx, model, &args, &selection).unwrap();
        build_for(provider, read.select.into()).unwrap()
    }

    fn posts_selection(take: Option<i64>) -> FieldSelection {
        FieldSelection {
            scalars: vec!["id".into()],
            relations: vec![RelationSelection {
                field: "posts".into(),
                args: QueryArguments {
                    take,
                    ..Default::default()
                },
                selection: FieldSelection::scalars(["title"]),
            }],
            counts: vec![],
        }
    }

    #[test]
    fn scalar_reads() {
        let args = QueryArguments {
            filter: Some(Filter::scalar("name", ScalarCondition::Equals(Value::from("a").into()))),
            order_by: vec![OrderBy::scalar("name", SortOrder::Ascending)],
            skip: Some(1),
            take: Some(-2),
            ..Default::default()
        };

        let (sql, params) = build(Provider::Sqlite, "User", args, FieldSelection::scalars(["id", "name"]));

        assert_eq!(
            "SELECT `User`.`id` AS `id`, `User`.`name` AS `name` FROM `User` AS `User` \
             WHERE `User`.`name` = ? ORDER BY `User`.`name` DESC, `User`.`id` DESC LIMIT ? OFFSET ?",
            sql
        );
        assert_eq!(vec![Value::from("a"), Value::Int(2), Value::Int(1)], params);
    }

    #[test]
    fn sqlite_nests_relations_in_subqueries() {
        let (sql, _) = build(Provider::Sqlite, "User", QueryArguments::default(), posts_selection(None));

        assert_eq!(
            "SELECT `User`.`id` AS `id`, json((SELECT COALESCE(json_group_array(json(`User$posts$@agg`.`__bastion_data__`)), json('[]')) \
             FROM (SELECT json_object('title', `User$posts`.`title`) AS `__bastion_data__` FROM `Post` AS `User$posts` \
             WHERE `User`.`id` = `User$posts`.`authorId`) AS `User$posts$@agg`)) AS `posts` FROM `User` AS `User`",
            sql
        );
    }

    #[test]
    fn postgres_nests_relations_in_lateral_joins() {
        let (sql, params) = build(Provider::Postgres, "User", QueryArguments::default(), posts_selection(Some(1)));

        assert!(sql.contains(r#"LEFT JOIN LATERAL (SELECT COALESCE(JSONB_AGG("User$posts$@agg"."__bastion_data__")"#), "{sql}");
        assert!(sql.contains(r#"AS "User$posts$@rel" ON 1=1"#), "{sql}");
        assert!(sql.starts_with(r#"SELECT "User"."id" AS "id", "User$posts$@rel"."__bastion_data__" AS "posts""#), "{sql}");
        assert_eq!(vec![Value::Int(1)], params);
    }

    #[test]
    fn counts_are_json_objects() {
        let selection = FieldSelection {
            scalars: vec!["id".into()],
            relations: vec![],
            counts: vec![RelationCount {
                field: "posts".into(),
                filter: Filter::Empty,
            }],
        };

        let (sql, _) = build(Provider::Sqlite, "User", QueryArguments::default(), selection);

        assert_eq!(
            "SELECT `User`.`id` AS `id`, json_object('posts', (SELECT COUNT(*) FROM `Post` AS `User$posts` \
             WHERE `User`.`id` = `User$posts`.`authorId`)) AS `_count` FROM `User` AS `User`",
            sql
        );
    }
}
