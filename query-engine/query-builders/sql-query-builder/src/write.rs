use crate::{
    alias::Alias,
    context::Context,
    error::{QueryBuilderError, Result},
    filter::{filter_condition, FilterVisitor},
    model_extensions::{field_column, is_inherited, select_model, with_sub_model_joins},
    select::identifier_columns,
};
use bastion_query_structure::{Filter, SelectionResult, WriteArgs, WriteOperation};
use bastion_schema::{FieldDef, ModelDef, ResolvedRelation};
use bastion_sql::ast::*;
use bastion_value::Value;
use itertools::Itertools;

fn write_table(model: &ModelDef) -> Table {
    Table::from(model.table_name())
}

fn write_column(field: &FieldDef) -> Column {
    Column::new(field.column_name())
}

fn stored(ctx: &Context<'_>, field: &FieldDef, value: &Value) -> Expression {
    val(ctx.dialect.transform_primitive(value.clone(), field))
}

fn set_value<'v>(model: &ModelDef, field: &str, op: &'v WriteOperation) -> Result<&'v Value> {
    op.as_set().ok_or_else(|| {
        QueryBuilderError::invalid_filter(&model.name, field, "create data can only set values")
    })
}

/// The columns an insert returns to identify the new rows, or `None` when
/// the database has no `RETURNING`.
fn returned_identifier(ctx: &Context<'_>, model: &ModelDef) -> Result<Option<Vec<Column>>> {
    if !ctx.dialect.supports_returning() {
        return Ok(None);
    }

    let columns = model
        .primary_identifier()
        .into_iter()
        .map(|name| Ok(write_column(model.field(name)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(columns))
}

/// `INSERT` a single row of `model` into its own table.
///
/// The insert returns the primary identifier where `RETURNING` is available.
/// Elsewhere the caller falls back to the last inserted id.
pub fn create_record(ctx: &Context<'_>, model: &ModelDef, args: &WriteArgs) -> Result<Insert> {
    let mut insert = Insert::single_into(write_table(model));

    for (name, op) in args.iter() {
        let field = model.field(name)?;
        let value = set_value(model, name, op)?;

        insert = insert.value(write_column(field), stored(ctx, field, value));
    }

    Ok(match returned_identifier(ctx, model)? {
        Some(columns) => insert.returning(columns),
        None => insert,
    })
}

/// `INSERT` many rows of `model`.
///
/// Fields missing from a row are written as `NULL` when they are optional
/// without a default. Consecutive rows with the same remaining fields share
/// one statement, split so that no statement exceeds the bind parameter
/// limit of the database. Rows without any field are inserted one by one
/// with their defaults.
pub fn create_records(
    ctx: &Context<'_>,
    model: &ModelDef,
    rows: Vec<WriteArgs>,
    skip_duplicates: bool,
    returning: bool,
) -> Result<Vec<Insert>> {
    let returned = if returning {
        Some(returned_identifier(ctx, model)?.ok_or_else(|| {
            QueryBuilderError::unsupported(ctx.provider(), "returning rows from a bulk insert")
        })?)
    } else {
        None
    };

    let affected = affected_fields(model, &rows);
    let rows = rows
        .into_iter()
        .map(|row| uniform_row(ctx, model, &affected, row))
        .collect::<Result<Vec<_>>>()?;

    let finish = |insert: Insert| {
        let insert = match &returned {
            Some(columns) => insert.returning(columns.clone()),
            None => insert,
        };

        if skip_duplicates {
            insert.on_conflict(OnConflict::DoNothing)
        } else {
            insert
        }
    };

    let mut inserts = Vec::new();

    for (fields, run) in &rows.into_iter().chunk_by(|(fields, _)| fields.clone()) {
        if fields.is_empty() {
            inserts.extend(run.map(|_| finish(Insert::single_into(write_table(model)))));
            continue;
        }

        let max_rows = (ctx.dialect.max_bind_values() / fields.len()).max(1);
        let columns: Vec<Column> = fields.iter().map(|f| write_column(f)).collect();

        for batch in &run.chunks(max_rows) {
            let insert = batch.fold(
                Insert::multi_into(write_table(model), columns.clone()),
                |insert, (_, values)| insert.values(values),
            );

            inserts.push(finish(insert));
        }
    }

    Ok(inserts)
}

/// Fields written by any of the rows, in declaration order.
fn affected_fields<'a>(model: &'a ModelDef, rows: &[WriteArgs]) -> Vec<&'a FieldDef> {
    model
        .scalar_fields()
        .filter(|f| rows.iter().any(|row| row.contains(&f.name)))
        .collect()
}

fn uniform_row<'a>(
    ctx: &Context<'_>,
    model: &ModelDef,
    affected: &[&'a FieldDef],
    row: WriteArgs,
) -> Result<(Vec<&'a FieldDef>, Vec<Expression>)> {
    let mut fields = Vec::with_capacity(affected.len());
    let mut values = Vec::with_capacity(affected.len());

    for field in affected.iter().copied() {
        match row.get(&field.name) {
            Some(op) => {
                values.push(stored(ctx, field, set_value(model, &field.name, op)?));
                fields.push(field);
            }
            None if field.optional && field.default.is_none() => {
                values.push(val(Value::Null));
                fields.push(field);
            }
            None => (),
        }
    }

    Ok((fields, values))
}

/// `UPDATE` the rows of `model` matching `condition`. Columns are written
/// unqualified; the condition refers to the table by its name.
pub fn update_records(ctx: &Context<'_>, model: &ModelDef, args: &WriteArgs, condition: ConditionTree) -> Result<Update> {
    let mut update = Update::table(write_table(model));

    for (name, op) in args.iter() {
        let field = model.field(name)?;
        let column = write_column(field);

        let value: Expression = match op {
            WriteOperation::Set(value) => stored(ctx, field, value),
            WriteOperation::Increment(value) => SqlOp::add(column.clone(), stored(ctx, field, value)).into(),
            WriteOperation::Decrement(value) => SqlOp::sub(column.clone(), stored(ctx, field, value)).into(),
            WriteOperation::Multiply(value) => SqlOp::mul(column.clone(), stored(ctx, field, value)).into(),
            WriteOperation::Divide(value) => SqlOp::div(column.clone(), stored(ctx, field, value)).into(),
        };

        update = update.set(column, value);
    }

    Ok(update.so_that(condition))
}

/// `DELETE` the rows of `model` matching `condition`.
pub fn delete_records(model: &ModelDef, condition: ConditionTree) -> Delete {
    Delete::from_table(write_table(model)).so_that(condition)
}

/// Splits the fields stored in the base table of a delegate sub-model off
/// `args`. The own fields stay in `args`.
pub fn split_inherited(model: &ModelDef, args: &mut WriteArgs) -> WriteArgs {
    args.split_off(|name| model.find_field(name).map(|f| is_inherited(model, f)).unwrap_or(false))
}

/// The condition selecting the rows of a bulk write on `model`.
///
/// Plain filters apply directly to the written table. With a `limit`, or
/// for sub-models whose inherited fields live in the base table, the rows
/// are picked by identifier through a derived table:
///
/// ```sql
/// Post.id IN (SELECT Post$@limit.id FROM (SELECT Post.id FROM Post AS Post WHERE .. LIMIT ?) AS Post$@limit)
/// ```
///
/// The derived table also keeps MySQL from rejecting a subquery over the
/// table being written.
pub fn limited_condition(ctx: &Context<'_>, model: &ModelDef, filter: &Filter, limit: Option<i64>) -> Result<ConditionTree> {
    if limit.is_none() && model.base_model.is_none() {
        return filter_condition(ctx, model, filter);
    }

    let alias = Alias::new(model.table_name());
    let ids = identifier_columns(model, &alias)?;
    let limit_alias = alias.derived("limit");

    let select = select_model(ctx, model, &alias)?;
    let select = with_sub_model_joins(ctx, model, &alias, select)?;
    let mut inner = ids
        .iter()
        .fold(select, |select, column| select.value(Expression::from(column.clone()).alias(column.name.as_str())))
        .so_that(FilterVisitor::new(*ctx, model, alias.clone()).visit(filter)?);

    if let Some(limit) = limit {
        inner = inner.limit(limit);
    }

    let outer = ids.iter().fold(
        Select::from_table(Table::from(inner).alias(&limit_alias)),
        |select, column| select.column(Column::new(column.name.as_str()).table(&limit_alias)),
    );

    let target: Expression = match ids.as_slice() {
        [single] => single.clone().into(),
        many => row(many.iter().cloned()),
    };

    Ok(target.in_selection(outer).into())
}

/// The condition matching the rows with the given identifiers.
pub fn id_condition(ctx: &Context<'_>, model: &ModelDef, ids: &[SelectionResult]) -> Result<ConditionTree> {
    let alias = Alias::new(model.table_name());
    let fields = model
        .primary_identifier()
        .into_iter()
        .map(|name| model.field(name))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let value_of = |id: &SelectionResult, field: &FieldDef| -> Result<Expression> {
        id.get(&field.name)
            .map(|value| stored(ctx, field, value))
            .ok_or_else(|| QueryBuilderError::MalformedResult(format!("missing identifier `{}`", field.name)))
    };

    if let [field] = fields.as_slice() {
        let column = field_column(model, field, &alias);
        let values = ids.iter().map(|id| value_of(id, field)).collect::<Result<Vec<_>>>()?;

        return Ok(column.in_selection(row(values)).into());
    }

    let mut alternatives = Vec::with_capacity(ids.len());

    for id in ids {
        let mut parts = Vec::with_capacity(fields.len());

        for field in fields.iter() {
            let column = field_column(model, field, &alias);
            parts.push(column.equals(value_of(id, field)?));
        }

        alternatives.push(ConditionTree::and(parts));
    }

    Ok(ConditionTree::or(alternatives))
}

fn join_ids<'a>(rel: &ResolvedRelation<'a>) -> Result<(&'a FieldDef, &'a FieldDef)> {
    match (rel.source_id(), rel.target_id()) {
        (Some(source), Some(target)) => Ok((source, target)),
        _ => Err(QueryBuilderError::invalid_filter(
            &rel.source.name,
            &rel.field.name,
            "many-to-many relations need single-field ids on both sides",
        )),
    }
}

fn join_table_of<'r>(rel: &'r ResolvedRelation<'_>) -> Result<&'r bastion_schema::JoinTable> {
    rel.join_table().ok_or_else(|| {
        QueryBuilderError::invalid_filter(&rel.source.name, &rel.field.name, "not a many-to-many relation")
    })
}

/// Links `parent` to each of `children` in the join table of a many-to-many
/// relation. Existing links are kept.
pub fn insert_join_rows(ctx: &Context<'_>, rel: &ResolvedRelation<'_>, parent: &Value, children: &[Value]) -> Result<Insert> {
    let join_table = join_table_of(rel)?;
    let (source_id, target_id) = join_ids(rel)?;

    let columns = [
        Column::new(join_table.self_column.as_str()),
        Column::new(join_table.other_column.as_str()),
    ];

    let insert = children.iter().fold(
        Insert::multi_into(join_table.name.as_str(), columns),
        |insert, child| insert.values([stored(ctx, source_id, parent), stored(ctx, target_id, child)]),
    );

    Ok(insert.on_conflict(OnConflict::DoNothing))
}

/// Unlinks `parent` from `children`, or from every related row when
/// `children` is `None`.
pub fn delete_join_rows(
    ctx: &Context<'_>,
    rel: &ResolvedRelation<'_>,
    parent: &Value,
    children: Option<&[Value]>,
) -> Result<Delete> {
    let join_table = join_table_of(rel)?;
    let (source_id, target_id) = join_ids(rel)?;

    let mut condition: ConditionTree = Column::new(join_table.self_column.as_str())
        .equals(stored(ctx, source_id, parent))
        .into();

    if let Some(children) = children {
        let values = children.iter().map(|child| stored(ctx, target_id, child));
        condition = condition.and_with(Column::new(join_table.other_column.as_str()).in_selection(row(values)).into());
    }

    Ok(Delete::from_table(join_table.name.as_str()).so_that(condition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect_for, ComputedFields};
    use bastion_query_structure::ScalarCondition;
    use bastion_schema::{RelationInfo, Schema};
    use bastion_sql::{connector::Provider, visitor::build_for};
    use pretty_assertions::assert_eq;

    fn schema_for(provider: Provider) -> Schema {
        Schema::builder(provider)
            .model(
                ModelDef::new("Post")
                    .with_field(FieldDef::new("id", "Int").id().default_call("autoincrement"))
                    .with_field(FieldDef::new("title", "String"))
                    .with_field(FieldDef::new("subtitle", "String").optional())
                    .with_field(FieldDef::new("views", "Int").default_literal(serde_json::json!(0)))
                    .with_field(FieldDef::new("published", "Boolean").default_literal(serde_json::json!(false)))
                    .with_field(
                        FieldDef::new("tags", "Tag")
                            .array()
                            .relation(RelationInfo::back().opposite("posts")),
                    ),
            )
            .model(
                ModelDef::new("Tag")
                    .with_field(FieldDef::new("id", "Int").id())
                    .with_field(
                        FieldDef::new("posts", "Post")
                            .array()
                            .relation(RelationInfo::back().opposite("tags")),
                    ),
            )
            .build()
            .unwrap()
    }

    fn args(pairs: &[(&str, Value)]) -> WriteArgs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn single_inserts_return_the_identifier() {
        let schema = schema_for(Provider::Sqlite);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let insert = create_record(&ctx, model, &args(&[("title", "a".into()), ("published", true.into())])).unwrap();
        let (sql, params) = build_for(Provider::Sqlite, insert.into()).unwrap();

        assert_eq!("INSERT INTO `Post` (`title`, `published`) VALUES (?, ?) RETURNING `id`", sql);
        assert_eq!(vec![Value::from("a"), Value::Int(1)], params);

        let schema = schema_for(Provider::Mysql);
        let ctx = Context::new(&schema, dialect_for(Provider::Mysql), &computed);
        let insert = create_record(&ctx, schema.model("Post").unwrap(), &args(&[("title", "a".into())])).unwrap();

        assert_eq!(None, insert.returning);
    }

    #[test]
    fn bulk_inserts_group_rows_by_their_fields() {
        let schema = schema_for(Provider::Sqlite);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let rows = vec![
            args(&[("title", "a".into())]),
            args(&[("title", "b".into()), ("subtitle", "s".into())]),
            args(&[("title", "c".into()), ("views", 3.into())]),
            WriteArgs::new(),
        ];

        let inserts = create_records(&ctx, model, rows, true, false).unwrap();
        let sql: Vec<String> = inserts
            .into_iter()
            .map(|insert| build_for(Provider::Sqlite, insert.into()).unwrap().0)
            .collect();

        assert_eq!(
            vec![
                "INSERT INTO `Post` (`title`, `subtitle`) VALUES (?, ?), (?, ?) ON CONFLICT DO NOTHING",
                "INSERT INTO `Post` (`title`, `subtitle`, `views`) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
                "INSERT INTO `Post` (`subtitle`) VALUES (?) ON CONFLICT DO NOTHING",
            ],
            sql
        );
    }

    #[test]
    fn bulk_returning_needs_database_support() {
        let schema = schema_for(Provider::Mysql);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Mysql), &computed);

        let result = create_records(&ctx, schema.model("Post").unwrap(), vec![WriteArgs::new()], false, true);

        assert!(matches!(result, Err(QueryBuilderError::Unsupported { .. })));
    }

    #[test]
    fn atomic_number_updates() {
        let schema = schema_for(Provider::Postgres);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Postgres), &computed);
        let model = schema.model("Post").unwrap();

        let mut data = WriteArgs::new();
        data.insert("views", WriteOperation::Increment(Value::Int(2)));
        data.set("title", "b".into());

        let condition = filter_condition(&ctx, model, &Filter::scalar("id", ScalarCondition::Equals(Value::Int(1).into()))).unwrap();
        let update = update_records(&ctx, model, &data, condition).unwrap();
        let (sql, params) = build_for(Provider::Postgres, update.into()).unwrap();

        assert_eq!(
            r#"UPDATE "Post" SET "views" = ("views" + $1), "title" = $2 WHERE "Post"."id" = $3"#,
            sql
        );
        assert_eq!(vec![Value::Int(2), Value::from("b"), Value::Int(1)], params);
    }

    #[test]
    fn limited_bulk_writes_pick_rows_by_id() {
        let schema = schema_for(Provider::Sqlite);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let model = schema.model("Post").unwrap();

        let filter = Filter::scalar("published", ScalarCondition::Equals(Value::Boolean(false).into()));
        let condition = limited_condition(&ctx, model, &filter, Some(2)).unwrap();
        let (sql, params) = build_for(Provider::Sqlite, delete_records(model, condition).into()).unwrap();

        assert_eq!(
            "DELETE FROM `Post` WHERE `Post`.`id` IN (SELECT `Post$@limit`.`id` FROM (SELECT `Post`.`id` AS `id` \
             FROM `Post` AS `Post` WHERE `Post`.`published` = ? LIMIT ?) AS `Post$@limit`)",
            sql
        );
        assert_eq!(vec![Value::Int(0), Value::Int(2)], params);
    }

    #[test]
    fn join_table_rows() {
        let schema = schema_for(Provider::Sqlite);
        let computed = ComputedFields::default();
        let ctx = Context::new(&schema, dialect_for(Provider::Sqlite), &computed);
        let rel = schema.relation("Post", "tags").unwrap();

        let insert = insert_join_rows(&ctx, &rel, &Value::Int(1), &[Value::Int(7), Value::Int(8)]).unwrap();
        let (sql, params) = build_for(Provider::Sqlite, insert.into()).unwrap();

        assert_eq!("INSERT INTO `_PostToTag` (`A`, `B`) VALUES (?, ?), (?, ?) ON CONFLICT DO NOTHING", sql);
        assert_eq!(vec![Value::Int(1), Value::Int(7), Value::Int(1), Value::Int(8)], params);

        let delete = delete_join_rows(&ctx, &rel, &Value::Int(1), None).unwrap();
        let (sql, _) = build_for(Provider::Sqlite, delete.into()).unwrap();

        assert_eq!("DELETE FROM `_PostToTag` WHERE `A` = ?", sql);
    }
}
