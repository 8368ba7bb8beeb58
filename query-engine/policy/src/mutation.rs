//! Guards of the statements that write rows.
//!
//! Updates and deletes only touch the rows their policy allows; the guard is
//! a condition added to the statement. Inserts are checked before they run
//! by evaluating the create policy against the row as it would be stored.

use crate::{compiler::PolicyCompiler, Result};
use bastion_core::{request_now, CrudError, RejectionReason, SqlContext};
use bastion_query_structure::{coerce_field, SelectionResult};
use bastion_schema::{DefaultValue, FieldDef, ModelDef, PolicyOperation, ResolvedRelation};
use bastion_sql::ast::*;
use bastion_sql_query_builder::{field_column, id_condition, model_table, select_model, Alias};
use bastion_value::Value;

/// What a statement writes to.
pub(crate) enum Target<'a> {
    Model(&'a ModelDef),
    /// The link table of a many-to-many relation, seen from the model whose
    /// id is in its first column.
    JoinTable(ResolvedRelation<'a>),
    Unknown(String),
}

pub(crate) fn target_of<'a>(compiler: &PolicyCompiler<'a>, table: &Table) -> Target<'a> {
    let Some(name) = table.name() else {
        return Target::Unknown(String::from("<derived>"));
    };

    let schema = compiler.schema();

    if let Some(model) = schema.model_by_table(name) {
        return Target::Model(model);
    }

    match schema.join_table_relation(name) {
        Some(rel) => Target::JoinTable(rel),
        None => Target::Unknown(name.to_owned()),
    }
}

fn rejected(table: &str, reason: RejectionReason) -> CrudError {
    tracing::debug!(table, ?reason, "write rejected by policy");
    CrudError::rejected(table, reason)
}

/// Runs a `SELECT COUNT(*) ..` built around `select`.
async fn count(ctx: &SqlContext<'_>, select: Select) -> Result<i64> {
    let result = ctx.query_direct(Query::from(select.value(count_all()))).await?;

    Ok(result
        .rows
        .first()
        .and_then(|row| row.at(0).and_then(Value::as_i64))
        .unwrap_or(0))
}

/// Checks every row of an insert against the create policy of its model, or
/// for link rows, the update policy of both linked records.
pub(crate) async fn check_insert(compiler: &PolicyCompiler<'_>, ctx: &SqlContext<'_>, insert: &Insert) -> Result<()> {
    match target_of(compiler, &insert.table) {
        Target::Model(model) => {
            for values in insert.values.iter() {
                check_created_row(compiler, ctx, model, &insert.columns, values).await?;
            }

            Ok(())
        }
        Target::JoinTable(rel) => {
            let Some(join_table) = rel.join_table() else {
                return Err(CrudError::internal("many-to-many relation without a join table"));
            };

            let position = |name: &str| insert.columns.iter().position(|column| column.name == name);

            let (Some(source_idx), Some(target_idx)) =
                (position(&join_table.self_column), position(&join_table.other_column))
            else {
                return Err(rejected(&join_table.name, RejectionReason::NoAccess));
            };

            for values in insert.values.iter() {
                let (Some(source), Some(target)) = (values.get(source_idx), values.get(target_idx)) else {
                    return Err(rejected(&join_table.name, RejectionReason::NoAccess));
                };

                let source_ok = updatable(compiler, ctx, rel.source, source.clone()).await?;
                let target_ok = updatable(compiler, ctx, rel.target, target.clone()).await?;

                if !(source_ok && target_ok) {
                    return Err(rejected(&join_table.name, RejectionReason::NoAccess));
                }
            }

            Ok(())
        }
        Target::Unknown(name) => Err(rejected(&name, RejectionReason::NoAccess)),
    }
}

/// The row is evaluated as a derived table with one column per stored field:
///
/// ```sql
/// SELECT COUNT(*) FROM (SELECT ? AS id, ? AS title ..) AS Post WHERE <create policy>
/// ```
async fn check_created_row(
    compiler: &PolicyCompiler<'_>,
    ctx: &SqlContext<'_>,
    model: &ModelDef,
    columns: &[Column],
    values: &[Expression],
) -> Result<()> {
    let alias = Alias::new(model.table_name());

    let candidate = model.own_scalar_fields().fold(Select::default(), |select, field| {
        let given = columns
            .iter()
            .position(|column| column.name == field.column_name())
            .and_then(|idx| values.get(idx))
            .filter(|expr| !matches!(expr.kind, ExpressionKind::Default));

        let value = match given {
            Some(expr) => expr.clone(),
            None => default_value(compiler, field),
        };

        select.value(value.alias(field.column_name()))
    });

    let mut select = Select::from_table(Table::from(candidate).alias(&alias));

    if let Some(base) = compiler.schema().base_model(model) {
        let base_alias = alias.base();
        let mut on = Vec::with_capacity(model.id_fields.len());

        for name in model.id_fields.iter() {
            let own = model.field(name)?;
            let inherited = base.field(name)?;

            on.push(
                Column::new(own.column_name())
                    .table(&alias)
                    .equals(Column::new(inherited.column_name()).table(&base_alias)),
            );
        }

        select = select.inner_join(model_table(base, &base_alias).on(ConditionTree::and(on)));
    }

    let condition = compiler.policy(model, PolicyOperation::Create, &alias)?;

    if condition.is_no_condition() {
        return Ok(());
    }

    if condition.is_negative() || count(ctx, select.so_that(condition)).await? == 0 {
        return Err(rejected(&model.name, RejectionReason::NoAccess));
    }

    Ok(())
}

/// The value a column gets when the insert leaves it out. Generated values
/// other than timestamps are not known before the insert and read as `NULL`.
fn default_value(compiler: &PolicyCompiler<'_>, field: &FieldDef) -> Expression {
    let dialect = compiler.context().dialect;

    let value = match &field.default {
        Some(DefaultValue::Literal(json)) => coerce_field(compiler.schema(), field, json).ok(),
        Some(DefaultValue::Call { call, .. }) if call == "now" => Some(Value::DateTime(request_now())),
        _ if field.updated_at => Some(Value::DateTime(request_now())),
        _ => None,
    };

    match value {
        Some(value) => val(dialect.transform_primitive(value, field)),
        None => val(Value::Null),
    }
}

/// Whether the row of `model` with the single id `id` exists and may be
/// updated.
async fn updatable(compiler: &PolicyCompiler<'_>, ctx: &SqlContext<'_>, model: &ModelDef, id: Expression) -> Result<bool> {
    let Some(id_field) = model.single_id() else {
        return Ok(false);
    };

    let alias = Alias::new(model.table_name()).derived("link");
    let condition = compiler.policy(model, PolicyOperation::Update, &alias)?;

    if condition.is_negative() {
        return Ok(false);
    }

    let select = select_model(compiler.context(), model, &alias)?
        .so_that(field_column(model, id_field, &alias).equals(id))
        .and_where(condition);

    Ok(count(ctx, select).await? > 0)
}

/// `SELECT id FROM Model AS alias WHERE <update policy>`, the ids of the
/// records a link may be changed for.
fn updatable_ids(compiler: &PolicyCompiler<'_>, model: &ModelDef, alias: &Alias) -> Result<Select> {
    let id_field = model
        .single_id()
        .ok_or_else(|| CrudError::internal(format!("`{}` has no single id to link by", model.name)))?;

    let condition = compiler.policy(model, PolicyOperation::Update, alias)?;

    Ok(select_model(compiler.context(), model, alias)?
        .column(field_column(model, id_field, alias))
        .so_that(condition))
}

/// The condition restricting an update or delete of `model` to the rows
/// the policy of `operation` allows. Columns of the written table are
/// qualified by its name.
pub(crate) fn write_condition(
    compiler: &PolicyCompiler<'_>,
    model: &ModelDef,
    operation: PolicyOperation,
) -> Result<ConditionTree> {
    let table = Alias::new(model.table_name());

    if compiler.schema().base_model(model).is_none() {
        return compiler.policy(model, operation, &table);
    }

    // Inherited fields are only reachable through a join with the base table.
    let alias = table.derived("guard");
    let condition = compiler.policy(model, operation, &alias)?;

    if condition.is_no_condition() || condition.is_negative() {
        return Ok(condition);
    }

    let same_row = model
        .id_fields()
        .into_iter()
        .map(|field| field_column(model, field, &alias).equals(field_column(model, field, &table)))
        .collect::<Vec<_>>();

    let guard = select_model(compiler.context(), model, &alias)?
        .value(raw("1"))
        .so_that(ConditionTree::and(same_row))
        .and_where(condition);

    Ok(exists(guard).into())
}

pub(crate) fn guard_update(compiler: &PolicyCompiler<'_>, update: Update) -> Result<Update> {
    match target_of(compiler, &update.table) {
        Target::Model(model) => {
            let condition = write_condition(compiler, model, PolicyOperation::Update)?;
            Ok(update.and_where(condition))
        }
        Target::JoinTable(rel) => Err(rejected(rel.field.name.as_str(), RejectionReason::NoAccess)),
        Target::Unknown(name) => Err(rejected(&name, RejectionReason::NoAccess)),
    }
}

pub(crate) fn guard_delete(compiler: &PolicyCompiler<'_>, delete: Delete) -> Result<Delete> {
    match target_of(compiler, &delete.table) {
        Target::Model(model) => {
            let condition = write_condition(compiler, model, PolicyOperation::Delete)?;
            Ok(delete.and_where(condition))
        }
        Target::JoinTable(rel) => {
            let Some(join_table) = rel.join_table() else {
                return Err(CrudError::internal("many-to-many relation without a join table"));
            };

            let source_alias = Alias::new(join_table.name.as_str()).derived("source");
            let target_alias = Alias::new(join_table.name.as_str()).derived("target");

            let source = updatable_ids(compiler, rel.source, &source_alias)?;
            let target = updatable_ids(compiler, rel.target, &target_alias)?;

            let condition = ConditionTree::and([
                Column::new(join_table.self_column.as_str())
                    .table(join_table.name.as_str())
                    .in_selection(source),
                Column::new(join_table.other_column.as_str())
                    .table(join_table.name.as_str())
                    .in_selection(target),
            ]);

            Ok(delete.and_where(condition))
        }
        Target::Unknown(name) => Err(rejected(&name, RejectionReason::NoAccess)),
    }
}

/// Identifiers of the rows an update is about to change, as they will be
/// after the update.
pub(crate) async fn updated_ids(
    compiler: &PolicyCompiler<'_>,
    ctx: &SqlContext<'_>,
    model: &ModelDef,
    update: &Update,
) -> Result<Vec<SelectionResult>> {
    let table = model.table_name();
    let id_fields = model.id_fields();

    let select = id_fields.iter().fold(Select::from_table(table), |select, field| {
        select.column(Column::new(field.column_name()).table(table))
    });

    let select = match update.conditions.clone() {
        Some(conditions) => select.so_that(conditions),
        None => select,
    };

    // Ids set to a constant by the update itself.
    let reassigned: Vec<(&str, Value)> = update
        .columns
        .iter()
        .zip(update.values.iter())
        .filter_map(|(column, value)| match &value.kind {
            ExpressionKind::Parameterized(value) => Some((column.name.as_str(), value.clone())),
            _ => None,
        })
        .collect();

    let dialect = compiler.context().dialect;
    let result = ctx.query_direct(Query::from(select)).await?;
    let mut ids = Vec::with_capacity(result.rows.len());

    for row in result.rows {
        let mut pairs = Vec::with_capacity(id_fields.len());

        for field in id_fields.iter() {
            let stored = reassigned
                .iter()
                .find(|(column, _)| *column == field.column_name())
                .map(|(_, value)| value.clone())
                .or_else(|| row.get(field.column_name()).cloned())
                .unwrap_or(Value::Null);

            let value = dialect.read_column(compiler.schema(), field, stored)?;
            pairs.push((field.name.clone(), value));
        }

        ids.push(SelectionResult::new(pairs));
    }

    Ok(ids)
}

/// Rejects the update unless every updated row passes the `post-update`
/// rules in its new state.
pub(crate) async fn check_post_update(
    compiler: &PolicyCompiler<'_>,
    ctx: &SqlContext<'_>,
    model: &ModelDef,
    ids: &[SelectionResult],
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let alias = Alias::new(model.table_name());
    let condition = compiler.policy(model, PolicyOperation::PostUpdate, &alias)?;

    if condition.is_no_condition() {
        return Ok(());
    }

    let select = select_model(compiler.context(), model, &alias)?
        .so_that(id_condition(compiler.context(), model, ids)?)
        .and_where(condition);

    let passing = count(ctx, select).await?;

    if passing < ids.len() as i64 {
        return Err(rejected(&model.name, RejectionReason::NoAccess));
    }

    Ok(())
}
