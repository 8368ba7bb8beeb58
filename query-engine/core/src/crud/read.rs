use super::{identifier, Executor};
use crate::{
    error::{CrudError, RejectionReason},
    operation::Operation,
    query_document::FindArgs,
};
use bastion_query_structure::{FieldSelection, Filter, QueryArguments, SelectionResult};
use bastion_schema::ModelDef;
use bastion_sql_query_builder::{apply_in_memory, read_records, select_records};
use bastion_value::Value;

pub(crate) async fn find(exec: &Executor, model: &ModelDef, find: FindArgs) -> Result<Value, CrudError> {
    let FindArgs { mut args, selection } = find;
    let operation = exec.operation();

    if operation == Operation::FindMany {
        return Ok(Value::List(read_many(exec, model, &args, &selection).await?));
    }

    args.take = Some(if args.take.unwrap_or(1) < 0 { -1 } else { 1 });

    match read_many(exec, model, &args, &selection).await?.into_iter().next() {
        Some(record) => Ok(record),
        None if operation.throws_if_not_found() => Err(CrudError::not_found(&model.name)),
        None => Ok(Value::Null),
    }
}

pub(crate) async fn read_many(
    exec: &Executor,
    model: &ModelDef,
    args: &QueryArguments,
    selection: &FieldSelection,
) -> Result<Vec<Value>, CrudError> {
    let ctx = exec.ctx();
    let query = select_records(&ctx, model, args, selection)?;
    let result = exec.run(query.select).await?;
    let records = read_records(&ctx, model, result.rows, selection)?;

    if query.in_memory || query.reversed {
        Ok(apply_in_memory(records, args, ctx.dialect.supports_distinct_on()))
    } else {
        Ok(records)
    }
}

/// The first record matching `filter` with every persisted scalar field.
pub(crate) async fn read_row(exec: &Executor, model: &ModelDef, filter: Filter) -> Result<Option<Value>, CrudError> {
    let selection = FieldSelection::scalars(model.scalar_fields().map(|f| f.name.clone()));
    let args = QueryArguments {
        take: Some(1),
        ..QueryArguments::with_filter(filter)
    };

    Ok(read_many(exec, model, &args, &selection).await?.into_iter().next())
}

/// The identifiers of the records matching `filter`, at most `limit` of them.
pub(crate) async fn read_ids(
    exec: &Executor,
    model: &ModelDef,
    filter: Filter,
    limit: Option<i64>,
) -> Result<Vec<SelectionResult>, CrudError> {
    let selection = FieldSelection::scalars(model.primary_identifier());
    let args = QueryArguments {
        take: limit,
        ..QueryArguments::with_filter(filter)
    };

    read_many(exec, model, &args, &selection)
        .await?
        .iter()
        .map(|record| identifier(model, record))
        .collect()
}

pub(crate) async fn read_by_ids(
    exec: &Executor,
    model: &ModelDef,
    ids: &[SelectionResult],
    selection: &FieldSelection,
) -> Result<Vec<Value>, CrudError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let args = QueryArguments::with_filter(Filter::from_selections(ids));
    read_many(exec, model, &args, selection).await
}

/// Reads the result of a write. A record that exists but is not visible to
/// the caller was written without being readable.
pub(crate) async fn read_back(
    exec: &Executor,
    model: &ModelDef,
    id: &SelectionResult,
    selection: &FieldSelection,
) -> Result<Value, CrudError> {
    read_by_ids(exec, model, std::slice::from_ref(id), selection)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CrudError::rejected(&model.name, RejectionReason::CannotReadBack))
}
