use super::{count_result, identifier, read::read_ids, read::read_many, Executor};
use crate::{
    error::CrudError,
    query_document::{DeleteArgs, DeleteManyArgs},
};
use bastion_query_structure::{QueryArguments, SelectionResult};
use bastion_schema::ModelDef;
use bastion_sql_query_builder::{delete_records, id_condition, limited_condition};
use bastion_value::Value;

/// Deletes the record matching the unique filter and returns it as it was.
pub(crate) async fn delete_one(exec: &Executor, model: &ModelDef, args: DeleteArgs) -> Result<Value, CrudError> {
    let DeleteArgs { filter, mut selection } = args;
    let added = selection.ensure_scalars(&model.primary_identifier());

    let read = QueryArguments {
        take: Some(1),
        ..QueryArguments::with_filter(filter)
    };

    let mut record = read_many(exec, model, &read, &selection)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CrudError::not_found(&model.name))?;

    let id = identifier(model, &record)?;
    let scope = exec.write_scope(has_inheritance(model)).await?;

    let result = match delete_rows(&scope, model, std::slice::from_ref(&id)).await {
        Ok(0) => Err(CrudError::not_found(&model.name)),
        Ok(_) => Ok(()),
        Err(err) => Err(err),
    };

    scope.settle(result).await?;

    for name in added {
        record.remove(&name);
    }

    Ok(record)
}

pub(crate) async fn delete_many(exec: &Executor, model: &ModelDef, args: DeleteManyArgs) -> Result<Value, CrudError> {
    let DeleteManyArgs { filter, limit } = args;

    if !has_inheritance(model) {
        let ctx = exec.ctx();
        let condition = limited_condition(&ctx, model, &filter, limit)?;
        let result = exec.run(delete_records(model, condition)).await?;

        return Ok(count_result(result.affected_rows));
    }

    let scope = exec.write_scope(true).await?;

    let result = async {
        let ids = read_ids(&scope, model, filter, limit).await?;
        delete_rows(&scope, model, &ids).await
    }
    .await;

    Ok(count_result(scope.settle(result).await?))
}

fn has_inheritance(model: &ModelDef) -> bool {
    model.is_delegate || model.base_model.is_some()
}

/// Deletes the rows with the given identifiers and returns how many rows of
/// `model` were deleted.
///
/// Rows of a delegate hierarchy are spread over several tables: the rows of
/// sub-models go first, then the row of `model`, then those of its bases.
pub(crate) async fn delete_rows(
    exec: &Executor,
    model: &ModelDef,
    ids: &[SelectionResult],
) -> Result<u64, CrudError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let schema = exec.schema();
    let ctx = exec.ctx();

    let mut descendants = Vec::new();
    let mut pending: Vec<&ModelDef> = schema.sub_models(model).collect();

    while let Some(sub) = pending.pop() {
        pending.extend(schema.sub_models(sub));
        descendants.push(sub);
    }

    // Deepest first, so no row outlives the row it extends.
    for sub in descendants.into_iter().rev() {
        exec.run(delete_records(sub, id_condition(&ctx, sub, ids)?)).await?;
    }

    let deleted = exec.run(delete_records(model, id_condition(&ctx, model, ids)?)).await?.affected_rows;

    if deleted > 0 {
        let mut base = schema.base_model(model);

        while let Some(current) = base {
            exec.run(delete_records(current, id_condition(&ctx, current, ids)?)).await?;
            base = schema.base_model(current);
        }
    }

    Ok(deleted)
}
