use super::{
    count_result,
    create::create_tree,
    identifier,
    nested::{self, related_filter},
    read::{read_back, read_ids, read_row},
    touch_updated_at, Executor,
};
use crate::{
    error::CrudError,
    query_document::{UpdateArgs, UpdateManyArgs, UpsertArgs},
};
use bastion_query_structure::{Filter, NestedAction, SelectionResult, UpdateInput, WriteArgs, WriteOperation};
use bastion_schema::{ModelDef, ResolvedRelation};
use bastion_sql_query_builder::{id_condition, limited_condition, split_inherited, update_records};
use bastion_value::Value;
use futures::future::BoxFuture;

pub(crate) async fn update_one(exec: &Executor, model: &ModelDef, args: UpdateArgs) -> Result<Value, CrudError> {
    let UpdateArgs {
        filter,
        data,
        selection,
    } = args;

    let scope = exec.write_scope(!data.nested.is_empty() || model.base_model.is_some()).await?;

    let result = async {
        let row = read_row(&scope, model, filter)
            .await?
            .ok_or_else(|| CrudError::not_found(&model.name))?;

        update_tree(&scope, model, row, data).await
    }
    .await;

    let id = scope.settle(result).await?;

    read_back(exec, model, &id, &selection).await
}

pub(crate) async fn update_many(exec: &Executor, model: &ModelDef, args: UpdateManyArgs) -> Result<Value, CrudError> {
    let UpdateManyArgs { filter, mut data, limit } = args;
    touch_updated_at(model, &mut data);

    let count = if model.base_model.is_some() {
        let scope = exec.write_scope(true).await?;

        let result = async {
            let ids = read_ids(&scope, model, filter, limit).await?;
            update_by_ids(&scope, model, &ids, data).await
        }
        .await;

        scope.settle(result).await?
    } else if data.is_empty() {
        read_ids(exec, model, filter, limit).await?.len() as u64
    } else {
        let ctx = exec.ctx();
        let condition = limited_condition(&ctx, model, &filter, limit)?;

        exec.run(update_records(&ctx, model, &data, condition)?).await?.affected_rows
    };

    Ok(count_result(count))
}

/// Updates the record matching the unique filter, or creates it. The lookup
/// and the write share a transaction.
pub(crate) async fn upsert(exec: &Executor, model: &ModelDef, args: UpsertArgs) -> Result<Value, CrudError> {
    let UpsertArgs {
        filter,
        create,
        update,
        selection,
    } = args;

    let scope = exec.write_scope(true).await?;

    let result = async {
        match read_row(&scope, model, filter).await? {
            Some(row) => update_tree(&scope, model, row, update).await,
            None => identifier(model, &create_tree(&scope, model, create).await?),
        }
    }
    .await;

    let id = scope.settle(result).await?;

    read_back(exec, model, &id, &selection).await
}

/// Updates the record `current` (its persisted scalar values) with its
/// nested writes. Returns the identifier after the update.
pub(crate) fn update_tree<'a>(
    exec: &'a Executor,
    model: &'a ModelDef,
    current: Value,
    input: UpdateInput,
) -> BoxFuture<'a, Result<SelectionResult, CrudError>> {
    Box::pin(async move {
        let UpdateInput { mut data, nested } = input;
        let ctx = exec.ctx();
        let id = identifier(model, &current)?;

        let mut dependents = Vec::new();
        let mut orphans = Vec::new();

        for write in nested {
            let rel = ctx.relation(model, &write.field)?;

            if rel.owns_foreign_key() {
                if let Some(orphan) = update_owned(exec, &rel, &current, write.action, &mut data).await? {
                    orphans.push((rel.target, orphan));
                }
            } else {
                dependents.push((rel, write.action));
            }
        }

        touch_updated_at(model, &mut data);

        let new_id = SelectionResult::new(
            id.pairs
                .iter()
                .map(|(name, value)| match data.get(name) {
                    Some(WriteOperation::Set(new)) => (name.clone(), new.clone()),
                    _ => (name.clone(), value.clone()),
                })
                .collect(),
        );

        let mut parent = current;

        for (name, op) in data.iter() {
            if let WriteOperation::Set(value) = op {
                parent.insert(name.as_str(), value.clone());
            }
        }

        write_row(exec, model, &id, data).await?;

        for (rel, action) in dependents {
            nested::apply_related(exec, &rel, &parent, action).await?;
        }

        for (target, orphan) in orphans {
            super::delete::delete_rows(exec, target, std::slice::from_ref(&orphan)).await?;
        }

        Ok(new_id)
    })
}

/// A nested write on a relation whose foreign key is stored in `data`.
/// Returns the identifier of a record to delete once the foreign key no
/// longer points at it.
async fn update_owned(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    current: &Value,
    action: NestedAction,
    data: &mut WriteArgs,
) -> Result<Option<SelectionResult>, CrudError> {
    let target = rel.target;

    let linked = |filter: Filter| -> Result<Filter, CrudError> {
        Ok(Filter::and(vec![related_filter(rel, current)?, filter]))
    };

    match action {
        action @ (NestedAction::Create(_) | NestedAction::Connect(_) | NestedAction::ConnectOrCreate(_)) => {
            nested::connect_owned(exec, rel, action, data).await?;
        }
        NestedAction::Disconnect(filters) => {
            for filter in filters {
                if read_row(exec, target, linked(filter)?).await?.is_some() {
                    unset_foreign_key(rel, data);
                }
            }
        }
        NestedAction::Update(items) => {
            for item in items {
                let row = read_row(exec, target, linked(item.filter)?)
                    .await?
                    .ok_or_else(|| CrudError::not_found(&target.name))?;

                let new_id = update_tree(exec, target, row, item.data).await?;
                follow_identifier(rel, &new_id, data);
            }
        }
        NestedAction::Upsert(items) => {
            for item in items {
                match read_row(exec, target, linked(item.filter)?).await? {
                    Some(row) => {
                        let new_id = update_tree(exec, target, row, item.update).await?;
                        follow_identifier(rel, &new_id, data);
                    }
                    None => {
                        let created = create_tree(exec, target, item.create).await?;
                        nested::link_owned(exec, rel, created, data).await?;
                    }
                }
            }
        }
        NestedAction::Delete(filters) => {
            let mut orphan = None;

            for filter in filters {
                let row = read_row(exec, target, linked(filter)?)
                    .await?
                    .ok_or_else(|| CrudError::not_found(&target.name))?;

                unset_foreign_key(rel, data);
                orphan = Some(identifier(target, &row)?);
            }

            return Ok(orphan);
        }
        other => {
            return Err(CrudError::internal(format!(
                "`{}` cannot be applied to `{}.{}`",
                other.name(),
                rel.source.name,
                rel.field.name
            )))
        }
    }

    Ok(None)
}

fn unset_foreign_key(rel: &ResolvedRelation<'_>, data: &mut WriteArgs) {
    for (source, _) in rel.join_pairs() {
        data.set(source, Value::Null);
    }
}

/// Keeps the foreign key in `data` pointing at a related record whose
/// referenced fields were part of its identifier and changed.
fn follow_identifier(rel: &ResolvedRelation<'_>, new_id: &SelectionResult, data: &mut WriteArgs) {
    for (source, referenced) in rel.join_pairs() {
        if let Some(value) = new_id.get(referenced) {
            if !data.contains(source) {
                data.set(source, value.clone());
            }
        }
    }
}

/// Writes `data` to the row identified by `id`, inherited fields to the
/// row of the delegate base.
fn write_row<'a>(
    exec: &'a Executor,
    model: &'a ModelDef,
    id: &'a SelectionResult,
    mut data: WriteArgs,
) -> BoxFuture<'a, Result<(), CrudError>> {
    Box::pin(async move {
        if let Some(base) = exec.schema().base_model(model) {
            let mut base_data = split_inherited(model, &mut data);

            for name in model.primary_identifier() {
                if let Some(op) = data.get(name) {
                    base_data.insert(name, op.clone());
                }
            }

            if !base_data.is_empty() {
                write_row(exec, base, id, base_data).await?;
            }
        }

        if data.is_empty() {
            return Ok(());
        }

        let ctx = exec.ctx();
        let condition = id_condition(&ctx, model, std::slice::from_ref(id))?;
        let result = exec.run(update_records(&ctx, model, &data, condition)?).await?;

        if result.affected_rows == 0 {
            return Err(CrudError::not_found(&model.name));
        }

        Ok(())
    })
}

/// Updates the rows matching `filter` and returns their number.
pub(crate) async fn update_where(
    exec: &Executor,
    model: &ModelDef,
    filter: Filter,
    data: WriteArgs,
) -> Result<u64, CrudError> {
    if model.base_model.is_some() || data.is_empty() {
        let ids = read_ids(exec, model, filter, None).await?;
        return update_by_ids(exec, model, &ids, data).await;
    }

    let ctx = exec.ctx();
    let condition = limited_condition(&ctx, model, &filter, None)?;

    Ok(exec.run(update_records(&ctx, model, &data, condition)?).await?.affected_rows)
}

/// Updates the rows with the given identifiers and returns their number.
pub(crate) fn update_by_ids<'a>(
    exec: &'a Executor,
    model: &'a ModelDef,
    ids: &'a [SelectionResult],
    mut data: WriteArgs,
) -> BoxFuture<'a, Result<u64, CrudError>> {
    Box::pin(async move {
        if ids.is_empty() {
            return Ok(0);
        }

        if let Some(base) = exec.schema().base_model(model) {
            let base_data = split_inherited(model, &mut data);

            if !base_data.is_empty() {
                update_by_ids(exec, base, ids, base_data).await?;
            }
        }

        if data.is_empty() {
            return Ok(ids.len() as u64);
        }

        let ctx = exec.ctx();
        let condition = id_condition(&ctx, model, ids)?;

        Ok(exec.run(update_records(&ctx, model, &data, condition)?).await?.affected_rows)
    })
}
