//! Writes through relation fields.

use super::{
    create::create_tree,
    delete::delete_rows,
    identifier,
    read::{read_ids, read_row},
    update::{update_by_ids, update_tree, update_where},
    with_defaults, Executor,
};
use crate::error::CrudError;
use bastion_query_structure::{
    CreateInput, Filter, NestedAction, RelationCondition, RelationFilter, ScalarCondition, SelectionResult, WriteArgs,
};
use bastion_schema::{ModelDef, ResolvedRelation};
use bastion_sql_query_builder::{create_records, delete_join_rows, insert_join_rows};
use bastion_value::Value;

/// Matches the records related to `parent` through `rel`.
pub(crate) fn related_filter(rel: &ResolvedRelation<'_>, parent: &Value) -> Result<Filter, CrudError> {
    if rel.is_many_to_many() {
        let opposite = rel.opposite.ok_or_else(|| {
            CrudError::internal(format!("`{}.{}` has no opposite field", rel.source.name, rel.field.name))
        })?;

        let id = identifier(rel.source, parent)?;

        return Ok(Filter::Relation(RelationFilter::new(
            opposite.name.clone(),
            RelationCondition::AtLeastOneRelatedRecord,
            Filter::from_selection(&id),
        )));
    }

    let mut filters = Vec::new();

    for (source, target) in rel.join_pairs() {
        match parent.get(source) {
            Some(value) if !value.is_null() => {
                filters.push(Filter::scalar(target, ScalarCondition::Equals(value.clone().into())));
            }
            _ => return Ok(Filter::BoolFilter(false)),
        }
    }

    Ok(Filter::and(filters))
}

/// The foreign key values that point a target record at `parent`.
fn link_values(rel: &ResolvedRelation<'_>, parent: &Value) -> Result<WriteArgs, CrudError> {
    if rel.owns_foreign_key() || rel.is_many_to_many() {
        return Err(CrudError::internal(format!(
            "`{}.{}` does not store its key on the related side",
            rel.source.name, rel.field.name
        )));
    }

    Ok(rel
        .join_pairs()
        .into_iter()
        .map(|(source, target)| (target.to_owned(), parent.get(source).cloned().unwrap_or(Value::Null)))
        .collect())
}

fn unlink_values(rel: &ResolvedRelation<'_>) -> WriteArgs {
    rel.join_pairs()
        .into_iter()
        .map(|(_, target)| (target.to_owned(), Value::Null))
        .collect()
}

/// Any of `filters`, where an empty filter matches everything.
fn any_of(mut filters: Vec<Filter>) -> Filter {
    if filters.iter().any(Filter::is_empty) {
        return Filter::Empty;
    }

    match filters.len() {
        1 => filters.remove(0),
        _ => Filter::or(filters),
    }
}

fn join_key(model: &ModelDef, record: &Value) -> Result<Value, CrudError> {
    model
        .single_id()
        .and_then(|id| record.get(&id.name))
        .cloned()
        .ok_or_else(|| CrudError::internal(format!("`{}` record without a single-field id", model.name)))
}

/// Writes of a relation whose foreign key is stored in `data`: the target
/// record is created or looked up first, then referenced.
pub(crate) async fn connect_owned(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    action: NestedAction,
    data: &mut WriteArgs,
) -> Result<(), CrudError> {
    let mut target = None;

    match action {
        NestedAction::Create(inputs) => {
            for input in inputs {
                target = Some(create_tree(exec, rel.target, input).await?);
            }
        }
        NestedAction::Connect(filters) => {
            for filter in filters {
                let record = read_row(exec, rel.target, filter).await?;
                target = Some(record.ok_or_else(|| CrudError::not_found(&rel.target.name))?);
            }
        }
        NestedAction::ConnectOrCreate(items) => {
            for item in items {
                target = match read_row(exec, rel.target, item.filter).await? {
                    Some(record) => Some(record),
                    None => Some(create_tree(exec, rel.target, item.create).await?),
                };
            }
        }
        other => {
            return Err(CrudError::internal(format!(
                "`{}` is not a write that links `{}.{}`",
                other.name(),
                rel.source.name,
                rel.field.name
            )))
        }
    }

    match target {
        Some(target) => link_owned(exec, rel, target, data).await,
        None => Ok(()),
    }
}

/// Points the foreign key in `data` at `target`.
pub(crate) async fn link_owned(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    target: Value,
    data: &mut WriteArgs,
) -> Result<(), CrudError> {
    let target = referenced_values(exec, rel, target).await?;

    for (source, referenced) in rel.join_pairs() {
        data.set(source, target.get(referenced).cloned().unwrap_or(Value::Null));
    }

    Ok(())
}

/// `record` with every field the foreign key references, reading it again
/// when the values it was written with do not cover them.
async fn referenced_values(exec: &Executor, rel: &ResolvedRelation<'_>, record: Value) -> Result<Value, CrudError> {
    let complete = rel
        .join_pairs()
        .into_iter()
        .all(|(_, referenced)| record.get(referenced).is_some_and(|v| !v.is_null()));

    if complete {
        return Ok(record);
    }

    let id = identifier(rel.target, &record)?;

    read_row(exec, rel.target, Filter::from_selection(&id))
        .await?
        .ok_or_else(|| CrudError::not_found(&rel.target.name))
}

/// Writes of a relation whose key lives on the related records or in a join
/// table, after `parent` has been written.
pub(crate) async fn apply_related(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    parent: &Value,
    action: NestedAction,
) -> Result<(), CrudError> {
    let target = rel.target;

    match action {
        NestedAction::Create(inputs) => {
            for input in inputs {
                create_related(exec, rel, parent, input).await?;
            }
        }
        NestedAction::CreateMany { data, skip_duplicates } => {
            let link = link_values(rel, parent)?;
            let rows = data
                .into_iter()
                .map(|mut row| {
                    for (name, value) in link.iter() {
                        row.insert(name.as_str(), value.clone());
                    }

                    with_defaults(exec.schema(), target, row)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let ctx = exec.ctx();

            for insert in create_records(&ctx, target, rows, skip_duplicates, false)? {
                exec.run(insert).await?;
            }
        }
        NestedAction::Connect(filters) => {
            for filter in filters {
                connect_related(exec, rel, parent, filter).await?;
            }
        }
        NestedAction::ConnectOrCreate(items) => {
            for item in items {
                match read_ids(exec, target, item.filter, Some(1)).await?.into_iter().next() {
                    Some(id) => connect_related(exec, rel, parent, Filter::from_selection(&id)).await?,
                    None => create_related(exec, rel, parent, item.create).await?,
                }
            }
        }
        NestedAction::Disconnect(filters) => {
            for filter in filters {
                disconnect_related(exec, rel, parent, filter).await?;
            }
        }
        NestedAction::Set(filters) => {
            disconnect_related(exec, rel, parent, Filter::Empty).await?;

            for filter in filters {
                connect_related(exec, rel, parent, filter).await?;
            }
        }
        NestedAction::Update(items) => {
            for item in items {
                let filter = Filter::and(vec![related_filter(rel, parent)?, item.filter]);
                let row = read_row(exec, target, filter)
                    .await?
                    .ok_or_else(|| CrudError::not_found(&target.name))?;

                update_tree(exec, target, row, item.data).await?;
            }
        }
        NestedAction::UpdateMany(items) => {
            for item in items {
                let filter = Filter::and(vec![related_filter(rel, parent)?, item.filter]);
                let ids = read_ids(exec, target, filter, None).await?;

                update_by_ids(exec, target, &ids, item.data).await?;
            }
        }
        NestedAction::Upsert(items) => {
            for item in items {
                let filter = Filter::and(vec![related_filter(rel, parent)?, item.filter]);

                match read_row(exec, target, filter).await? {
                    Some(row) => {
                        update_tree(exec, target, row, item.update).await?;
                    }
                    None => create_related(exec, rel, parent, item.create).await?,
                }
            }
        }
        NestedAction::Delete(filters) => {
            for filter in filters {
                let filter = Filter::and(vec![related_filter(rel, parent)?, filter]);
                let ids = read_ids(exec, target, filter, Some(1)).await?;

                if ids.is_empty() || delete_rows(exec, target, &ids).await? == 0 {
                    return Err(CrudError::not_found(&target.name));
                }
            }
        }
        NestedAction::DeleteMany(filters) => {
            let filter = Filter::and(vec![related_filter(rel, parent)?, any_of(filters)]);
            let ids = read_ids(exec, target, filter, None).await?;

            delete_rows(exec, target, &ids).await?;
        }
    }

    Ok(())
}

async fn create_related(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    parent: &Value,
    mut input: CreateInput,
) -> Result<(), CrudError> {
    if rel.is_many_to_many() {
        let child = create_tree(exec, rel.target, input).await?;
        return link_join_rows(exec, rel, parent, &[identifier(rel.target, &child)?]).await;
    }

    for (name, value) in link_values(rel, parent)?.iter() {
        input.data.insert(name.as_str(), value.clone());
    }

    create_tree(exec, rel.target, input).await?;

    Ok(())
}

async fn connect_related(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    parent: &Value,
    filter: Filter,
) -> Result<(), CrudError> {
    let target = rel.target;

    if rel.is_many_to_many() {
        let ids = read_ids(exec, target, filter, Some(1)).await?;

        if ids.is_empty() {
            return Err(CrudError::not_found(&target.name));
        }

        return link_join_rows(exec, rel, parent, &ids).await;
    }

    // A to-one relation drops the record it pointed at before.
    if !rel.is_to_many() {
        let others = Filter::and(vec![related_filter(rel, parent)?, Filter::not(vec![filter.clone()])]);
        update_where(exec, target, others, unlink_values(rel)).await?;
    }

    if update_where(exec, target, filter, link_values(rel, parent)?).await? == 0 {
        return Err(CrudError::not_found(&target.name));
    }

    Ok(())
}

async fn disconnect_related(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    parent: &Value,
    filter: Filter,
) -> Result<(), CrudError> {
    let target = rel.target;

    if rel.is_many_to_many() {
        let ctx = exec.ctx();
        let parent_key = join_key(rel.source, parent)?;

        let delete = if filter.is_empty() {
            delete_join_rows(&ctx, rel, &parent_key, None)?
        } else {
            let children = read_ids(exec, target, filter, None).await?;

            if children.is_empty() {
                return Ok(());
            }

            let keys = child_keys(&children);
            delete_join_rows(&ctx, rel, &parent_key, Some(&keys))?
        };

        exec.run(delete).await?;
        return Ok(());
    }

    let filter = Filter::and(vec![related_filter(rel, parent)?, filter]);
    update_where(exec, target, filter, unlink_values(rel)).await?;

    Ok(())
}

async fn link_join_rows(
    exec: &Executor,
    rel: &ResolvedRelation<'_>,
    parent: &Value,
    children: &[SelectionResult],
) -> Result<(), CrudError> {
    let ctx = exec.ctx();
    let insert = insert_join_rows(&ctx, rel, &join_key(rel.source, parent)?, &child_keys(children))?;

    exec.run(insert).await?;

    Ok(())
}

fn child_keys(children: &[SelectionResult]) -> Vec<Value> {
    children.iter().filter_map(|id| id.values().next().cloned()).collect()
}
