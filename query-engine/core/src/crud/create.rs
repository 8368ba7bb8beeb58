use super::{
    count_result, identifier, nested,
    read::{read_back, read_by_ids},
    with_defaults, Executor,
};
use crate::{
    error::CrudError,
    query_document::{CreateArgs, CreateManyArgs},
};
use bastion_query_structure::{CreateInput, SelectionResult, WriteArgs};
use bastion_schema::{ModelDef, ScalarType};
use bastion_sql_query_builder::{create_record, create_records, read_scalar_row, split_inherited, Context};
use bastion_value::Value;
use futures::future::BoxFuture;

pub(crate) async fn create_one(exec: &Executor, model: &ModelDef, args: CreateArgs) -> Result<Value, CrudError> {
    let CreateArgs { data, selection } = args;
    let needs_tx = !data.nested.is_empty() || model.base_model.is_some();

    let scope = exec.write_scope(needs_tx).await?;
    let result = create_tree(&scope, model, data).await;
    let record = scope.settle(result).await?;

    read_back(exec, model, &identifier(model, &record)?, &selection).await
}

/// `createMany` and `createManyAndReturn`.
pub(crate) async fn create_many(exec: &Executor, model: &ModelDef, args: CreateManyArgs) -> Result<Value, CrudError> {
    let CreateManyArgs {
        data,
        skip_duplicates,
        selection,
    } = args;

    let rows = data
        .into_iter()
        .map(|row| with_defaults(exec.schema(), model, row))
        .collect::<Result<Vec<_>, _>>()?;

    let ctx = exec.ctx();
    let row_by_row = model.base_model.is_some() || (selection.is_some() && !ctx.dialect.supports_returning());

    if row_by_row && skip_duplicates {
        return Err(CrudError::invalid(
            "skipDuplicates",
            format!("not supported when creating many `{}` records", model.name),
        ));
    }

    let scope = exec.write_scope(row_by_row || rows.len() > 1).await?;

    let result = if row_by_row {
        insert_one_by_one(&scope, model, rows).await
    } else {
        insert_in_bulk(&scope, model, rows, skip_duplicates, selection.is_some()).await
    };

    let (count, ids) = scope.settle(result).await?;

    match selection {
        Some(selection) => Ok(Value::List(read_by_ids(exec, model, &ids, &selection).await?)),
        None => Ok(count_result(count)),
    }
}

async fn insert_one_by_one(
    exec: &Executor,
    model: &ModelDef,
    rows: Vec<WriteArgs>,
) -> Result<(u64, Vec<SelectionResult>), CrudError> {
    let mut ids = Vec::with_capacity(rows.len());

    for row in rows {
        let record = insert_row(exec, model, row).await?;
        ids.push(identifier(model, &record)?);
    }

    Ok((ids.len() as u64, ids))
}

async fn insert_in_bulk(
    exec: &Executor,
    model: &ModelDef,
    rows: Vec<WriteArgs>,
    skip_duplicates: bool,
    returning: bool,
) -> Result<(u64, Vec<SelectionResult>), CrudError> {
    let ctx = exec.ctx();
    let mut count = 0;
    let mut ids = Vec::new();

    for insert in create_records(&ctx, model, rows, skip_duplicates, returning)? {
        let result = exec.run(insert).await?;
        count += result.affected_rows;

        if returning {
            for row in result.rows {
                ids.push(identifier(model, &read_scalar_row(&ctx, model, row)?)?);
            }
        }
    }

    Ok((count, ids))
}

/// Creates a record with its nested writes and returns the values it was
/// written with, identifier included.
///
/// Records this one points at are written first so their keys can be
/// stored in the new row; records pointing at it follow the insert.
pub(crate) fn create_tree<'a>(
    exec: &'a Executor,
    model: &'a ModelDef,
    input: CreateInput,
) -> BoxFuture<'a, Result<Value, CrudError>> {
    Box::pin(async move {
        let CreateInput { mut data, nested } = input;
        let ctx = exec.ctx();
        let mut dependents = Vec::new();

        for write in nested {
            let rel = ctx.relation(model, &write.field)?;

            if rel.owns_foreign_key() {
                nested::connect_owned(exec, &rel, write.action, &mut data).await?;
            } else {
                dependents.push((rel, write.action));
            }
        }

        let data = with_defaults(exec.schema(), model, data)?;
        let record = insert_row(exec, model, data).await?;

        for (rel, action) in dependents {
            nested::apply_related(exec, &rel, &record, action).await?;
        }

        Ok(record)
    })
}

/// Inserts one row. A delegate sub-model stores its inherited fields in the
/// row of its base first, sharing the identifier.
pub(crate) fn insert_row<'a>(
    exec: &'a Executor,
    model: &'a ModelDef,
    mut data: WriteArgs,
) -> BoxFuture<'a, Result<Value, CrudError>> {
    Box::pin(async move {
        let mut record = Value::Object(Vec::new());
        let ids = model.primary_identifier();

        if let Some(base) = exec.schema().base_model(model) {
            let mut base_data = split_inherited(model, &mut data);

            for name in ids.iter().copied() {
                if let Some(value) = data.get_value(name) {
                    base_data.set(name, value.clone());
                }
            }

            if let Some(discriminator) = base.discriminator() {
                if !base_data.contains(&discriminator.name) {
                    let value = match exec.schema().enum_def(&discriminator.type_name) {
                        Some(_) => Value::Enum(model.name.clone()),
                        None => Value::String(model.name.clone()),
                    };

                    base_data.set(discriminator.name.as_str(), value);
                }
            }

            let base_record = insert_row(exec, base, base_data).await?;

            for name in ids.iter().copied() {
                if let Some(value) = base_record.get(name) {
                    data.set(name, value.clone());
                }
            }

            for (name, value) in base_record.into_object().unwrap_or_default() {
                record.insert(name, value);
            }
        }

        let ctx = exec.ctx();
        let result = exec.run(create_record(&ctx, model, &data)?).await?;
        let id = inserted_identifier(&ctx, model, &data, result)?;

        for (name, op) in data.iter() {
            if let Some(value) = op.as_set() {
                record.insert(name.as_str(), value.clone());
            }
        }

        for (name, value) in id.pairs {
            record.insert(name, value);
        }

        Ok(record)
    })
}

/// The identifier of a row just inserted: from `RETURNING`, from the
/// written values, or the last inserted id of an autoincrement key.
fn inserted_identifier(
    ctx: &Context<'_>,
    model: &ModelDef,
    data: &WriteArgs,
    result: crate::plugin::QueryResult,
) -> Result<SelectionResult, CrudError> {
    let ids = model.primary_identifier();
    let last_insert_id = result.rows.last_insert_id();

    if let Some(row) = result.rows.into_iter().next() {
        let returned = read_scalar_row(ctx, model, row)?;

        if let Some(id) = SelectionResult::from_record(&returned, &ids) {
            return Ok(id);
        }
    }

    let written = ids
        .iter()
        .map(|name| match data.get_value(name) {
            Some(value) if !value.is_null() => Some((name.to_string(), value.clone())),
            _ => None,
        })
        .collect::<Option<Vec<_>>>();

    if let Some(pairs) = written {
        return Ok(SelectionResult::new(pairs));
    }

    match (ids.as_slice(), last_insert_id) {
        ([name], Some(last)) => {
            let value = match model.field(name)?.scalar_type() {
                Some(ScalarType::BigInt) => Value::BigInt(last as i64),
                _ => Value::Int(last as i64),
            };

            Ok(SelectionResult::new(vec![(name.to_string(), value)]))
        }
        _ => Err(CrudError::internal(format!(
            "the identifier of the new `{}` record is unknown",
            model.name
        ))),
    }
}
