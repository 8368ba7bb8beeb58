use super::Executor;
use crate::{
    error::CrudError,
    query_document::{AggregateArgs, CountArgs, GroupByArgs},
};
use bastion_query_structure::{AggregationFunction, AggregationSelection};
use bastion_schema::ModelDef;
use bastion_sql_query_builder::{read_aggregate_row, AggregateColumn};
use bastion_sql::ast::Select;
use bastion_value::Value;

/// `count` is a plain number, or an object with one count per selected
/// field under `select`.
pub(crate) async fn count(exec: &Executor, model: &ModelDef, args: CountArgs) -> Result<Value, CrudError> {
    let CountArgs { args, select } = args;

    let selection = match &select {
        Some(select) => AggregationSelection::new(AggregationFunction::Count, select.fields.clone(), select.all),
        None => AggregationSelection::new(AggregationFunction::Count, Vec::new(), true),
    };

    let ctx = exec.ctx();
    let (query, columns) = bastion_sql_query_builder::aggregate(&ctx, model, &args, &[selection])?;
    let mut record = single_row(exec, model, query, &columns).await?;

    let counts = record
        .remove(AggregationFunction::Count.key())
        .unwrap_or_else(|| Value::Object(Vec::new()));

    match select {
        Some(_) => Ok(counts),
        None => Ok(counts.get("_all").cloned().unwrap_or(Value::Int(0))),
    }
}

pub(crate) async fn aggregate(exec: &Executor, model: &ModelDef, args: AggregateArgs) -> Result<Value, CrudError> {
    let ctx = exec.ctx();
    let (query, columns) = bastion_sql_query_builder::aggregate(&ctx, model, &args.args, &args.selections)?;

    single_row(exec, model, query, &columns).await
}

pub(crate) async fn group_by(exec: &Executor, model: &ModelDef, args: GroupByArgs) -> Result<Value, CrudError> {
    let GroupByArgs {
        args,
        by,
        having,
        selections,
    } = args;

    let ctx = exec.ctx();
    let (query, columns) =
        bastion_sql_query_builder::group_by(&ctx, model, &args, &by, &selections, having.as_ref())?;

    let result = exec.run(query).await?;
    let groups = result
        .rows
        .into_iter()
        .map(|row| read_aggregate_row(&ctx, model, &by, &columns, row))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::List(groups))
}

async fn single_row(
    exec: &Executor,
    model: &ModelDef,
    query: Select,
    columns: &[AggregateColumn],
) -> Result<Value, CrudError> {
    let ctx = exec.ctx();
    let row = exec.run(query).await?.rows.into_single()?;

    Ok(read_aggregate_row(&ctx, model, &[], columns, row)?)
}
