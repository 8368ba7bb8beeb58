//! Execution of validated operations.
//!
//! Every handler turns its arguments into statements built by
//! `bastion-sql-query-builder` and sends them through the statement chain of
//! the client, so plugins see each of them. Writes that issue more than one
//! statement run in a transaction; the result of a write is read back after
//! that transaction has committed.

mod aggregate;
mod create;
mod delete;
mod nested;
mod read;
mod update;

use crate::{
    client::Client,
    error::CrudError,
    operation::Operation,
    plugin::{Origin, QueryResult},
    query_document::ParsedArgs,
    request_context::request_now,
};
use bastion_query_structure::{generate_default, SelectionResult, WriteArgs};
use bastion_schema::{DefaultValue, FieldDef, ModelDef, ScalarType, Schema};
use bastion_sql::ast::Query;
use bastion_sql_query_builder::{dialect_for, Context};
use bastion_value::Value;

pub(crate) async fn execute(exec: &Executor, model: &ModelDef, args: ParsedArgs) -> Result<Value, CrudError> {
    match args {
        ParsedArgs::Find(args) => read::find(exec, model, args).await,
        ParsedArgs::Create(args) => create::create_one(exec, model, args).await,
        ParsedArgs::CreateMany(args) => create::create_many(exec, model, args).await,
        ParsedArgs::Update(args) => update::update_one(exec, model, args).await,
        ParsedArgs::UpdateMany(args) => update::update_many(exec, model, args).await,
        ParsedArgs::Upsert(args) => update::upsert(exec, model, args).await,
        ParsedArgs::Delete(args) => delete::delete_one(exec, model, args).await,
        ParsedArgs::DeleteMany(args) => delete::delete_many(exec, model, args).await,
        ParsedArgs::Count(args) => aggregate::count(exec, model, args).await,
        ParsedArgs::Aggregate(args) => aggregate::aggregate(exec, model, args).await,
        ParsedArgs::GroupBy(args) => aggregate::group_by(exec, model, args).await,
    }
}

/// Runs the statements of one operation.
#[derive(Clone)]
pub(crate) struct Executor {
    client: Client,
    origin: Origin,
    /// Whether this executor opened the transaction its client is bound to.
    owns_tx: bool,
}

impl Executor {
    pub(crate) fn new(client: Client, origin: Origin) -> Self {
        Self {
            client,
            origin,
            owns_tx: false,
        }
    }

    pub(crate) fn operation(&self) -> Operation {
        self.origin.operation
    }

    pub(crate) fn schema(&self) -> &Schema {
        self.client.schema()
    }

    pub(crate) fn ctx(&self) -> Context<'_> {
        let schema = self.client.schema();
        Context::new(schema, dialect_for(schema.provider), &self.client.options().computed_fields)
    }

    pub(crate) async fn run(&self, query: impl Into<Query>) -> Result<QueryResult, CrudError> {
        self.client.run_sql(Some(&self.origin), query.into()).await
    }

    /// An executor for the statements of one write. With `needs_tx` they run
    /// in a transaction, joining the open one if there is one.
    pub(crate) async fn write_scope(&self, needs_tx: bool) -> Result<Executor, CrudError> {
        if !needs_tx || self.client.is_transaction() {
            return Ok(Executor {
                owns_tx: false,
                ..self.clone()
            });
        }

        Ok(Executor {
            client: self.client.begin().await?,
            origin: self.origin.clone(),
            owns_tx: true,
        })
    }

    /// Ends a scope from [`Executor::write_scope`], committing the transaction
    /// it opened if `result` is a success.
    pub(crate) async fn settle<T>(&self, result: Result<T, CrudError>) -> Result<T, CrudError> {
        if self.owns_tx {
            self.client.finish(result).await
        } else {
            result
        }
    }
}

/// The identifier of a record from its values.
pub(crate) fn identifier(model: &ModelDef, record: &Value) -> Result<SelectionResult, CrudError> {
    SelectionResult::from_record(record, &model.primary_identifier())
        .ok_or_else(|| CrudError::internal(format!("`{}` record without an identifier", model.name)))
}

/// The value of a field for a new row that does not set it, if any.
pub(crate) fn default_for(schema: &Schema, field: &FieldDef) -> Result<Option<Value>, CrudError> {
    let is_now = matches!(&field.default, Some(DefaultValue::Call { call, .. }) if call == "now");

    if is_now || (field.updated_at && field.default.is_none()) {
        return Ok(Some(timestamp(field)));
    }

    Ok(generate_default(schema, field)?)
}

/// `now()` of the running operation, in the representation of `field`.
pub(crate) fn timestamp(field: &FieldDef) -> Value {
    match field.scalar_type() {
        Some(ScalarType::String) => Value::String(bastion_value::stringify_datetime(&request_now())),
        _ => Value::DateTime(request_now()),
    }
}

/// Completes the data of a new row with the defaults of the fields it does
/// not set. Discriminators are written by the insert itself.
pub(crate) fn with_defaults(schema: &Schema, model: &ModelDef, mut data: WriteArgs) -> Result<WriteArgs, CrudError> {
    for field in model.scalar_fields() {
        if data.contains(&field.name) || field.is_discriminator {
            continue;
        }

        if let Some(value) = default_for(schema, field)? {
            data.set(field.name.as_str(), value);
        }
    }

    Ok(data)
}

/// Sets every `@updatedAt` field `data` does not set explicitly.
pub(crate) fn touch_updated_at(model: &ModelDef, data: &mut WriteArgs) {
    for field in model.scalar_fields().filter(|f| f.updated_at) {
        if !data.contains(&field.name) {
            data.set(field.name.as_str(), timestamp(field));
        }
    }
}

pub(crate) fn count_result(count: u64) -> Value {
    Value::object(vec![("count".to_owned(), Value::Int(count as i64))])
}
