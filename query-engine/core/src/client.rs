use crate::{
    crud::{self, Executor},
    error::CrudError,
    operation::Operation,
    options::ClientOptions,
    plugin::{CrudNext, CrudRequest, ExpressionFunction, Origin, Plugin, QueryResult, SqlContext, SqlNext},
    query_document::Validator,
    request_context::with_request_now,
};
use bastion_schema::Schema;
use bastion_sql::{
    ast::Query,
    connector::{self, Queryable, Transaction, TransactionCapable},
};
use bastion_sql_query_builder::dialect_for;
use bastion_value::{protocol::strip_undefined, Value};
use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::{collections::HashMap, fmt, future::Future, future::IntoFuture, sync::Arc};
use tracing_futures::Instrument;

/// The entry point: model operations, transactions and direct queries
/// against one database.
///
/// A client is an immutable value. [`Client::with_plugin`] and
/// [`Client::with_auth`] return new clients sharing the schema and the
/// connection, and inside [`Client::transaction`] the closure receives a
/// client bound to the open transaction.
#[derive(Clone)]
pub struct Client {
    schema: Arc<Schema>,
    conn: Arc<dyn TransactionCapable>,
    tx: Option<Arc<dyn Transaction>>,
    plugins: Arc<Vec<Arc<dyn Plugin>>>,
    functions: Arc<HashMap<String, ExpressionFunction>>,
    validator: Arc<Validator>,
    options: Arc<ClientOptions>,
    auth: Option<Arc<Value>>,
}

impl Client {
    pub fn new(schema: impl Into<Arc<Schema>>, conn: Arc<dyn TransactionCapable>) -> Result<Self, CrudError> {
        let schema = schema.into();

        if schema.provider != conn.provider() {
            return Err(CrudError::internal(format!(
                "the schema is written for {}, the connection is to {}",
                schema.provider,
                conn.provider()
            )));
        }

        let validator = Arc::new(Validator::new(Arc::clone(&schema), &[]));

        Ok(Self {
            schema,
            conn,
            tx: None,
            plugins: Arc::new(Vec::new()),
            functions: Arc::new(HashMap::new()),
            validator,
            options: Arc::new(ClientOptions::default()),
            auth: None,
        })
    }

    /// Opens a connection from a URL such as `file:dev.db` or `sqlite::memory:`.
    pub fn connect(schema: impl Into<Arc<Schema>>, url: &str) -> Result<Self, CrudError> {
        Self::new(schema, connector::connect(url)?)
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// A client with `plugin` appended to the interception chains.
    pub fn with_plugin<P>(&self, plugin: P) -> Self
    where
        P: Plugin + 'static,
    {
        let mut plugins = self.plugins.as_ref().clone();
        plugins.push(Arc::new(plugin));

        let functions = plugins.iter().flat_map(|p| p.functions()).collect();

        Self {
            validator: Arc::new(Validator::new(Arc::clone(&self.schema), &plugins)),
            plugins: Arc::new(plugins),
            functions: Arc::new(functions),
            ..self.clone()
        }
    }

    /// A client acting for `auth`. `null` means anonymous.
    pub fn with_auth(&self, auth: JsonValue) -> Self {
        let auth = match auth {
            JsonValue::Null => None,
            auth => Some(Arc::new(Value::from_untyped_json(auth))),
        };

        Self { auth, ..self.clone() }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn auth(&self) -> Option<&Value> {
        self.auth.as_deref()
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn is_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub fn model(&self, name: &str) -> ModelClient {
        ModelClient {
            client: self.clone(),
            model: name.to_owned(),
        }
    }

    /// Runs `f` in a transaction and commits if it succeeds. Inside an open
    /// transaction `f` joins it, and the outermost call decides.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T, CrudError>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, CrudError>>,
    {
        if self.is_transaction() {
            return f(self.clone()).await;
        }

        let tx_client = self.begin().await?;
        let result = f(tx_client.clone()).await;

        tx_client.finish(result).await
    }

    /// Runs prepared operations in order in one transaction. Nothing is
    /// executed before this call, and a failure rolls back all of them.
    pub async fn batch(&self, operations: Vec<OperationRequest>) -> Result<Vec<Value>, CrudError> {
        self.transaction(|tx| async move {
            let mut results = Vec::with_capacity(operations.len());

            for operation in operations {
                results.push(operation.on(&tx).await?);
            }

            Ok(results)
        })
        .await
    }

    /// Runs a query tree built with `bastion-sql` through the statement
    /// chain of the plugins.
    pub async fn execute_query(&self, query: impl Into<Query>) -> Result<QueryResult, CrudError> {
        self.run_sql(None, query.into()).await
    }

    pub(crate) async fn begin(&self) -> Result<Client, CrudError> {
        let isolation = self.options.write_isolation();
        let tx = self.conn.start_transaction(Some(isolation)).await?;

        tracing::debug!(%isolation, "begin transaction");

        Ok(Self {
            tx: Some(tx),
            ..self.clone()
        })
    }

    /// Commits the transaction of this client if `result` is a success and
    /// rolls it back otherwise.
    pub(crate) async fn finish<T>(&self, result: Result<T, CrudError>) -> Result<T, CrudError> {
        let Some(tx) = &self.tx else {
            return result;
        };

        match result {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!("commit transaction");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(%rollback, "rollback failed");
                } else {
                    tracing::debug!(error = %err, "rollback transaction");
                }

                Err(err)
            }
        }
    }

    fn queryable(&self) -> &dyn Queryable {
        match &self.tx {
            Some(tx) => tx.as_queryable(),
            None => self.conn.as_queryable(),
        }
    }

    pub(crate) async fn run_sql(&self, origin: Option<&Origin>, query: Query) -> Result<QueryResult, CrudError> {
        let ctx = SqlContext {
            schema: &self.schema,
            dialect: dialect_for(self.schema.provider),
            computed: &self.options.computed_fields,
            functions: &self.functions,
            auth: self.auth(),
            origin,
            conn: self.queryable(),
            log_queries: self.options.log_queries,
        };

        let chain = SqlNext { plugins: &self.plugins };

        if self.is_transaction() || !self.plugins.iter().any(|p| p.requires_transaction(&query, &ctx)) {
            return chain.run(&ctx, query).await;
        }

        let tx_client = self.begin().await?;
        let result = chain.run(&ctx.with_conn(tx_client.queryable()), query).await;

        tx_client.finish(result).await
    }

    /// Validates and runs one model operation through the plugins.
    pub(crate) async fn execute(self, model: String, operation: Operation, args: JsonValue) -> Result<Value, CrudError> {
        let span = tracing::info_span!("bastion.crud", model = %model, operation = %operation);

        let run = async move {
            let args = strip_undefined(args);
            self.validator.parse(&model, operation, &args)?;

            let request = CrudRequest { model, operation, args };
            let chain = CrudNext {
                plugins: &self.plugins,
                client: &self,
            };

            chain.run(request).await
        };

        with_request_now(run).instrument(span).await
    }

    /// The end of the operation chain. Plugins may have rewritten the
    /// arguments, so they are validated again.
    pub(crate) async fn handle(&self, request: CrudRequest) -> Result<Value, CrudError> {
        let CrudRequest { model, operation, args } = request;
        let parsed = self.validator.parse(&model, operation, &strip_undefined(args))?;
        let model = self.schema.model(&model)?;

        let exec = Executor::new(self.clone(), Origin {
            model: model.name.clone(),
            operation,
        });

        crud::execute(&exec, model, parsed).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("provider", &self.schema.provider)
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("in_transaction", &self.is_transaction())
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

/// The operations of one model.
#[derive(Debug, Clone)]
pub struct ModelClient {
    client: Client,
    model: String,
}

macro_rules! operations {
    ($($method:ident => $operation:ident),* $(,)?) => {
        impl ModelClient {
            $(
                pub fn $method(&self, args: JsonValue) -> OperationRequest {
                    self.operation(Operation::$operation, args)
                }
            )*
        }
    };
}

operations! {
    find_unique => FindUnique,
    find_unique_or_throw => FindUniqueOrThrow,
    find_first => FindFirst,
    find_first_or_throw => FindFirstOrThrow,
    find_many => FindMany,
    create => Create,
    create_many => CreateMany,
    create_many_and_return => CreateManyAndReturn,
    update => Update,
    update_many => UpdateMany,
    upsert => Upsert,
    delete => Delete,
    delete_many => DeleteMany,
    count => Count,
    aggregate => Aggregate,
    group_by => GroupBy,
}

impl ModelClient {
    pub fn operation(&self, operation: Operation, args: JsonValue) -> OperationRequest {
        OperationRequest {
            client: self.client.clone(),
            model: self.model.clone(),
            operation,
            args,
        }
    }
}

/// A prepared operation. It runs when awaited, or as part of
/// [`Client::batch`].
#[derive(Debug, Clone)]
pub struct OperationRequest {
    client: Client,
    model: String,
    operation: Operation,
    args: JsonValue,
}

impl OperationRequest {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn args(&self) -> &JsonValue {
        &self.args
    }

    /// Runs the operation on `client` instead of the one that prepared it,
    /// keeping the preparing client's plugins and auth.
    fn on(self, client: &Client) -> BoxFuture<'static, Result<Value, CrudError>> {
        let client = Client {
            tx: client.tx.clone(),
            ..self.client
        };

        Box::pin(client.execute(self.model, self.operation, self.args))
    }
}

impl IntoFuture for OperationRequest {
    type Output = Result<Value, CrudError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.client.execute(self.model, self.operation, self.args))
    }
}
