//! Interception points of a client.
//!
//! A plugin wraps two layers. [`Plugin::on_query`] runs around every model
//! operation with its untyped arguments and its result, and may rewrite
//! either or answer without calling `next`. [`Plugin::on_sql_query`] runs
//! around every statement sent to the database, including statements issued
//! directly through [`crate::Client::execute_query`].
//!
//! The first registered plugin is the outermost layer of both chains, the
//! last registered one runs closest to the database.

use crate::{client::Client, error::CrudError, operation::Operation};
use async_trait::async_trait;
use bastion_schema::Schema;
use bastion_sql::{
    ast::{Expression, Query},
    connector::{Queryable, ResultSet},
    visitor,
};
use bastion_sql_query_builder::{ComputedFields, Context, Dialect};
use bastion_value::Value;
use serde_json::Value as JsonValue;
use std::{collections::HashMap, fmt, sync::Arc};

/// A function callable by name from policy expressions. It receives its
/// compiled arguments and returns the SQL expression of the call.
pub type ExpressionFunction = Arc<dyn Fn(Vec<Expression>) -> Result<Expression, CrudError> + Send + Sync>;

/// One model operation as seen by [`Plugin::on_query`].
#[derive(Debug, Clone, PartialEq)]
pub struct CrudRequest {
    pub model: String,
    pub operation: Operation,
    /// The arguments in the shape of the client API.
    pub args: JsonValue,
}

/// The outcome of one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: ResultSet,
    pub affected_rows: u64,
}

/// The model operation a statement was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub model: String,
    pub operation: Operation,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Top-level argument keys the plugin understands for `operation`. They
    /// pass validation and are otherwise ignored by the core.
    fn extra_argument_keys(&self, _operation: Operation) -> Vec<String> {
        Vec::new()
    }

    /// Functions this plugin makes available to policy expressions.
    fn functions(&self) -> Vec<(String, ExpressionFunction)> {
        Vec::new()
    }

    async fn on_query(&self, request: CrudRequest, next: CrudNext<'_>) -> Result<Value, CrudError> {
        next.run(request).await
    }

    /// Asks for `query` to run in a transaction, with the statements the
    /// plugin issues around it. Only consulted outside of a transaction.
    fn requires_transaction(&self, _query: &Query, _ctx: &SqlContext<'_>) -> bool {
        false
    }

    async fn on_sql_query(
        &self,
        ctx: &SqlContext<'_>,
        query: Query,
        next: SqlNext<'_>,
    ) -> Result<QueryResult, CrudError> {
        next.run(ctx, query).await
    }
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name()).finish()
    }
}

/// The rest of the operation chain after the current plugin.
pub struct CrudNext<'a> {
    pub(crate) plugins: &'a [Arc<dyn Plugin>],
    pub(crate) client: &'a Client,
}

impl CrudNext<'_> {
    pub async fn run(self, request: CrudRequest) -> Result<Value, CrudError> {
        match self.plugins.split_first() {
            Some((plugin, rest)) => {
                let next = CrudNext {
                    plugins: rest,
                    client: self.client,
                };

                plugin.on_query(request, next).await
            }
            None => self.client.handle(request).await,
        }
    }

    /// The client the operation runs on, bound to the open transaction if
    /// there is one.
    pub fn client(&self) -> &Client {
        self.client
    }
}

/// Everything a statement runs with.
pub struct SqlContext<'a> {
    pub schema: &'a Schema,
    pub dialect: &'a dyn Dialect,
    pub computed: &'a ComputedFields,
    pub functions: &'a HashMap<String, ExpressionFunction>,
    /// The authenticated principal, `None` for anonymous access.
    pub auth: Option<&'a Value>,
    /// `None` for statements issued directly.
    pub origin: Option<&'a Origin>,
    pub conn: &'a dyn Queryable,
    pub(crate) log_queries: bool,
}

impl<'a> SqlContext<'a> {
    /// The builder context for queries against this schema and database.
    pub fn builder(&self) -> Context<'a> {
        Context::new(self.schema, self.dialect, self.computed)
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.is_transaction()
    }

    /// The same context on another connection.
    pub fn with_conn<'b>(&self, conn: &'b dyn Queryable) -> SqlContext<'b>
    where
        'a: 'b,
    {
        SqlContext {
            schema: self.schema,
            dialect: self.dialect,
            computed: self.computed,
            functions: self.functions,
            auth: self.auth,
            origin: self.origin,
            conn,
            log_queries: self.log_queries,
        }
    }

    /// Runs `query` on the connection without passing it through any plugin.
    pub async fn query_direct(&self, query: Query) -> Result<QueryResult, CrudError> {
        run_statement(self.conn, query, self.log_queries).await
    }
}

impl fmt::Debug for SqlContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlContext")
            .field("provider", &self.dialect.provider())
            .field("origin", &self.origin)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

/// The rest of the statement chain after the current plugin.
pub struct SqlNext<'a> {
    pub(crate) plugins: &'a [Arc<dyn Plugin>],
}

impl SqlNext<'_> {
    pub async fn run(self, ctx: &SqlContext<'_>, query: Query) -> Result<QueryResult, CrudError> {
        match self.plugins.split_first() {
            Some((plugin, rest)) => plugin.on_sql_query(ctx, query, SqlNext { plugins: rest }).await,
            None => ctx.query_direct(query).await,
        }
    }
}

/// Renders and runs one statement. Inserts always run as queries so that
/// the last inserted id is available.
pub(crate) async fn run_statement(
    conn: &dyn Queryable,
    query: Query,
    log_queries: bool,
) -> Result<QueryResult, CrudError> {
    let as_query = query.returns_rows() || matches!(query, Query::Insert(_));
    let (sql, params) = visitor::build_for(conn.provider(), query)?;

    if log_queries {
        tracing::info!(db.statement = %sql, params = params.len(), "query");
    }

    if as_query {
        let rows = conn.query_raw(&sql, &params).await?;
        let affected_rows = rows.affected_rows().unwrap_or(rows.len() as u64);

        Ok(QueryResult { rows, affected_rows })
    } else {
        let affected_rows = conn.execute_raw(&sql, &params).await?;

        Ok(QueryResult {
            rows: ResultSet::default(),
            affected_rows,
        })
    }
}
