use super::{IsolationLevel, Provider, ResultSet, Transaction};
use crate::{ast::*, visitor};
use async_trait::async_trait;
use std::sync::Arc;

/// Represents a connection or a transaction that can be queried.
///
/// Implementors provide the raw execution methods; the query tree methods
/// render with the visitor of [`Queryable::provider`] by default.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// The engine family of the connection.
    fn provider(&self) -> Provider;

    /// Execute a query given as SQL, interpolating the given parameters.
    async fn query_raw(&self, sql: &str, params: &[Value]) -> crate::Result<ResultSet>;

    /// Execute a query given as SQL, interpolating the given parameters and
    /// returning the number of affected rows.
    async fn execute_raw(&self, sql: &str, params: &[Value]) -> crate::Result<u64>;

    /// Run a command in the database, for queries that can't be run using
    /// prepared statements.
    async fn raw_cmd(&self, cmd: &str) -> crate::Result<()>;

    /// Whether this handle is an open transaction.
    fn is_transaction(&self) -> bool {
        false
    }

    /// Execute the given query.
    async fn query(&self, q: Query) -> crate::Result<ResultSet> {
        let (sql, params) = visitor::build_for(self.provider(), q)?;
        self.query_raw(&sql, &params).await
    }

    /// Execute the given query, returning the number of affected rows.
    async fn execute(&self, q: Query) -> crate::Result<u64> {
        let (sql, params) = visitor::build_for(self.provider(), q)?;
        self.execute_raw(&sql, &params).await
    }

    /// Execute a `SELECT` query.
    async fn select(&self, q: Select) -> crate::Result<ResultSet> {
        self.query(q.into()).await
    }

    /// Execute an `INSERT` query.
    async fn insert(&self, q: Insert) -> crate::Result<ResultSet> {
        self.query(q.into()).await
    }

    /// Execute an `UPDATE` query, returning the number of affected rows.
    async fn update(&self, q: Update) -> crate::Result<u64> {
        self.execute(q.into()).await
    }

    /// Execute a `DELETE` query, returning the number of affected rows.
    async fn delete(&self, q: Delete) -> crate::Result<u64> {
        self.execute(q.into()).await
    }
}

/// A thing that can start a new transaction.
#[async_trait]
pub trait TransactionCapable: Queryable {
    fn as_queryable(&self) -> &dyn Queryable;

    /// Starts a new transaction. The transaction is rolled back when dropped
    /// without a commit.
    async fn start_transaction(&self, isolation: Option<IsolationLevel>) -> crate::Result<Arc<dyn Transaction>>;
}
