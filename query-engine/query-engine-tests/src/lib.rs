//! Fixtures for the end-to-end tests under `tests/`.
//!
//! Every test opens its own in-memory SQLite database, creates the tables of
//! one of the [`schemas`] and talks to it through a [`Runner`].

pub mod schemas;

use bastion_core::{Client, CrudError, ErrorKind, RejectionReason};
use bastion_policy::PolicyPlugin;
use bastion_schema::Schema;
use bastion_sql::connector::{Queryable, Sqlite};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub use schemas::Fixture;

pub type TestResult = anyhow::Result<()>;

pub struct Runner {
    conn: Arc<Sqlite>,
    db: Client,
}

impl Runner {
    pub async fn load(fixture: Fixture) -> anyhow::Result<Self> {
        let schema = Schema::from_json(fixture.schema)?;
        let conn = Arc::new(Sqlite::new_in_memory()?);

        conn.raw_cmd(fixture.ddl).await?;

        let db = Client::new(schema, conn.clone())?;

        Ok(Self { conn, db })
    }

    /// The client without any access control.
    pub fn db(&self) -> &Client {
        &self.db
    }

    /// A policy-enforcing client acting for `auth`, anonymous for `null`.
    pub fn enhanced(&self, auth: JsonValue) -> Client {
        self.db.with_plugin(PolicyPlugin::new()).with_auth(auth)
    }

    pub fn anonymous(&self) -> Client {
        self.enhanced(JsonValue::Null)
    }

    /// Counts the rows of `table` on the raw connection.
    pub async fn row_count(&self, table: &str) -> anyhow::Result<i64> {
        let rows = self.conn.query_raw(&format!("SELECT COUNT(*) FROM \"{table}\""), &[]).await?;

        Ok(rows
            .first()
            .and_then(|row| row.at(0).and_then(|v| v.as_i64()))
            .unwrap_or_default())
    }
}

/// Unwraps the error of an operation that must fail.
pub fn expect_err<T: std::fmt::Debug>(result: Result<T, CrudError>) -> CrudError {
    match result {
        Ok(value) => panic!("expected the operation to fail, got {value:?}"),
        Err(err) => err,
    }
}

pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, CrudError>) {
    assert_eq!(ErrorKind::NotFound, expect_err(result).kind());
}

pub fn assert_rejected<T: std::fmt::Debug>(result: Result<T, CrudError>, reason: RejectionReason) {
    let err = expect_err(result);

    assert_eq!(ErrorKind::RejectedByPolicy, err.kind(), "{err}");
    assert_eq!(Some(reason), err.rejection_reason());
}

/// Runs an operation that must succeed and returns its result as JSON.
#[macro_export]
macro_rules! run_query {
    ($operation:expr) => {{
        let result: bastion_value::Value = $operation.await?;
        result.to_json()
    }};
}

/// Compares the JSON result of an operation with the expected JSON.
#[macro_export]
macro_rules! assert_query {
    ($operation:expr, $($expected:tt)+) => {
        pretty_assertions::assert_eq!(serde_json::json!($($expected)+), $crate::run_query!($operation));
    };
}
