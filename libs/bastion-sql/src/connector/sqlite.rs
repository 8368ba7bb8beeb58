mod conversion;
mod error;

pub use error::SqliteError;

use self::conversion::{value_from_ref, SqliteParam};
use super::{ConnectionInfo, IsolationLevel, Provider, Queryable, ResultSet, Transaction, TransactionCapable};
use crate::{
    ast::Value,
    error::{Error, ErrorKind},
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::sync::{Mutex, OwnedMutexGuard};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A connector interface for the SQLite database.
///
/// The connection is guarded by an async mutex. An open transaction holds the
/// guard until it is committed or rolled back, so statements issued outside of
/// it wait for it to finish.
pub struct Sqlite {
    client: Arc<Mutex<rusqlite::Connection>>,
}

impl Sqlite {
    /// Opens a database file, creating it if missing.
    pub fn new(file_path: &str) -> crate::Result<Sqlite> {
        let conn = rusqlite::Connection::open(file_path)?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn new_in_memory() -> crate::Result<Sqlite> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    pub fn from_info(info: &ConnectionInfo) -> crate::Result<Sqlite> {
        match info {
            ConnectionInfo::Sqlite { file_path, .. } => Self::new(file_path),
            ConnectionInfo::InMemorySqlite => Self::new_in_memory(),
            other => Err(Error::builder(ErrorKind::DatabaseUrlIsInvalid(format!(
                "`{}` is not a SQLite connection",
                other.provider()
            )))
            .build()),
        }
    }

    fn with_connection(conn: rusqlite::Connection) -> crate::Result<Sqlite> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;

        Ok(Sqlite {
            client: Arc::new(Mutex::new(conn)),
        })
    }
}

fn log_statement(sql: &str, params: &[Value]) {
    tracing::debug!(db.statement = %sql, params = params.len(), "sqlite query");
}

fn query_on(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> crate::Result<ResultSet> {
    log_statement(sql, params);

    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(ToOwned::to_owned).collect();
    let column_count = columns.len();

    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(SqliteParam)))?;
    let mut values = Vec::new();

    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(column_count);

        for idx in 0..column_count {
            record.push(value_from_ref(row.get_ref(idx)?));
        }

        values.push(record);
    }

    let mut result = ResultSet::new(columns, values);

    let keyword = sql.trim_start().get(..6).unwrap_or_default().to_ascii_uppercase();

    if matches!(keyword.as_str(), "INSERT" | "UPDATE" | "DELETE") {
        result.set_affected_rows(conn.changes());
    }

    if keyword == "INSERT" {
        if let Ok(id) = u64::try_from(conn.last_insert_rowid()) {
            result.set_last_insert_id(id);
        }
    }

    Ok(result)
}

fn execute_on(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> crate::Result<u64> {
    log_statement(sql, params);

    let mut stmt = conn.prepare_cached(sql)?;
    let changes = stmt.execute(rusqlite::params_from_iter(params.iter().map(SqliteParam)))?;

    Ok(changes as u64)
}

#[async_trait]
impl Queryable for Sqlite {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> crate::Result<ResultSet> {
        let client = self.client.lock().await;
        query_on(&client, sql, params)
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> crate::Result<u64> {
        let client = self.client.lock().await;
        execute_on(&client, sql, params)
    }

    async fn raw_cmd(&self, cmd: &str) -> crate::Result<()> {
        tracing::debug!(db.statement = %cmd, "sqlite command");

        let client = self.client.lock().await;
        client.execute_batch(cmd)?;

        Ok(())
    }
}

#[async_trait]
impl TransactionCapable for Sqlite {
    fn as_queryable(&self) -> &dyn Queryable {
        self
    }

    async fn start_transaction(&self, isolation: Option<IsolationLevel>) -> crate::Result<Arc<dyn Transaction>> {
        // SQLite transactions are always serializable.
        if let Some(level) = isolation {
            tracing::debug!(requested = %level, "sqlite transactions run serializable");
        }

        let guard = Arc::clone(&self.client).lock_owned().await;
        guard.execute_batch("BEGIN")?;

        tracing::debug!("transaction started");

        Ok(Arc::new(SqliteTransaction {
            conn: Mutex::new(Some(guard)),
        }))
    }
}

/// An open SQLite transaction owning the connection until it finishes.
pub struct SqliteTransaction {
    conn: Mutex<Option<OwnedMutexGuard<rusqlite::Connection>>>,
}

impl SqliteTransaction {
    async fn finish(&self, statement: &str) -> crate::Result<()> {
        let mut slot = self.conn.lock().await;

        match slot.take() {
            Some(conn) => {
                conn.execute_batch(statement)?;
                tracing::debug!(statement, "transaction finished");
                Ok(())
            }
            None => Err(Error::builder(ErrorKind::TransactionAlreadyClosed(format!(
                "cannot {} a closed transaction",
                statement.to_lowercase()
            )))
            .build()),
        }
    }
}

fn closed() -> Error {
    Error::builder(ErrorKind::TransactionAlreadyClosed(
        "the transaction was already committed or rolled back".into(),
    ))
    .build()
}

#[async_trait]
impl Queryable for SqliteTransaction {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> crate::Result<ResultSet> {
        let slot = self.conn.lock().await;
        let conn = slot.as_ref().ok_or_else(closed)?;

        query_on(conn, sql, params)
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> crate::Result<u64> {
        let slot = self.conn.lock().await;
        let conn = slot.as_ref().ok_or_else(closed)?;

        execute_on(conn, sql, params)
    }

    async fn raw_cmd(&self, cmd: &str) -> crate::Result<()> {
        let slot = self.conn.lock().await;
        let conn = slot.as_ref().ok_or_else(closed)?;
        conn.execute_batch(cmd)?;

        Ok(())
    }

    fn is_transaction(&self) -> bool {
        true
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(&self) -> crate::Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> crate::Result<()> {
        self.finish("ROLLBACK").await
    }

    fn as_queryable(&self) -> &dyn Queryable {
        self
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            tracing::debug!("rolling back a dropped transaction");

            if let Err(err) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(%err, "rollback of a dropped transaction failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> Sqlite {
        let conn = Sqlite::new_in_memory().unwrap();

        conn.raw_cmd("CREATE TABLE `User` (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, admin BOOLEAN)")
            .await
            .unwrap();

        conn
    }

    #[tokio::test]
    async fn insert_and_select() {
        let conn = setup().await;

        let insert = Insert::single_into("User")
            .value("name", val("musti"))
            .value("admin", val(true))
            .returning(["id", "name"]);

        let inserted = conn.insert(insert).await.unwrap();
        let row = inserted.into_single().unwrap();

        assert_eq!(Some(&Value::Int(1)), row.get("id"));

        let rows = conn.select(Select::from_table("User")).await.unwrap();
        let row = rows.into_single().unwrap();

        assert_eq!(Some(&Value::String("musti".into())), row.get("name"));
        assert_eq!(Some(&Value::Int(1)), row.get("admin"));
    }

    #[tokio::test]
    async fn unique_violation_is_mapped() {
        let conn = setup().await;

        conn.execute_raw("INSERT INTO `User` (name) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();

        let err = conn
            .execute_raw("INSERT INTO `User` (name) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(Some("2067"), err.original_code());
    }

    #[test]
    fn extended_codes_keep_their_primary_code() {
        use crate::connector::SqliteError;
        use rusqlite::ffi;

        let error = SqliteError::new(ffi::SQLITE_CONSTRAINT_NOTNULL, None);

        assert_eq!(ffi::SQLITE_CONSTRAINT, error.primary_code());
    }

    #[tokio::test]
    async fn dropped_transactions_roll_back() {
        let conn = setup().await;

        {
            let tx = conn.start_transaction(None).await.unwrap();
            tx.execute_raw("INSERT INTO `User` (name) VALUES (?)", &[Value::from("a")])
                .await
                .unwrap();
        }

        let rows = conn.select(Select::from_table("User")).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn committed_transactions_persist() {
        let conn = setup().await;

        let tx = conn.start_transaction(Some(IsolationLevel::RepeatableRead)).await.unwrap();
        tx.execute_raw("INSERT INTO `User` (name) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(tx.commit().await.is_err());

        let rows = conn.select(Select::from_table("User")).await.unwrap();
        assert_eq!(1, rows.len());
    }
}
