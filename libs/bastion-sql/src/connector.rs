//! A set of abstractions for database connections.
//!
//! Connectors render a query tree with the visitor of their provider and
//! execute it. Only SQLite ships with a native driver; other engines plug in
//! by implementing [`Queryable`] and [`TransactionCapable`] over their driver.
mod connection_info;
mod queryable;
mod result_set;
mod sqlite;
mod transaction;

pub use connection_info::{ConnectionInfo, Provider};
pub use queryable::{Queryable, TransactionCapable};
pub use result_set::{ResultRow, ResultSet};
pub use sqlite::{Sqlite, SqliteError, SqliteTransaction};
pub use transaction::{IsolationLevel, Transaction};

use crate::error::{Error, ErrorKind};
use std::sync::Arc;

/// Opens a connection with the native driver of the URL's provider.
pub fn connect(url: &str) -> crate::Result<Arc<dyn TransactionCapable>> {
    let info = ConnectionInfo::from_url(url)?;

    match info {
        ConnectionInfo::Sqlite { .. } | ConnectionInfo::InMemorySqlite => Ok(Arc::new(Sqlite::from_info(&info)?)),
        ConnectionInfo::Postgres(_) => Err(Error::from(ErrorKind::UnsupportedProvider("postgresql"))),
        ConnectionInfo::Mysql(_) => Err(Error::from(ErrorKind::UnsupportedProvider("mysql"))),
    }
}
