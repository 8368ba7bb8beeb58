use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// The database engine family, selecting both the SQL dialect and the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Sqlite,
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres,
    Mysql,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Sqlite => f.write_str("sqlite"),
            Provider::Postgres => f.write_str("postgresql"),
            Provider::Mysql => f.write_str("mysql"),
        }
    }
}

/// General information about a SQL connection, parsed from a connection string.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionInfo {
    Sqlite { file_path: String, db_name: String },
    InMemorySqlite,
    Postgres(Url),
    Mysql(Url),
}

impl ConnectionInfo {
    /// Parse `url` into a `ConnectionInfo`.
    ///
    /// SQLite accepts `file:path`, `sqlite:path` and `:memory:`; query
    /// parameters after the path are ignored.
    pub fn from_url(url_str: &str) -> crate::Result<Self> {
        let sqlite_path = url_str
            .strip_prefix("file:")
            .or_else(|| url_str.strip_prefix("sqlite:"))
            .map(|rest| rest.trim_start_matches("//"));

        if let Some(rest) = sqlite_path {
            let path = rest.split('?').next().unwrap_or_default();

            if path.is_empty() || path == ":memory:" {
                return Ok(ConnectionInfo::InMemorySqlite);
            }

            let db_name = std::path::Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_owned());

            return Ok(ConnectionInfo::Sqlite {
                file_path: path.to_owned(),
                db_name,
            });
        }

        if url_str == ":memory:" {
            return Ok(ConnectionInfo::InMemorySqlite);
        }

        let url = Url::parse(url_str)?;

        match url.scheme() {
            "postgres" | "postgresql" => Ok(ConnectionInfo::Postgres(url)),
            "mysql" => Ok(ConnectionInfo::Mysql(url)),
            scheme => Err(Error::builder(ErrorKind::DatabaseUrlIsInvalid(format!(
                "unsupported scheme `{scheme}`"
            )))
            .build()),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ConnectionInfo::Sqlite { .. } | ConnectionInfo::InMemorySqlite => Provider::Sqlite,
            ConnectionInfo::Postgres(_) => Provider::Postgres,
            ConnectionInfo::Mysql(_) => Provider::Mysql,
        }
    }

    /// The database name, `None` for in-memory databases.
    pub fn dbname(&self) -> Option<&str> {
        match self {
            ConnectionInfo::Sqlite { db_name, .. } => Some(db_name.as_str()),
            ConnectionInfo::InMemorySqlite => None,
            ConnectionInfo::Postgres(url) | ConnectionInfo::Mysql(url) => {
                url.path_segments().and_then(|mut segments| segments.next())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls() {
        assert_eq!(
            ConnectionInfo::Sqlite {
                file_path: "dev.db".into(),
                db_name: "dev".into()
            },
            ConnectionInfo::from_url("file:dev.db?connection_limit=1").unwrap()
        );

        assert_eq!(ConnectionInfo::InMemorySqlite, ConnectionInfo::from_url("file::memory:").unwrap());
        assert_eq!(ConnectionInfo::InMemorySqlite, ConnectionInfo::from_url(":memory:").unwrap());
    }

    #[test]
    fn network_urls() {
        let info = ConnectionInfo::from_url("postgresql://user:pw@localhost:5432/app").unwrap();

        assert_eq!(Provider::Postgres, info.provider());
        assert_eq!(Some("app"), info.dbname());

        let info = ConnectionInfo::from_url("mysql://root@localhost/shop").unwrap();
        assert_eq!(Provider::Mysql, info.provider());

        assert!(ConnectionInfo::from_url("mongodb://localhost").is_err());
    }
}
