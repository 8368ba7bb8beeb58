use crate::error::*;
use rusqlite::ffi;
use std::fmt;

#[derive(Debug)]
pub struct SqliteError {
    pub extended_code: i32,
    pub message: Option<String>,
}

impl fmt::Display for SqliteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error code {}: {}",
            self.extended_code,
            self.message.as_deref().unwrap_or("unknown error")
        )
    }
}

impl std::error::Error for SqliteError {}

impl SqliteError {
    pub fn new(extended_code: i32, message: Option<String>) -> Self {
        Self { extended_code, message }
    }

    pub fn primary_code(&self) -> i32 {
        self.extended_code & 0xFF
    }
}

/// Constraint messages look like `UNIQUE constraint failed: User.email, User.name`.
fn constraint_fields(description: &str) -> DatabaseConstraint {
    description
        .split(": ")
        .nth(1)
        .map(|s| s.split(", "))
        .map(|i| i.flat_map(|s| s.split('.').last()))
        .map(DatabaseConstraint::fields)
        .unwrap_or(DatabaseConstraint::CannotParse)
}

impl From<SqliteError> for Error {
    fn from(error: SqliteError) -> Self {
        let code = error.extended_code.to_string();

        match error {
            SqliteError {
                extended_code: ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                message: Some(description),
            } => {
                let kind = ErrorKind::UniqueConstraintViolation {
                    constraint: constraint_fields(&description),
                };

                let mut builder = Error::builder(kind);
                builder.set_original_code(code);
                builder.set_original_message(description);

                builder.build()
            }

            SqliteError {
                extended_code: ffi::SQLITE_CONSTRAINT_NOTNULL,
                message: Some(description),
            } => {
                let kind = ErrorKind::NullConstraintViolation {
                    constraint: constraint_fields(&description),
                };

                let mut builder = Error::builder(kind);
                builder.set_original_code(code);
                builder.set_original_message(description);

                builder.build()
            }

            SqliteError {
                extended_code: ffi::SQLITE_CONSTRAINT_FOREIGNKEY | ffi::SQLITE_CONSTRAINT_TRIGGER,
                message: Some(description),
            } => {
                let mut builder = Error::builder(ErrorKind::ForeignKeyConstraintViolation {
                    constraint: DatabaseConstraint::ForeignKey,
                });

                builder.set_original_code(code);
                builder.set_original_message(description);

                builder.build()
            }

            ref e if e.primary_code() == ffi::SQLITE_BUSY => {
                let mut builder = Error::builder(ErrorKind::SocketTimeout);
                builder.set_original_code(code);

                if let Some(description) = &error.message {
                    builder.set_original_message(description.as_str());
                }

                builder.build()
            }

            SqliteError { ref message, .. } => match message {
                Some(d) if d.starts_with("no such table") => {
                    let table = d.split(": ").last().unwrap_or_default().to_owned();

                    let mut builder = Error::builder(ErrorKind::TableDoesNotExist { table });
                    builder.set_original_code(code);
                    builder.set_original_message(d.as_str());

                    builder.build()
                }
                Some(d) if d.starts_with("no such column") => {
                    let column = d.split(": ").last().unwrap_or_default().to_owned();

                    let mut builder = Error::builder(ErrorKind::ColumnNotFound { column });
                    builder.set_original_code(code);
                    builder.set_original_message(d.as_str());

                    builder.build()
                }
                _ => {
                    let description = message.clone();
                    let mut builder = Error::builder(ErrorKind::QueryError(Box::new(error)));
                    builder.set_original_code(code);

                    if let Some(description) = description {
                        builder.set_original_message(description);
                    }

                    builder.build()
                }
            },
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Error {
        match e {
            rusqlite::Error::SqliteFailure(ffi::Error { extended_code, .. }, message) => {
                SqliteError::new(extended_code, message).into()
            }

            rusqlite::Error::ToSqlConversionFailure(error) => match error.downcast::<Error>() {
                Ok(error) => *error,
                Err(error) => Error::builder(ErrorKind::QueryError(error)).build(),
            },

            e => Error::builder(ErrorKind::QueryError(Box::new(e))).build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_keeps_fields_and_code() {
        let error: Error = SqliteError::new(
            ffi::SQLITE_CONSTRAINT_UNIQUE,
            Some("UNIQUE constraint failed: User.email".into()),
        )
        .into();

        assert!(error.is_unique_violation());
        assert_eq!(Some("2067"), error.original_code());

        match error.kind() {
            ErrorKind::UniqueConstraintViolation { constraint } => {
                assert_eq!(&DatabaseConstraint::Fields(vec!["email".into()]), constraint)
            }
            other => panic!("unexpected error kind {other:?}"),
        }
    }
}
