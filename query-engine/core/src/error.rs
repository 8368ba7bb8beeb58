use bastion_query_structure::CoercionError;
use bastion_schema::SchemaError;
use bastion_sql_query_builder::QueryBuilderError;
use std::fmt;
use thiserror::Error;

/// The discriminator of a [`CrudError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    RejectedByPolicy,
    InvalidInput,
    DbQuery,
    Internal,
}

/// Why an operation was rejected by an access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// The operation itself was denied.
    NoAccess,
    /// The write went through but its result is not readable.
    CannotReadBack,
    Other,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NoAccess => f.write_str("no access"),
            RejectionReason::CannotReadBack => f.write_str("result is not allowed to be read back"),
            RejectionReason::Other => f.write_str("rejected"),
        }
    }
}

/// One problem found in the arguments of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path into the arguments, e.g. `data.posts.create.title`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "`{}`: {}", self.path, self.message)
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("No `{model}` record was found")]
    NotFound { model: String },

    #[error("Operation on `{model}` rejected by access policy: {reason}")]
    RejectedByPolicy { model: String, reason: RejectionReason },

    #[error("Invalid arguments: {}", join_violations(.violations))]
    InvalidInput { violations: Vec<Violation> },

    #[error("Database query failed{}: {message}", .code.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    DbQuery {
        /// The engine's native code: SQLite extended result code, PostgreSQL
        /// SQLSTATE or MySQL error number.
        code: Option<String>,
        message: String,
        #[source]
        source: Option<bastion_sql::Error>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrudError::NotFound { .. } => ErrorKind::NotFound,
            CrudError::RejectedByPolicy { .. } => ErrorKind::RejectedByPolicy,
            CrudError::InvalidInput { .. } => ErrorKind::InvalidInput,
            CrudError::DbQuery { .. } => ErrorKind::DbQuery,
            CrudError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(model: impl Into<String>) -> Self {
        CrudError::NotFound { model: model.into() }
    }

    pub fn rejected(model: impl Into<String>, reason: RejectionReason) -> Self {
        CrudError::RejectedByPolicy {
            model: model.into(),
            reason,
        }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        CrudError::InvalidInput {
            violations: vec![Violation::new(path, message)],
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CrudError::Internal(message.into())
    }

    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            CrudError::RejectedByPolicy { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            CrudError::InvalidInput { violations } => violations,
            _ => &[],
        }
    }

    /// The native database error code, if the database rejected the query.
    pub fn db_code(&self) -> Option<&str> {
        match self {
            CrudError::DbQuery { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<bastion_sql::Error> for CrudError {
    fn from(err: bastion_sql::Error) -> Self {
        let code = err.original_code().map(ToOwned::to_owned);
        let message = err.original_message().map(ToOwned::to_owned).unwrap_or_else(|| err.to_string());

        CrudError::DbQuery {
            code,
            message,
            source: Some(err),
        }
    }
}

impl From<QueryBuilderError> for CrudError {
    fn from(err: QueryBuilderError) -> Self {
        match err {
            QueryBuilderError::Schema(err) => err.into(),
            QueryBuilderError::InvalidFilter { model, field, reason } => {
                CrudError::invalid(format!("{model}.{field}"), reason)
            }
            err @ QueryBuilderError::Unsupported { .. } => CrudError::invalid("", err.to_string()),
            err @ QueryBuilderError::MissingComputedField { .. } => CrudError::invalid("", err.to_string()),
            err @ (QueryBuilderError::Conversion(_) | QueryBuilderError::MalformedResult(_)) => {
                CrudError::Internal(err.to_string())
            }
        }
    }
}

impl From<SchemaError> for CrudError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::ModelNotFound(model) => CrudError::invalid("", format!("model `{model}` does not exist")),
            SchemaError::FieldNotFound { model, field } => {
                CrudError::invalid(field.clone(), format!("`{model}` has no field `{field}`"))
            }
            other => CrudError::Internal(other.to_string()),
        }
    }
}

impl From<CoercionError> for CrudError {
    fn from(err: CoercionError) -> Self {
        CrudError::invalid("", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_violation_is_listed() {
        let err = CrudError::InvalidInput {
            violations: vec![
                Violation::new("where", "a unique filter is required"),
                Violation::new("data.email", "@email: not an email address"),
            ],
        };

        assert_eq!(ErrorKind::InvalidInput, err.kind());
        assert_eq!(
            "Invalid arguments: `where`: a unique filter is required; `data.email`: @email: not an email address",
            err.to_string()
        );
    }

    #[test]
    fn builder_errors_map_onto_the_taxonomy() {
        let err: CrudError = QueryBuilderError::MalformedResult("bad JSON".into()).into();
        assert_eq!(ErrorKind::Internal, err.kind());

        let err: CrudError = SchemaError::ModelNotFound("Nope".into()).into();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }
}
