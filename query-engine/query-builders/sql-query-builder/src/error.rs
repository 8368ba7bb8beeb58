use bastion_schema::SchemaError;
use bastion_sql::connector::Provider;
use bastion_value::ConversionFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryBuilderError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Conversion(#[from] ConversionFailure),

    #[error("Invalid filter on `{model}.{field}`: {reason}")]
    InvalidFilter { model: String, field: String, reason: String },

    #[error("Computed field `{model}.{field}` has no implementation")]
    MissingComputedField { model: String, field: String },

    #[error("{feature} is not supported on {provider}")]
    Unsupported { provider: Provider, feature: String },

    #[error("Malformed query result: {0}")]
    MalformedResult(String),
}

impl QueryBuilderError {
    pub(crate) fn invalid_filter(model: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            model: model.to_owned(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(provider: Provider, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            provider,
            feature: feature.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryBuilderError>;
