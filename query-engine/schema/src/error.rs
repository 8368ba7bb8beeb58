use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid schema document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Model `{0}` does not exist")]
    ModelNotFound(String),

    #[error("Field `{field}` does not exist on model `{model}`")]
    FieldNotFound { model: String, field: String },

    #[error("Model `{0}` needs at least one id or unique criterion")]
    MissingUniqueCriterion(String),

    #[error("Relation `{model}.{field}` is invalid: {reason}")]
    InvalidRelation {
        model: String,
        field: String,
        reason: String,
    },

    #[error("Delegate hierarchy of `{model}` is invalid: {reason}")]
    InvalidDelegate { model: String, reason: String },

    #[error("Policy rule on `{model}` is invalid: {reason}")]
    InvalidPolicy { model: String, reason: String },

    #[error("Cyclic policy dependency detected: {0}")]
    CyclicPolicy(String),

    #[error("Validation attribute on `{model}.{field}` is invalid: {reason}")]
    InvalidValidation {
        model: String,
        field: String,
        reason: String,
    },
}

impl SchemaError {
    pub(crate) fn relation(model: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRelation {
            model: model.to_owned(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn policy(model: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            model: model.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn field_not_found(model: &str, field: &str) -> Self {
        Self::FieldNotFound {
            model: model.to_owned(),
            field: field.to_owned(),
        }
    }
}
