use serde::{Deserialize, Serialize};

/// A field-level validation attribute, checked against incoming `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationRule {
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default)]
        message: Option<String>,
    },
    Regex {
        pattern: String,
        #[serde(default)]
        message: Option<String>,
    },
    Email {
        #[serde(default)]
        message: Option<String>,
    },
    Url {
        #[serde(default)]
        message: Option<String>,
    },
    StartsWith {
        text: String,
        #[serde(default)]
        message: Option<String>,
    },
    EndsWith {
        text: String,
        #[serde(default)]
        message: Option<String>,
    },
    Contains {
        text: String,
        #[serde(default)]
        message: Option<String>,
    },
    Gt {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Gte {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Lt {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Lte {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ValidationRule {
    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::Length { min, max, message: None }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            message: None,
        }
    }

    pub fn email() -> Self {
        Self::Email { message: None }
    }

    pub fn gt(value: f64) -> Self {
        Self::Gt { value, message: None }
    }

    pub fn gte(value: f64) -> Self {
        Self::Gte { value, message: None }
    }

    pub fn lt(value: f64) -> Self {
        Self::Lt { value, message: None }
    }

    pub fn lte(value: f64) -> Self {
        Self::Lte { value, message: None }
    }

    /// The attribute name as written in the modeling language.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationRule::Length { .. } => "@length",
            ValidationRule::Regex { .. } => "@regex",
            ValidationRule::Email { .. } => "@email",
            ValidationRule::Url { .. } => "@url",
            ValidationRule::StartsWith { .. } => "@startsWith",
            ValidationRule::EndsWith { .. } => "@endsWith",
            ValidationRule::Contains { .. } => "@contains",
            ValidationRule::Gt { .. } => "@gt",
            ValidationRule::Gte { .. } => "@gte",
            ValidationRule::Lt { .. } => "@lt",
            ValidationRule::Lte { .. } => "@lte",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationRule::Length { message, .. }
            | ValidationRule::Regex { message, .. }
            | ValidationRule::Email { message }
            | ValidationRule::Url { message }
            | ValidationRule::StartsWith { message, .. }
            | ValidationRule::EndsWith { message, .. }
            | ValidationRule::Contains { message, .. }
            | ValidationRule::Gt { message, .. }
            | ValidationRule::Gte { message, .. }
            | ValidationRule::Lt { message, .. }
            | ValidationRule::Lte { message, .. } => message.as_deref(),
        }
    }

    /// Whether the rule applies to string values. The others are numeric.
    pub fn is_textual(&self) -> bool {
        !matches!(
            self,
            ValidationRule::Gt { .. } | ValidationRule::Gte { .. } | ValidationRule::Lt { .. } | ValidationRule::Lte { .. }
        )
    }
}
