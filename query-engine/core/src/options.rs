use bastion_sql::connector::IsolationLevel;
use bastion_sql_query_builder::ComputedFields;
use serde::Deserialize;

/// Settings of a [`crate::Client`].
///
/// Everything but `computed_fields` can be deserialized, e.g. from the
/// plugin section of a configuration file:
///
/// ```json
/// { "logQueries": true, "nestedWriteIsolation": "Serializable" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Logs every executed statement at `info` level.
    pub log_queries: bool,
    /// Isolation of the transaction around nested writes. Levels weaker than
    /// `RepeatableRead` are raised to it.
    pub nested_write_isolation: IsolationLevel,
    /// SQL implementations of the schema's computed fields.
    #[serde(skip)]
    pub computed_fields: ComputedFields,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            log_queries: false,
            nested_write_isolation: IsolationLevel::RepeatableRead,
            computed_fields: ComputedFields::default(),
        }
    }
}

impl ClientOptions {
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn computed_field<F>(mut self, model: &str, field: &str, f: F) -> Self
    where
        F: Fn(&str) -> bastion_sql::ast::Expression + Send + Sync + 'static,
    {
        self.computed_fields.register(model, field, f);
        self
    }

    pub(crate) fn write_isolation(&self) -> IsolationLevel {
        self.nested_write_isolation.max(IsolationLevel::RepeatableRead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_with_defaults() {
        let options: ClientOptions = serde_json::from_str(r#"{ "logQueries": true }"#).unwrap();

        assert!(options.log_queries);
        assert_eq!(IsolationLevel::RepeatableRead, options.nested_write_isolation);
    }

    #[test]
    fn isolation_is_at_least_repeatable_read() {
        let options: ClientOptions = serde_json::from_str(r#"{ "nestedWriteIsolation": "ReadCommitted" }"#).unwrap();
        assert_eq!(IsolationLevel::RepeatableRead, options.write_isolation());

        let options: ClientOptions = serde_json::from_str(r#"{ "nestedWriteIsolation": "Serializable" }"#).unwrap();
        assert_eq!(IsolationLevel::Serializable, options.write_isolation());
    }
}
