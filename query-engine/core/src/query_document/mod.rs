//! Validation and normalization of untyped operation arguments.
//!
//! Arguments arrive as JSON in the shape of the client API. Parsing checks
//! every key against the model (unknown keys are rejected), coerces values
//! to the types of their fields and produces the typed IR of
//! `bastion-query-structure`. All problems found are reported together.

mod arguments;
mod data;
mod filter;
mod parser;
mod selection;
mod validation;

pub(crate) use parser::ArgumentPath;

use crate::{error::CrudError, operation::Operation, plugin::Plugin};
use bastion_query_structure::{
    AggregationSelection, CreateInput, FieldSelection, Filter, QueryArguments, UpdateInput, WriteArgs,
};
use bastion_schema::{Schema, ValidationRule};
use parser::ArgumentParser;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug, Clone, PartialEq)]
pub struct FindArgs {
    pub args: QueryArguments,
    pub selection: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateArgs {
    pub data: CreateInput,
    pub selection: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateManyArgs {
    pub data: Vec<WriteArgs>,
    pub skip_duplicates: bool,
    /// The selection of the returned records (`createManyAndReturn`).
    pub selection: Option<FieldSelection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub filter: Filter,
    pub data: UpdateInput,
    pub selection: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateManyArgs {
    pub filter: Filter,
    pub data: WriteArgs,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertArgs {
    pub filter: Filter,
    pub create: CreateInput,
    pub update: UpdateInput,
    pub selection: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteArgs {
    pub filter: Filter,
    pub selection: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteManyArgs {
    pub filter: Filter,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountArgs {
    pub args: QueryArguments,
    /// `select: { _all: true, field: true }`. Without it the result is the
    /// plain number of rows.
    pub select: Option<CountSelection>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountSelection {
    pub all: bool,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateArgs {
    pub args: QueryArguments,
    pub selections: Vec<AggregationSelection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupByArgs {
    pub args: QueryArguments,
    pub by: Vec<String>,
    pub having: Option<Filter>,
    pub selections: Vec<AggregationSelection>,
}

/// The validated arguments of one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedArgs {
    Find(FindArgs),
    Create(CreateArgs),
    CreateMany(CreateManyArgs),
    Update(UpdateArgs),
    UpdateMany(UpdateManyArgs),
    Upsert(UpsertArgs),
    Delete(DeleteArgs),
    DeleteMany(DeleteManyArgs),
    Count(CountArgs),
    Aggregate(AggregateArgs),
    GroupBy(GroupByArgs),
}

/// Validates the arguments of a client.
///
/// Everything derived from the schema and the client's plugins is computed
/// once on construction, so a validator is specific to one (schema, plugin
/// list) pair. Extending a client builds a new one.
pub struct Validator {
    schema: Arc<Schema>,
    extra_keys: HashMap<Operation, Vec<String>>,
    patterns: HashMap<String, Regex>,
}

impl Validator {
    pub fn new(schema: Arc<Schema>, plugins: &[Arc<dyn Plugin>]) -> Self {
        let extra_keys = Operation::ALL
            .into_iter()
            .map(|op| (op, plugins.iter().flat_map(|p| p.extra_argument_keys(op)).collect()))
            .collect();

        let patterns = schema
            .models
            .values()
            .flat_map(|m| m.fields.values())
            .chain(schema.type_defs.values().flat_map(|t| t.fields.values()))
            .flat_map(|f| f.validations.iter())
            .filter_map(|rule| match rule {
                ValidationRule::Regex { pattern, .. } => Regex::new(pattern).ok().map(|re| (pattern.clone(), re)),
                _ => None,
            })
            .collect();

        Self {
            schema,
            extra_keys,
            patterns,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Top-level keys a plugin declared for `operation`. Core ignores them.
    pub fn extra_keys(&self, operation: Operation) -> &[String] {
        self.extra_keys.get(&operation).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn pattern(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }

    pub fn parse(&self, model: &str, operation: Operation, args: &JsonValue) -> Result<ParsedArgs, CrudError> {
        let model = self.schema.model(model)?;
        let mut parser = ArgumentParser::new(self, operation);
        let parsed = parser.parse_operation(model, args);

        parser.finish(parsed)
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("extra_keys", &self.extra_keys)
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Violation};
    use async_trait::async_trait;
    use bastion_query_structure::WriteOperation;
    use bastion_value::Value;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        let document = indoc! {r#"
            {
              "provider": "sqlite",
              "models": {
                "User": {
                  "fields": {
                    "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                    "email": { "type": "String", "unique": true, "validations": [{ "kind": "email" }] },
                    "name": { "type": "String", "optional": true, "validations": [{ "kind": "length", "max": 5 }] },
                    "age": { "type": "Int", "default": 0 },
                    "posts": { "type": "Post", "array": true, "relation": { "opposite": "author" } }
                  }
                },
                "Post": {
                  "fields": {
                    "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                    "title": { "type": "String" },
                    "authorId": { "type": "Int" },
                    "author": {
                      "type": "User",
                      "relation": { "fields": ["authorId"], "references": ["id"], "opposite": "posts" }
                    }
                  }
                }
              }
            }
        "#};

        Arc::new(Schema::from_json(document).unwrap())
    }

    fn violations(validator: &Validator, model: &str, operation: Operation, args: JsonValue) -> Vec<Violation> {
        let err = validator.parse(model, operation, &args).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        match err {
            CrudError::InvalidInput { violations } => violations,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn paths(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(&validator, "User", Operation::FindMany, json!({ "wher": { "id": 1 } }));

        assert_eq!(vec![Violation::new("wher", "unknown argument `wher`")], found);
    }

    #[test]
    fn all_violations_are_reported_together() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(
            &validator,
            "User",
            Operation::Create,
            json!({ "data": { "nickname": "x" }, "select": { "id": true }, "include": { "posts": true } }),
        );

        let mut found = paths(&found);
        found.sort_unstable();

        assert_eq!(vec!["", "data.email", "data.nickname"], found);
    }

    #[test]
    fn required_fields_without_default_must_be_given() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(&validator, "User", Operation::Create, json!({ "data": { "age": 3 } }));

        assert_eq!(vec![Violation::new("data.email", "argument is required")], found);
    }

    #[test]
    fn find_unique_needs_a_unique_criterion() {
        let validator = Validator::new(schema(), &[]);

        let missing = violations(&validator, "User", Operation::FindUnique, json!({}));
        assert_eq!(vec!["where"], paths(&missing));

        let non_unique = violations(&validator, "User", Operation::FindUnique, json!({ "where": { "age": 3 } }));
        assert_eq!(vec!["where"], paths(&non_unique));
        assert!(non_unique[0].message.contains("a unique filter on `User` is required"));

        let parsed = validator
            .parse("User", Operation::FindUnique, &json!({ "where": { "email": "a@b.c", "age": 3 } }))
            .unwrap();

        assert!(matches!(parsed, ParsedArgs::Find(_)));
    }

    #[test]
    fn numeric_operations_need_numeric_fields() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(
            &validator,
            "User",
            Operation::Update,
            json!({ "where": { "id": 1 }, "data": { "email": { "increment": 1 } } }),
        );

        assert_eq!(
            vec![Violation::new("data.email.increment", "`increment` needs a numeric field")],
            found
        );

        let parsed = validator
            .parse(
                "User",
                Operation::UpdateMany,
                &json!({ "data": { "age": { "multiply": 2 } } }),
            )
            .unwrap();

        match parsed {
            ParsedArgs::UpdateMany(args) => {
                assert_eq!(Some(&WriteOperation::Multiply(Value::Int(2))), args.data.get("age"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validation_attributes_are_checked() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(
            &validator,
            "User",
            Operation::Create,
            json!({ "data": { "email": "nope", "name": "too long" } }),
        );

        assert_eq!(
            vec![
                Violation::new("data.email", "@email: must be a valid email address"),
                Violation::new("data.name", "@length: must be at most 5 characters long"),
            ],
            found
        );
    }

    #[test]
    fn nulls_are_rejected_for_required_fields() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(
            &validator,
            "User",
            Operation::Update,
            json!({ "where": { "id": 1 }, "data": { "email": null } }),
        );

        assert_eq!(vec![Violation::new("data.email", "must not be null")], found);
    }

    #[test]
    fn invalid_values_are_not_also_reported_missing() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(&validator, "User", Operation::Create, json!({ "data": { "email": null } }));

        assert_eq!(vec![Violation::new("data.email", "must not be null")], found);

        let found = violations(&validator, "User", Operation::Create, json!({ "data": { "email": 7 } }));

        assert_eq!(vec!["data.email"], paths(&found));
    }

    #[test]
    fn nested_writes_are_validated_along_their_path() {
        let validator = Validator::new(schema(), &[]);
        let found = violations(
            &validator,
            "User",
            Operation::Create,
            json!({ "data": { "email": "a@b.c", "posts": { "create": [{ "title": "t" }, {}] } } }),
        );

        assert_eq!(vec!["data.posts.create[1].title"], paths(&found));
    }

    struct Tagging;

    #[async_trait]
    impl Plugin for Tagging {
        fn name(&self) -> &str {
            "tagging"
        }

        fn extra_argument_keys(&self, operation: Operation) -> Vec<String> {
            match operation {
                Operation::FindMany => vec!["tag".to_owned()],
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn plugins_can_declare_extra_keys() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(Tagging)];
        let validator = Validator::new(schema(), &plugins);

        assert_eq!(["tag".to_owned()], validator.extra_keys(Operation::FindMany));
        assert!(validator
            .parse("User", Operation::FindMany, &json!({ "tag": "x" }))
            .is_ok());

        let found = violations(&validator, "User", Operation::Count, json!({ "tag": "x" }));
        assert_eq!(vec!["tag"], paths(&found));
    }
}
