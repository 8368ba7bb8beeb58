use super::*;
use crate::error::Violation;
use bastion_query_structure::{coerce_element, coerce_field, CoercionError};
use bastion_schema::{FieldDef, ModelDef};
use bastion_value::Value;
use serde_json::Map;
use std::fmt;

type JsonObject = Map<String, JsonValue>;

const FIND_UNIQUE_KEYS: &[&str] = &["where", "select", "include", "omit"];
const FIND_MANY_KEYS: &[&str] = &[
    "where", "orderBy", "cursor", "skip", "take", "distinct", "select", "include", "omit",
];
const CREATE_KEYS: &[&str] = &["data", "select", "include", "omit"];
const CREATE_MANY_KEYS: &[&str] = &["data", "skipDuplicates"];
const CREATE_MANY_AND_RETURN_KEYS: &[&str] = &["data", "skipDuplicates", "select", "include", "omit"];
const UPDATE_KEYS: &[&str] = &["where", "data", "select", "include", "omit"];
const UPDATE_MANY_KEYS: &[&str] = &["where", "data", "limit"];
const UPSERT_KEYS: &[&str] = &["where", "create", "update", "select", "include", "omit"];
const DELETE_KEYS: &[&str] = &["where", "select", "include", "omit"];
const DELETE_MANY_KEYS: &[&str] = &["where", "limit"];
const COUNT_KEYS: &[&str] = &["where", "orderBy", "cursor", "skip", "take", "select"];
const AGGREGATE_KEYS: &[&str] = &[
    "where", "orderBy", "cursor", "skip", "take", "_count", "_sum", "_avg", "_min", "_max",
];
const GROUP_BY_KEYS: &[&str] = &[
    "where", "orderBy", "by", "having", "skip", "take", "_count", "_sum", "_avg", "_min", "_max",
];

/// Location of a value inside the arguments, e.g. `data.posts.create[1].title`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ArgumentPath(String);

impl ArgumentPath {
    pub(crate) fn add(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_owned())
        } else {
            Self(format!("{}.{segment}", self.0))
        }
    }

    pub(crate) fn index(&self, index: usize) -> Self {
        Self(format!("{}[{index}]", self.0))
    }
}

impl fmt::Display for ArgumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Walks the arguments of one operation, collecting violations instead of
/// stopping at the first. Parse methods return `None` for a part that had
/// violations; the caller keeps going with the rest.
pub(crate) struct ArgumentParser<'a> {
    pub(super) validator: &'a Validator,
    pub(super) schema: &'a Schema,
    pub(super) operation: Operation,
    violations: Vec<Violation>,
}

impl<'a> ArgumentParser<'a> {
    pub(super) fn new(validator: &'a Validator, operation: Operation) -> Self {
        Self {
            validator,
            schema: validator.schema(),
            operation,
            violations: Vec::new(),
        }
    }

    pub(super) fn violation(&mut self, path: &ArgumentPath, message: impl Into<String>) {
        self.violations.push(Violation::new(path.to_string(), message));
    }

    pub(super) fn finish<T>(self, parsed: Option<T>) -> Result<T, CrudError> {
        match parsed {
            Some(parsed) if self.violations.is_empty() => Ok(parsed),
            None if self.violations.is_empty() => Err(CrudError::internal("argument parsing failed without a reason")),
            _ => Err(CrudError::InvalidInput {
                violations: self.violations,
            }),
        }
    }

    pub(super) fn object<'j>(&mut self, path: &ArgumentPath, json: &'j JsonValue) -> Option<&'j JsonObject> {
        match json {
            JsonValue::Object(obj) => Some(obj),
            other => {
                self.violation(path, format!("expected an object, received {}", describe(other)));
                None
            }
        }
    }

    /// Reports every key of `obj` missing from `allowed`.
    pub(super) fn check_keys(&mut self, path: &ArgumentPath, obj: &JsonObject, allowed: &[&str]) {
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.violation(&path.add(key), format!("unknown argument `{key}`"));
            }
        }
    }

    pub(super) fn required<'j>(&mut self, path: &ArgumentPath, obj: &'j JsonObject, key: &str) -> Option<&'j JsonValue> {
        let value = obj.get(key);

        if value.is_none() {
            self.violation(&path.add(key), "argument is required");
        }

        value
    }

    pub(super) fn boolean(&mut self, path: &ArgumentPath, json: &JsonValue) -> Option<bool> {
        match json {
            JsonValue::Bool(b) => Some(*b),
            other => {
                self.violation(path, format!("expected a boolean, received {}", describe(other)));
                None
            }
        }
    }

    pub(super) fn integer(&mut self, path: &ArgumentPath, json: &JsonValue) -> Option<i64> {
        match json.as_i64() {
            Some(i) => Some(i),
            None => {
                self.violation(path, format!("expected an integer, received {}", describe(json)));
                None
            }
        }
    }

    pub(super) fn non_negative(&mut self, path: &ArgumentPath, json: &JsonValue) -> Option<i64> {
        let value = self.integer(path, json)?;

        if value < 0 {
            self.violation(path, "must not be negative");
            return None;
        }

        Some(value)
    }

    pub(super) fn coerce(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<Value> {
        let result = coerce_field(self.schema, field, json);
        self.coerced(path, result)
    }

    pub(super) fn coerce_element(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<Value> {
        let result = coerce_element(self.schema, field, json);
        self.coerced(path, result)
    }

    fn coerced(&mut self, path: &ArgumentPath, result: Result<Value, CoercionError>) -> Option<Value> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.violation(path, err.to_string());
                None
            }
        }
    }

    pub(super) fn field<'m>(&mut self, model: &'m ModelDef, path: &ArgumentPath, name: &str) -> Option<&'m FieldDef> {
        let field = model.find_field(name);

        if field.is_none() {
            self.violation(path, format!("`{}` has no field `{name}`", model.name));
        }

        field
    }

    pub(super) fn parse_operation(&mut self, model: &ModelDef, args: &JsonValue) -> Option<ParsedArgs> {
        let root = ArgumentPath::default();
        let empty = JsonObject::new();

        let obj = match args {
            JsonValue::Null => &empty,
            other => self.object(&root, other)?,
        };

        let allowed = match self.operation {
            Operation::FindUnique | Operation::FindUniqueOrThrow => FIND_UNIQUE_KEYS,
            Operation::FindFirst | Operation::FindFirstOrThrow | Operation::FindMany => FIND_MANY_KEYS,
            Operation::Create => CREATE_KEYS,
            Operation::CreateMany => CREATE_MANY_KEYS,
            Operation::CreateManyAndReturn => CREATE_MANY_AND_RETURN_KEYS,
            Operation::Update => UPDATE_KEYS,
            Operation::UpdateMany => UPDATE_MANY_KEYS,
            Operation::Upsert => UPSERT_KEYS,
            Operation::Delete => DELETE_KEYS,
            Operation::DeleteMany => DELETE_MANY_KEYS,
            Operation::Count => COUNT_KEYS,
            Operation::Aggregate => AGGREGATE_KEYS,
            Operation::GroupBy => GROUP_BY_KEYS,
        };

        let extra = self.validator.extra_keys(self.operation);
        let allowed: Vec<&str> = allowed.iter().copied().chain(extra.iter().map(String::as_str)).collect();
        self.check_keys(&root, obj, &allowed);

        match self.operation {
            Operation::FindUnique | Operation::FindUniqueOrThrow => {
                let filter = self.where_unique(model, &root, obj);
                let selection = self.parse_selection(model, &root, obj);

                Some(ParsedArgs::Find(FindArgs {
                    args: QueryArguments::with_filter(filter?),
                    selection: selection?,
                }))
            }
            Operation::FindFirst | Operation::FindFirstOrThrow | Operation::FindMany => {
                let args = self.parse_query_arguments(model, &root, obj);
                let selection = self.parse_selection(model, &root, obj);

                Some(ParsedArgs::Find(FindArgs {
                    args: args?,
                    selection: selection?,
                }))
            }
            Operation::Create => {
                let data = self
                    .required(&root, obj, "data")
                    .and_then(|data| self.parse_create_data(model, &root.add("data"), data, &[]));
                let selection = self.parse_selection(model, &root, obj);

                Some(ParsedArgs::Create(CreateArgs {
                    data: data?,
                    selection: selection?,
                }))
            }
            Operation::CreateMany | Operation::CreateManyAndReturn => {
                let data = self
                    .required(&root, obj, "data")
                    .and_then(|data| self.parse_create_many_data(model, &root.add("data"), data));
                let skip_duplicates = self.skip_duplicates(&root, obj);

                let selection = if self.operation == Operation::CreateManyAndReturn {
                    Some(self.parse_selection(model, &root, obj)?)
                } else {
                    None
                };

                Some(ParsedArgs::CreateMany(CreateManyArgs {
                    data: data?,
                    skip_duplicates: skip_duplicates?,
                    selection,
                }))
            }
            Operation::Update => {
                let filter = self.where_unique(model, &root, obj);
                let data = self
                    .required(&root, obj, "data")
                    .and_then(|data| self.parse_update_data(model, &root.add("data"), data));
                let selection = self.parse_selection(model, &root, obj);

                Some(ParsedArgs::Update(UpdateArgs {
                    filter: filter?,
                    data: data?,
                    selection: selection?,
                }))
            }
            Operation::UpdateMany => {
                let filter = self.where_filter(model, &root, obj);
                let data = self
                    .required(&root, obj, "data")
                    .and_then(|data| self.parse_update_many_data(model, &root.add("data"), data));
                let limit = self.limit(&root, obj);

                Some(ParsedArgs::UpdateMany(UpdateManyArgs {
                    filter: filter?,
                    data: data?,
                    limit: limit?,
                }))
            }
            Operation::Upsert => {
                let filter = self.where_unique(model, &root, obj);
                let create = self
                    .required(&root, obj, "create")
                    .and_then(|data| self.parse_create_data(model, &root.add("create"), data, &[]));
                let update = self
                    .required(&root, obj, "update")
                    .and_then(|data| self.parse_update_data(model, &root.add("update"), data));
                let selection = self.parse_selection(model, &root, obj);

                Some(ParsedArgs::Upsert(UpsertArgs {
                    filter: filter?,
                    create: create?,
                    update: update?,
                    selection: selection?,
                }))
            }
            Operation::Delete => {
                let filter = self.where_unique(model, &root, obj);
                let selection = self.parse_selection(model, &root, obj);

                Some(ParsedArgs::Delete(DeleteArgs {
                    filter: filter?,
                    selection: selection?,
                }))
            }
            Operation::DeleteMany => {
                let filter = self.where_filter(model, &root, obj);
                let limit = self.limit(&root, obj);

                Some(ParsedArgs::DeleteMany(DeleteManyArgs {
                    filter: filter?,
                    limit: limit?,
                }))
            }
            Operation::Count => {
                let args = self.parse_query_arguments(model, &root, obj);
                let select = match obj.get("select") {
                    Some(select) => self.parse_count_selection(model, &root.add("select"), select).map(Some),
                    None => Some(None),
                };

                Some(ParsedArgs::Count(CountArgs {
                    args: args?,
                    select: select?,
                }))
            }
            Operation::Aggregate => {
                let args = self.parse_query_arguments(model, &root, obj);
                let selections = self.parse_aggregations(model, &root, obj);

                Some(ParsedArgs::Aggregate(AggregateArgs {
                    args: args?,
                    selections: selections?,
                }))
            }
            Operation::GroupBy => self.parse_group_by(model, &root, obj).map(ParsedArgs::GroupBy),
        }
    }

    fn where_filter(&mut self, model: &ModelDef, root: &ArgumentPath, obj: &JsonObject) -> Option<Filter> {
        match obj.get("where") {
            Some(json) => self.parse_filter(model, &root.add("where"), json),
            None => Some(Filter::Empty),
        }
    }

    fn where_unique(&mut self, model: &ModelDef, root: &ArgumentPath, obj: &JsonObject) -> Option<Filter> {
        let json = self.required(root, obj, "where")?;
        self.parse_unique_filter(model, &root.add("where"), json)
    }

    fn skip_duplicates(&mut self, root: &ArgumentPath, obj: &JsonObject) -> Option<bool> {
        match obj.get("skipDuplicates") {
            Some(json) => self.boolean(&root.add("skipDuplicates"), json),
            None => Some(false),
        }
    }

    fn limit(&mut self, root: &ArgumentPath, obj: &JsonObject) -> Option<Option<i64>> {
        match obj.get("limit") {
            Some(json) => self.non_negative(&root.add("limit"), json).map(Some),
            None => Some(None),
        }
    }
}

/// Items of a value accepting either one element or an array of them.
pub(super) fn one_or_many(json: &JsonValue) -> Vec<&JsonValue> {
    match json {
        JsonValue::Array(items) => items.iter().collect(),
        single => vec![single],
    }
}

pub(super) fn describe(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
