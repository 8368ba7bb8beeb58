use super::{parser::describe, *};
use bastion_query_structure::{
    ConditionValue, JsonCondition, JsonPredicate, JsonTarget, QueryMode, RelationCondition, RelationFilter,
    ScalarCondition, ScalarFilter,
};
use bastion_schema::{FieldDef, FieldKind, ModelDef, ScalarType, UniqueDef};
use bastion_value::{
    protocol::{decode_tagged, type_tag, TaggedValue},
    NullSentinel,
};

const SCALAR_FILTER_KEYS: &[&str] = &[
    "equals", "not", "in", "notIn", "lt", "lte", "gt", "gte", "contains", "startsWith", "endsWith", "mode",
];
const LIST_FILTER_KEYS: &[&str] = &["equals", "has", "hasSome", "hasEvery", "isEmpty"];
const JSON_FILTER_KEYS: &[&str] = &[
    "equals",
    "not",
    "path",
    "string_contains",
    "string_starts_with",
    "string_ends_with",
    "array_contains",
];

fn is_operator_object(json: &JsonValue) -> bool {
    matches!(json, JsonValue::Object(obj) if type_tag(obj).is_none())
}

fn field_filter(field: &FieldDef, condition: ScalarCondition, mode: QueryMode) -> Filter {
    Filter::Scalar(ScalarFilter {
        field: field.name.clone(),
        condition,
        mode,
    })
}

fn to_one(field: &FieldDef, nested: Filter) -> Filter {
    Filter::Relation(RelationFilter::new(
        field.name.as_str(),
        RelationCondition::ToOneRelatedRecord,
        nested,
    ))
}

/// Whether the `where` object pins a single row through a unique constraint:
/// a unique field compared for equality, or a compound key object naming
/// all its components.
pub(super) fn has_unique_criterion(model: &ModelDef, obj: &serde_json::Map<String, JsonValue>) -> bool {
    model.unique_fields.iter().any(|(name, def)| match (obj.get(name), def) {
        (Some(JsonValue::Object(value)), UniqueDef::Compound(components)) => components
            .keys()
            .all(|component| value.get(component).is_some_and(|v| !v.is_null())),
        (Some(value), UniqueDef::Single { .. }) => is_equality(value),
        _ => false,
    })
}

fn is_equality(json: &JsonValue) -> bool {
    match json {
        JsonValue::Null => false,
        JsonValue::Object(obj) if type_tag(obj).is_none() => obj.get("equals").is_some_and(|v| !v.is_null()),
        _ => true,
    }
}

impl ArgumentParser<'_> {
    pub(super) fn parse_filter(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<Filter> {
        let obj = self.object(path, json)?;

        let filters: Vec<Option<Filter>> = obj
            .iter()
            .map(|(key, value)| {
                let path = path.add(key);

                match key.as_str() {
                    "AND" => self.filter_list(model, &path, value).map(Filter::and),
                    "OR" => self.filter_list(model, &path, value).map(Filter::or),
                    "NOT" => self.filter_list(model, &path, value).map(Filter::not),
                    _ => self.parse_field_filter(model, &path, key, value),
                }
            })
            .collect();

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }

    /// A filter that must select at most one row.
    pub(super) fn parse_unique_filter(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<Filter> {
        let filter = self.parse_filter(model, path, json);

        if let JsonValue::Object(obj) = json {
            if !has_unique_criterion(model, obj) {
                let expected: Vec<&str> = model.unique_fields.keys().map(String::as_str).collect();

                self.violation(
                    path,
                    format!(
                        "a unique filter on `{}` is required, expected one of: {}",
                        model.name,
                        expected.join(", ")
                    ),
                );

                return None;
            }
        }

        filter
    }

    fn filter_list(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<Vec<Filter>> {
        let filters: Vec<Option<Filter>> = match json {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.parse_filter(model, &path.index(i), item))
                .collect(),
            single => vec![self.parse_filter(model, path, single)],
        };

        filters.into_iter().collect()
    }

    pub(super) fn parse_field_filter(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        key: &str,
        json: &JsonValue,
    ) -> Option<Filter> {
        if let Some(UniqueDef::Compound(components)) = model.unique_fields.get(key) {
            let components: Vec<String> = components.keys().cloned().collect();
            return self.parse_compound_filter(model, path, &components, json);
        }

        let field = self.field(model, path, key)?;

        match self.schema.field_kind(field) {
            Some(FieldKind::Relation(_)) => self.parse_relation_filter(model, field, path, json),
            Some(FieldKind::Scalar(ScalarType::Json)) | Some(FieldKind::TypeDef(_)) => {
                self.parse_json_filter(field, path, json)
            }
            Some(_) if field.array => self.parse_list_filter(field, path, json),
            Some(_) => self.parse_scalar_filter(model, field, path, json),
            None => {
                self.violation(path, format!("field `{}` has an unknown type `{}`", field.name, field.type_name));
                None
            }
        }
    }

    /// `{ a_b: { a: 1, b: 2 } }`
    fn parse_compound_filter(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        components: &[String],
        json: &JsonValue,
    ) -> Option<Filter> {
        let obj = self.object(path, json)?;
        let allowed: Vec<&str> = components.iter().map(String::as_str).collect();
        self.check_keys(path, obj, &allowed);

        let filters: Vec<Option<Filter>> = components
            .iter()
            .map(|name| {
                let path = path.add(name);
                let field = self.field(model, &path, name)?;
                let value = self.required(&path, obj, name)?;

                if value.is_null() {
                    self.violation(&path, "compound unique components must not be null");
                    return None;
                }

                let value = self.coerce(field, &path, value)?;
                Some(field_filter(field, ScalarCondition::Equals(value.into()), QueryMode::Default))
            })
            .collect();

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }

    fn condition_value(
        &mut self,
        model: &ModelDef,
        field: &FieldDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<ConditionValue> {
        if let Ok(Some(TaggedValue::FieldRef(name))) = decode_tagged(json) {
            return match model.find_field(&name) {
                Some(other) if !other.is_relation() && other.type_name == field.type_name => {
                    Some(ConditionValue::FieldRef(name))
                }
                Some(_) => {
                    self.violation(path, format!("`{name}` is not a `{}` field", field.type_name));
                    None
                }
                None => {
                    self.violation(path, format!("`{}` has no field `{name}`", model.name));
                    None
                }
            };
        }

        self.coerce(field, path, json).map(ConditionValue::Value)
    }

    fn element_list(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<Vec<bastion_value::Value>> {
        let items = match json {
            JsonValue::Array(items) => items,
            other => {
                self.violation(path, format!("expected an array, received {}", describe(other)));
                return None;
            }
        };

        let values: Vec<Option<bastion_value::Value>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.coerce_element(field, &path.index(i), item))
            .collect();

        values.into_iter().collect()
    }

    pub(super) fn parse_scalar_filter(
        &mut self,
        model: &ModelDef,
        field: &FieldDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<Filter> {
        let obj = match json {
            JsonValue::Object(obj) if type_tag(obj).is_none() => obj,
            direct => {
                let value = self.condition_value(model, field, path, direct)?;
                return Some(field_filter(field, ScalarCondition::Equals(value), QueryMode::Default));
            }
        };

        self.check_keys(path, obj, SCALAR_FILTER_KEYS);

        let mode = match obj.get("mode").map(|m| m.as_str()) {
            None | Some(Some("default")) => QueryMode::Default,
            Some(Some("insensitive")) => QueryMode::Insensitive,
            Some(_) => {
                self.violation(&path.add("mode"), "expected `default` or `insensitive`");
                QueryMode::Default
            }
        };

        let textual = field.scalar_type() == Some(ScalarType::String);
        let mut filters: Vec<Option<Filter>> = Vec::with_capacity(obj.len());

        for (key, value) in obj {
            let path = path.add(key);

            let condition = match key.as_str() {
                "equals" => self.condition_value(model, field, &path, value).map(ScalarCondition::Equals),
                "not" if is_operator_object(value) => {
                    let nested = self.parse_scalar_filter(model, field, &path, value);
                    filters.push(nested.map(|f| Filter::not(vec![f])));
                    continue;
                }
                "not" => self.condition_value(model, field, &path, value).map(ScalarCondition::NotEquals),
                "in" => self.element_list(field, &path, value).map(ScalarCondition::In),
                "notIn" => self.element_list(field, &path, value).map(ScalarCondition::NotIn),
                "lt" => self.condition_value(model, field, &path, value).map(ScalarCondition::LessThan),
                "lte" => self.condition_value(model, field, &path, value).map(ScalarCondition::LessThanOrEquals),
                "gt" => self.condition_value(model, field, &path, value).map(ScalarCondition::GreaterThan),
                "gte" => self.condition_value(model, field, &path, value).map(ScalarCondition::GreaterThanOrEquals),
                "contains" | "startsWith" | "endsWith" if !textual => {
                    self.violation(&path, format!("`{key}` only applies to String fields"));
                    None
                }
                "contains" => self.condition_value(model, field, &path, value).map(ScalarCondition::Contains),
                "startsWith" => self.condition_value(model, field, &path, value).map(ScalarCondition::StartsWith),
                "endsWith" => self.condition_value(model, field, &path, value).map(ScalarCondition::EndsWith),
                _ => continue,
            };

            filters.push(condition.map(|c| field_filter(field, c, mode)));
        }

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }

    fn parse_list_filter(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<Filter> {
        let obj = match json {
            JsonValue::Object(obj) if type_tag(obj).is_none() => obj,
            direct => {
                let value = self.coerce(field, path, direct)?;
                return Some(field_filter(field, ScalarCondition::Equals(value.into()), QueryMode::Default));
            }
        };

        self.check_keys(path, obj, LIST_FILTER_KEYS);

        let filters: Vec<Option<Filter>> = obj
            .iter()
            .filter(|(key, _)| LIST_FILTER_KEYS.contains(&key.as_str()))
            .map(|(key, value)| {
                let path = path.add(key);

                let condition = match key.as_str() {
                    "equals" => self.coerce(field, &path, value).map(|v| ScalarCondition::Equals(v.into())),
                    "has" => self.coerce_element(field, &path, value).map(ScalarCondition::Has),
                    "hasSome" => self.element_list(field, &path, value).map(ScalarCondition::HasSome),
                    "hasEvery" => self.element_list(field, &path, value).map(ScalarCondition::HasEvery),
                    _ => self.boolean(&path, value).map(ScalarCondition::IsEmpty),
                };

                condition.map(|c| field_filter(field, c, QueryMode::Default))
            })
            .collect();

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }

    fn parse_json_filter(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<Filter> {
        let obj = match json {
            JsonValue::Object(obj) if type_tag(obj).is_none() => obj,
            _ => {
                self.violation(path, "JSON fields are filtered with an object such as `{ equals: .. }`");
                return None;
            }
        };

        self.check_keys(path, obj, JSON_FILTER_KEYS);

        let json_path = match obj.get("path") {
            None => Some(Vec::new()),
            Some(JsonValue::String(s)) => Some(
                s.trim_start_matches('$')
                    .split('.')
                    .filter(|s| !s.is_empty())
                    .map(ToOwned::to_owned)
                    .collect(),
            ),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|i| i.as_str().map(ToOwned::to_owned))
                .collect::<Option<Vec<_>>>(),
            Some(_) => None,
        };

        let Some(json_path) = json_path else {
            self.violation(&path.add("path"), "expected a path string or an array of keys");
            return None;
        };

        let mut filters: Vec<Option<Filter>> = Vec::new();

        for (key, value) in obj {
            let text = || value.as_str().map(ToOwned::to_owned);

            let predicate = match key.as_str() {
                "equals" | "not" => Some(JsonPredicate::Equals(json_target(value))),
                "string_contains" => text().map(JsonPredicate::StringContains),
                "string_starts_with" => text().map(JsonPredicate::StringStartsWith),
                "string_ends_with" => text().map(JsonPredicate::StringEndsWith),
                "array_contains" => Some(JsonPredicate::ArrayContains(value.clone())),
                _ => continue,
            };

            if predicate.is_none() {
                self.violation(&path.add(key), format!("expected a string, received {}", describe(value)));
            }

            filters.push(predicate.map(|predicate| {
                let condition = ScalarCondition::Json(JsonCondition {
                    path: json_path.clone(),
                    predicate,
                    negated: key == "not",
                });

                field_filter(field, condition, QueryMode::Default)
            }));
        }

        if filters.is_empty() {
            self.violation(path, "a JSON filter needs a condition");
            return None;
        }

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }

    fn parse_relation_filter(
        &mut self,
        model: &ModelDef,
        field: &FieldDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<Filter> {
        let rel = match self.schema.relation(&model.name, &field.name) {
            Ok(rel) => rel,
            Err(err) => {
                self.violation(path, err.to_string());
                return None;
            }
        };

        if rel.is_to_many() {
            let obj = self.object(path, json)?;
            self.check_keys(path, obj, &["some", "every", "none"]);

            let filters: Vec<Option<Filter>> = obj
                .iter()
                .filter_map(|(key, value)| {
                    let condition = match key.as_str() {
                        "some" => RelationCondition::AtLeastOneRelatedRecord,
                        "every" => RelationCondition::EveryRelatedRecord,
                        "none" => RelationCondition::NoRelatedRecord,
                        _ => return None,
                    };

                    let nested = self.parse_filter(rel.target, &path.add(key), value);
                    Some(nested.map(|n| Filter::Relation(RelationFilter::new(field.name.as_str(), condition, n))))
                })
                .collect();

            return filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and);
        }

        match json {
            JsonValue::Null => Some(Filter::not(vec![to_one(field, Filter::Empty)])),
            JsonValue::Object(obj) if obj.contains_key("is") || obj.contains_key("isNot") => {
                self.check_keys(path, obj, &["is", "isNot"]);

                let filters: Vec<Option<Filter>> = obj
                    .iter()
                    .filter(|(key, _)| *key == "is" || *key == "isNot")
                    .map(|(key, value)| {
                        let matching = match value {
                            JsonValue::Null => Some(to_one(field, Filter::Empty)),
                            nested => self
                                .parse_filter(rel.target, &path.add(key), nested)
                                .map(|n| to_one(field, n)),
                        };

                        // `is: null` is the absence of a related row.
                        match (key.as_str(), value.is_null()) {
                            ("is", false) | ("isNot", true) => matching,
                            _ => matching.map(|m| Filter::not(vec![m])),
                        }
                    })
                    .collect();

                filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
            }
            nested => self.parse_filter(rel.target, path, nested).map(|n| to_one(field, n)),
        }
    }
}

/// JSON equality distinguishes the database `NULL` from a stored JSON
/// `null`. A bare `null` means the former.
fn json_target(json: &JsonValue) -> JsonTarget {
    match decode_tagged(json) {
        Ok(Some(TaggedValue::Null(sentinel))) => JsonTarget::Null(sentinel),
        Ok(Some(TaggedValue::Json(value))) => JsonTarget::Value(value),
        _ if json.is_null() => JsonTarget::Null(NullSentinel::DbNull),
        _ => JsonTarget::Value(json.clone()),
    }
}
