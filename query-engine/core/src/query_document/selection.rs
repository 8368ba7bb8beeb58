use super::{parser::describe, *};
use bastion_query_structure::{RelationCount, RelationSelection};
use bastion_schema::ModelDef;
use bastion_sql_query_builder::COUNT_KEY;
use serde_json::Map;

const TO_MANY_SELECTION_KEYS: &[&str] = &[
    "where", "orderBy", "cursor", "skip", "take", "distinct", "select", "include", "omit",
];
const TO_ONE_SELECTION_KEYS: &[&str] = &["select", "include", "omit"];

/// Scalar and computed fields of `model` in declaration order, without the
/// omitted ones.
pub(crate) fn default_selection(model: &ModelDef, omitted: &[String]) -> FieldSelection {
    FieldSelection::scalars(
        model
            .fields
            .values()
            .filter(|f| !f.is_relation() && !omitted.contains(&f.name))
            .map(|f| f.name.clone()),
    )
}

impl ArgumentParser<'_> {
    /// The `select`, `include` and `omit` arguments found in `args`.
    pub(super) fn parse_selection(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        args: &Map<String, JsonValue>,
    ) -> Option<FieldSelection> {
        let select = args.get("select");
        let include = args.get("include");
        let omit = args.get("omit");

        if select.is_some() && include.is_some() {
            self.violation(path, "`select` and `include` cannot be used together");
            return None;
        }

        if select.is_some() && omit.is_some() {
            self.violation(path, "`select` and `omit` cannot be used together");
            return None;
        }

        if let Some(select) = select {
            return self.parse_select(model, &path.add("select"), select);
        }

        let omitted = match omit {
            Some(omit) => self.parse_omit(model, &path.add("omit"), omit)?,
            None => Vec::new(),
        };

        let mut selection = default_selection(model, &omitted);

        if let Some(include) = include {
            self.parse_include(model, &path.add("include"), include, &mut selection)?;
        }

        Some(selection)
    }

    fn parse_select(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<FieldSelection> {
        let obj = self.object(path, json)?;
        let mut selection = FieldSelection::default();
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            if key == COUNT_KEY {
                match self.parse_relation_counts(model, &path, value) {
                    Some(counts) => selection.counts = counts,
                    None => valid = false,
                }
                continue;
            }

            let Some(field) = self.field(model, &path, key) else {
                valid = false;
                continue;
            };

            if field.is_relation() {
                match self.parse_relation_selection(model, &field.name, &path, value) {
                    Some(Some(relation)) => selection.relations.push(relation),
                    Some(None) => (),
                    None => valid = false,
                }
            } else {
                match self.boolean(&path, value) {
                    Some(true) => selection.scalars.push(field.name.clone()),
                    Some(false) => (),
                    None => valid = false,
                }
            }
        }

        if valid && selection.scalars.is_empty() && selection.relations.is_empty() && selection.counts.is_empty() {
            self.violation(path, "at least one field must be selected");
            return None;
        }

        valid.then_some(selection)
    }

    fn parse_include(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
        selection: &mut FieldSelection,
    ) -> Option<()> {
        let obj = self.object(path, json)?;
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            if key == COUNT_KEY {
                match self.parse_relation_counts(model, &path, value) {
                    Some(counts) => selection.counts = counts,
                    None => valid = false,
                }
                continue;
            }

            match self.field(model, &path, key) {
                Some(field) if field.is_relation() => match self.parse_relation_selection(model, key, &path, value) {
                    Some(Some(relation)) => selection.relations.push(relation),
                    Some(None) => (),
                    None => valid = false,
                },
                Some(_) => {
                    self.violation(&path, "only relation fields can be included");
                    valid = false;
                }
                None => valid = false,
            }
        }

        valid.then_some(())
    }

    fn parse_omit(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<Vec<String>> {
        let obj = self.object(path, json)?;
        let mut omitted = Vec::new();
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            match self.field(model, &path, key) {
                Some(field) if field.is_relation() => {
                    self.violation(&path, "relation fields cannot be omitted");
                    valid = false;
                }
                Some(_) => match self.boolean(&path, value) {
                    Some(true) => omitted.push(key.clone()),
                    Some(false) => (),
                    None => valid = false,
                },
                None => valid = false,
            }
        }

        valid.then_some(omitted)
    }

    /// `true`, `false` or the nested arguments of a selected relation.
    /// `Some(None)` is a relation deselected with `false`.
    fn parse_relation_selection(
        &mut self,
        model: &ModelDef,
        field: &str,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<Option<RelationSelection>> {
        let rel = match self.schema.relation(&model.name, field) {
            Ok(rel) => rel,
            Err(err) => {
                self.violation(path, err.to_string());
                return None;
            }
        };

        match json {
            JsonValue::Bool(false) => Some(None),
            JsonValue::Bool(true) => Some(Some(RelationSelection {
                field: field.to_owned(),
                args: QueryArguments::default(),
                selection: default_selection(rel.target, &[]),
            })),
            JsonValue::Object(obj) => {
                let allowed = if rel.is_to_many() {
                    TO_MANY_SELECTION_KEYS
                } else {
                    TO_ONE_SELECTION_KEYS
                };

                self.check_keys(path, obj, allowed);

                let args = if rel.is_to_many() {
                    self.parse_query_arguments(rel.target, path, obj)
                } else {
                    Some(QueryArguments::default())
                };

                let selection = self.parse_selection(rel.target, path, obj);

                Some(Some(RelationSelection {
                    field: field.to_owned(),
                    args: args?,
                    selection: selection?,
                }))
            }
            other => {
                self.violation(path, format!("expected a boolean or an object, received {}", describe(other)));
                None
            }
        }
    }

    /// `_count: true` counts every to-many relation; `_count: { select: { posts: true } }`
    /// picks relations, optionally with a `where`.
    fn parse_relation_counts(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<Vec<RelationCount>> {
        let to_many: Vec<String> = model
            .relation_fields()
            .filter(|f| f.array)
            .map(|f| f.name.clone())
            .collect();

        let obj = match json {
            JsonValue::Bool(true) => {
                return Some(
                    to_many
                        .into_iter()
                        .map(|field| RelationCount {
                            field,
                            filter: Filter::Empty,
                        })
                        .collect(),
                )
            }
            JsonValue::Bool(false) => return Some(Vec::new()),
            other => self.object(path, other)?,
        };

        self.check_keys(path, obj, &["select"]);
        let path = path.add("select");
        let select = self.required(&path, obj, "select")?;
        let select = self.object(&path, select)?;

        let counts: Vec<Option<Option<RelationCount>>> = select
            .iter()
            .map(|(key, value)| {
                let path = path.add(key);

                if !to_many.contains(key) {
                    self.violation(&path, format!("`{key}` is not a to-many relation of `{}`", model.name));
                    return None;
                }

                let target = self.schema.relation(&model.name, key).ok()?.target;

                match value {
                    JsonValue::Bool(selected) => Some(selected.then(|| RelationCount {
                        field: key.clone(),
                        filter: Filter::Empty,
                    })),
                    JsonValue::Object(obj) => {
                        self.check_keys(&path, obj, &["where"]);

                        let filter = match obj.get("where") {
                            Some(filter) => self.parse_filter(target, &path.add("where"), filter)?,
                            None => Filter::Empty,
                        };

                        Some(Some(RelationCount {
                            field: key.clone(),
                            filter,
                        }))
                    }
                    other => {
                        self.violation(&path, format!("expected a boolean or an object, received {}", describe(other)));
                        None
                    }
                }
            })
            .collect();

        counts
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(|counts| counts.into_iter().flatten().collect())
    }

    /// `select` of the `count` operation.
    pub(super) fn parse_count_selection(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<CountSelection> {
        let obj = match json {
            JsonValue::Bool(true) => {
                return Some(CountSelection {
                    all: true,
                    fields: Vec::new(),
                })
            }
            other => self.object(path, other)?,
        };

        let mut selection = CountSelection::default();
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            let Some(selected) = self.boolean(&path, value) else {
                valid = false;
                continue;
            };

            if key == "_all" {
                selection.all = selected;
                continue;
            }

            match self.field(model, &path, key) {
                Some(field) if !field.is_relation() => {
                    if selected {
                        selection.fields.push(key.clone());
                    }
                }
                Some(_) => {
                    self.violation(&path, "relation fields cannot be counted");
                    valid = false;
                }
                None => valid = false,
            }
        }

        valid.then_some(selection)
    }
}
