use super::{filter::has_unique_criterion, parser::describe, *};
use bastion_query_structure::{
    AggregationFilter, AggregationFunction, NullsOrder, OrderBy, OrderByAggregation, OrderByScalar,
    OrderByToManyCount, ScalarFilter, SelectionResult, SortOrder,
};
use bastion_schema::{FieldDef, ModelDef, UniqueDef};
use serde_json::Map;

const AGGREGATE_KEYS: [&str; 5] = ["_count", "_sum", "_avg", "_min", "_max"];

impl ArgumentParser<'_> {
    /// `where`, `orderBy`, `cursor`, `skip`, `take` and `distinct` of `args`.
    pub(super) fn parse_query_arguments(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        args: &Map<String, JsonValue>,
    ) -> Option<QueryArguments> {
        let filter = match args.get("where") {
            Some(json) => self.parse_filter(model, &path.add("where"), json).map(Some),
            None => Some(None),
        };

        let order_by = match args.get("orderBy") {
            Some(json) => self.parse_order_by(model, &path.add("orderBy"), json, None),
            None => Some(Vec::new()),
        };

        let cursor = match args.get("cursor") {
            Some(json) => self.parse_cursor(model, &path.add("cursor"), json).map(Some),
            None => Some(None),
        };

        let skip = match args.get("skip") {
            Some(json) => self.non_negative(&path.add("skip"), json).map(Some),
            None => Some(None),
        };

        let take = match args.get("take") {
            Some(json) => self.integer(&path.add("take"), json).map(Some),
            None => Some(None),
        };

        let distinct = match args.get("distinct") {
            Some(json) => self.scalar_field_names(model, &path.add("distinct"), json),
            None => Some(Vec::new()),
        };

        Some(QueryArguments {
            filter: filter?,
            order_by: order_by?,
            cursor: cursor?,
            skip: skip?,
            take: take?,
            distinct: distinct?,
        })
    }

    /// A field name or an array of them, all persisted scalars.
    fn scalar_field_names(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<Vec<String>> {
        let names: Vec<Option<String>> = parser::one_or_many(json)
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let path = if json.is_array() { path.index(i) } else { path.clone() };

                let Some(name) = item.as_str() else {
                    self.violation(&path, format!("expected a field name, received {}", describe(item)));
                    return None;
                };

                match self.field(model, &path, name) {
                    Some(field) if field.is_relation() => {
                        self.violation(&path, format!("`{name}` is a relation field"));
                        None
                    }
                    Some(field) => Some(field.name.clone()),
                    None => None,
                }
            })
            .collect();

        names.into_iter().collect()
    }

    /// With `group_by`, orderings may use aggregates and scalar orderings
    /// must be on grouped fields.
    fn parse_order_by(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
        group_by: Option<&[String]>,
    ) -> Option<Vec<OrderBy>> {
        let orderings: Vec<Option<Vec<OrderBy>>> = parser::one_or_many(json)
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let path = if json.is_array() { path.index(i) } else { path.clone() };
                self.parse_order_object(model, &path, item, &[], group_by)
            })
            .collect();

        orderings
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(|o| o.into_iter().flatten().collect())
    }

    fn parse_order_object(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
        relation_path: &[String],
        group_by: Option<&[String]>,
    ) -> Option<Vec<OrderBy>> {
        let obj = self.object(path, json)?;

        let orderings: Vec<Option<Vec<OrderBy>>> = obj
            .iter()
            .map(|(key, value)| {
                let path = path.add(key);

                if let (Some(function), Some(_)) = (AggregationFunction::from_key(key), group_by) {
                    return self.parse_aggregate_order(model, &path, function, value);
                }

                let field = self.field(model, &path, key)?;

                if !field.is_relation() {
                    if let Some(by) = group_by {
                        if !by.contains(&field.name) {
                            self.violation(&path, format!("`{key}` must be in `by` to order groups by it"));
                            return None;
                        }
                    }

                    let (sort_order, nulls_order) = self.parse_sort(&path, value)?;

                    return Some(vec![OrderBy::Scalar(OrderByScalar {
                        field: field.name.clone(),
                        path: relation_path.to_vec(),
                        sort_order,
                        nulls_order,
                    })]);
                }

                if group_by.is_some() {
                    self.violation(&path, "groups cannot be ordered by relations");
                    return None;
                }

                let rel = match self.schema.relation(&model.name, key) {
                    Ok(rel) => rel,
                    Err(err) => {
                        self.violation(&path, err.to_string());
                        return None;
                    }
                };

                if rel.is_to_many() {
                    let obj = self.object(&path, value)?;
                    self.check_keys(&path, obj, &["_count"]);
                    let sort = self.required(&path, obj, "_count")?;
                    let (sort_order, _) = self.parse_sort(&path.add("_count"), sort)?;

                    return Some(vec![OrderBy::ToManyCount(OrderByToManyCount {
                        field: key.clone(),
                        sort_order,
                    })]);
                }

                let mut nested_path = relation_path.to_vec();
                nested_path.push(key.clone());

                self.parse_order_object(rel.target, &path, value, &nested_path, None)
            })
            .collect();

        orderings
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(|o| o.into_iter().flatten().collect())
    }

    /// `{ _sum: { views: 'desc' } }`
    fn parse_aggregate_order(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        function: AggregationFunction,
        json: &JsonValue,
    ) -> Option<Vec<OrderBy>> {
        let obj = self.object(path, json)?;

        let orderings: Vec<Option<OrderBy>> = obj
            .iter()
            .map(|(key, value)| {
                let path = path.add(key);
                let field = self.aggregated_field(model, &path, function, key)?;
                let (sort_order, _) = self.parse_sort(&path, value)?;

                Some(OrderBy::Aggregation(OrderByAggregation {
                    function,
                    field: field.name.clone(),
                    sort_order,
                }))
            })
            .collect();

        orderings.into_iter().collect()
    }

    /// `'asc'`, `'desc'` or `{ sort: 'asc', nulls: 'last' }`.
    fn parse_sort(&mut self, path: &ArgumentPath, json: &JsonValue) -> Option<(SortOrder, Option<NullsOrder>)> {
        let (sort, nulls) = match json {
            JsonValue::String(s) => (Some(s.as_str()), None),
            JsonValue::Object(obj) => {
                self.check_keys(path, obj, &["sort", "nulls"]);
                (obj.get("sort").and_then(JsonValue::as_str), obj.get("nulls"))
            }
            other => {
                self.violation(path, format!("expected `asc` or `desc`, received {}", describe(other)));
                return None;
            }
        };

        let Some(sort_order) = sort.and_then(SortOrder::parse) else {
            self.violation(path, "expected `asc` or `desc`");
            return None;
        };

        let nulls_order = match nulls.map(|n| n.as_str()) {
            None => None,
            Some(Some("first")) => Some(NullsOrder::First),
            Some(Some("last")) => Some(NullsOrder::Last),
            Some(_) => {
                self.violation(&path.add("nulls"), "expected `first` or `last`");
                return None;
            }
        };

        Some((sort_order, nulls_order))
    }

    /// A cursor names one row through a unique criterion.
    fn parse_cursor(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<SelectionResult> {
        let obj = self.object(path, json)?;

        if !has_unique_criterion(model, obj) {
            let expected: Vec<&str> = model.unique_fields.keys().map(String::as_str).collect();
            self.violation(path, format!("a cursor must be unique, expected one of: {}", expected.join(", ")));
            return None;
        }

        let mut pairs = Vec::new();
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            let entries: Vec<(String, &JsonValue)> = match (model.unique_fields.get(key), value) {
                (Some(UniqueDef::Compound(components)), JsonValue::Object(inner)) => components
                    .keys()
                    .filter_map(|c| inner.get(c).map(|v| (c.clone(), v)))
                    .collect(),
                _ => vec![(key.clone(), value)],
            };

            for (name, value) in entries {
                let value = self
                    .field(model, &path, &name)
                    .and_then(|field| self.coerce(field, &path, value));

                match value {
                    Some(value) => pairs.push((name, value)),
                    None => valid = false,
                }
            }
        }

        valid.then(|| SelectionResult::new(pairs))
    }

    fn aggregated_field<'m>(
        &mut self,
        model: &'m ModelDef,
        path: &ArgumentPath,
        function: AggregationFunction,
        name: &str,
    ) -> Option<&'m FieldDef> {
        let field = self.field(model, path, name)?;

        if field.is_relation() {
            self.violation(path, "relation fields cannot be aggregated");
            return None;
        }

        let numeric = !field.array && field.scalar_type().is_some_and(|t| t.is_numeric());

        if function.is_numeric_only() && !numeric {
            self.violation(path, format!("`{}` needs a numeric field", function.key()));
            return None;
        }

        Some(field)
    }

    /// `_count`, `_sum`, `_avg`, `_min` and `_max` of `aggregate` and `groupBy`.
    pub(super) fn parse_aggregations(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        args: &Map<String, JsonValue>,
    ) -> Option<Vec<AggregationSelection>> {
        let selections: Vec<Option<AggregationSelection>> = AGGREGATE_KEYS
            .iter()
            .filter_map(|key| args.get(*key).map(|json| (*key, json)))
            .map(|(key, json)| {
                let path = path.add(key);
                let function = AggregationFunction::from_key(key)?;

                if function == AggregationFunction::Count && json == &JsonValue::Bool(true) {
                    return Some(AggregationSelection::new(function, Vec::new(), true));
                }

                let obj = self.object(&path, json)?;
                let mut all = false;
                let mut fields = Vec::new();
                let mut valid = true;

                for (name, value) in obj {
                    let path = path.add(name);

                    let Some(selected) = self.boolean(&path, value) else {
                        valid = false;
                        continue;
                    };

                    if function == AggregationFunction::Count && name == "_all" {
                        all = selected;
                        continue;
                    }

                    match self.aggregated_field(model, &path, function, name) {
                        Some(field) if selected => fields.push(field.name.clone()),
                        Some(_) => (),
                        None => valid = false,
                    }
                }

                valid.then(|| AggregationSelection::new(function, fields, all))
            })
            .collect();

        selections.into_iter().collect()
    }

    pub(super) fn parse_group_by(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        args: &Map<String, JsonValue>,
    ) -> Option<GroupByArgs> {
        let by = self
            .required(path, args, "by")
            .and_then(|json| self.scalar_field_names(model, &path.add("by"), json));

        if matches!(&by, Some(by) if by.is_empty()) {
            self.violation(&path.add("by"), "at least one field is required");
        }

        let by = by.unwrap_or_default();

        let filter = match args.get("where") {
            Some(json) => self.parse_filter(model, &path.add("where"), json).map(Some),
            None => Some(None),
        };

        let order_by = match args.get("orderBy") {
            Some(json) => self.parse_order_by(model, &path.add("orderBy"), json, Some(&by)),
            None => Some(Vec::new()),
        };

        let skip = match args.get("skip") {
            Some(json) => self.non_negative(&path.add("skip"), json).map(Some),
            None => Some(None),
        };

        let take = match args.get("take") {
            Some(json) => self.integer(&path.add("take"), json).map(Some),
            None => Some(None),
        };

        let having = match args.get("having") {
            Some(json) => self.parse_having(model, &path.add("having"), json, &by).map(Some),
            None => Some(None),
        };

        let selections = self.parse_aggregations(model, path, args);

        Some(GroupByArgs {
            args: QueryArguments {
                filter: filter?,
                order_by: order_by?,
                skip: skip?,
                take: take?,
                ..Default::default()
            },
            by,
            having: having?,
            selections: selections?,
        })
    }

    /// `having` filters groups: grouped fields by value, any scalar field by
    /// an aggregate, e.g. `{ views: { _sum: { gt: 100 } } }`.
    fn parse_having(&mut self, model: &ModelDef, path: &ArgumentPath, json: &JsonValue, by: &[String]) -> Option<Filter> {
        let obj = self.object(path, json)?;

        let filters: Vec<Option<Filter>> = obj
            .iter()
            .map(|(key, value)| {
                let path = path.add(key);

                match key.as_str() {
                    "AND" | "OR" | "NOT" => {
                        let nested: Vec<Option<Filter>> = parser::one_or_many(value)
                            .into_iter()
                            .map(|item| self.parse_having(model, &path, item, by))
                            .collect();
                        let nested: Vec<Filter> = nested.into_iter().collect::<Option<_>>()?;

                        Some(match key.as_str() {
                            "AND" => Filter::and(nested),
                            "OR" => Filter::or(nested),
                            _ => Filter::not(nested),
                        })
                    }
                    _ => self.parse_having_field(model, &path, key, value, by),
                }
            })
            .collect();

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }

    fn parse_having_field(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        name: &str,
        json: &JsonValue,
        by: &[String],
    ) -> Option<Filter> {
        self.field(model, path, name)?;

        let obj = match json {
            JsonValue::Object(obj) if obj.keys().any(|k| AGGREGATE_KEYS.contains(&k.as_str())) => obj,
            plain => {
                if !by.iter().any(|b| b == name) {
                    self.violation(path, format!("`{name}` must be in `by` or filtered through an aggregate"));
                    return None;
                }

                return self.parse_field_filter(model, path, name, plain);
            }
        };

        self.check_keys(path, obj, &AGGREGATE_KEYS);

        let filters: Vec<Option<Filter>> = obj
            .iter()
            .filter_map(|(key, value)| AggregationFunction::from_key(key).map(|f| (f, key, value)))
            .map(|(function, key, value)| {
                let path = path.add(key);
                let field = self.aggregated_field(model, &path, function, name)?;

                // Counts are integers and averages floats, whatever the field type.
                let typed = match function {
                    AggregationFunction::Count => FieldDef::new(field.name.clone(), "Int"),
                    AggregationFunction::Avg => FieldDef::new(field.name.clone(), "Float"),
                    _ => field.clone(),
                };

                let scalar = self.parse_scalar_filter(model, &typed, &path, value)?;
                Some(into_aggregation(scalar, function))
            })
            .collect();

        filters.into_iter().collect::<Option<Vec<_>>>().map(Filter::and)
    }
}

fn into_aggregation(filter: Filter, function: AggregationFunction) -> Filter {
    match filter {
        Filter::Scalar(ScalarFilter { field, condition, .. }) => Filter::Aggregation(AggregationFilter {
            function,
            field: Some(field),
            condition,
        }),
        Filter::And(filters) => Filter::And(filters.into_iter().map(|f| into_aggregation(f, function)).collect()),
        Filter::Or(filters) => Filter::Or(filters.into_iter().map(|f| into_aggregation(f, function)).collect()),
        Filter::Not(filters) => Filter::Not(filters.into_iter().map(|f| into_aggregation(f, function)).collect()),
        other => other,
    }
}
