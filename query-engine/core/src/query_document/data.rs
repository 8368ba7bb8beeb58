//! `data` of creates and updates, with nested relation writes.

use super::{parser::describe, *};
use bastion_query_structure::{
    ConnectOrCreate, NestedAction, NestedUpdate, NestedUpdateMany, NestedUpsert, NestedWrite, WriteOperation,
};
use bastion_schema::{FieldDef, FieldKind, ModelDef, RelationLink, ResolvedRelation, ScalarType};
use bastion_value::{protocol::type_tag, Value};

const CREATE_TO_ONE_KEYS: &[&str] = &["create", "connect", "connectOrCreate"];
const CREATE_TO_MANY_KEYS: &[&str] = &["create", "createMany", "connect", "connectOrCreate"];
const UPDATE_TO_ONE_KEYS: &[&str] = &[
    "create",
    "connect",
    "connectOrCreate",
    "disconnect",
    "update",
    "upsert",
    "delete",
];
const UPDATE_TO_MANY_KEYS: &[&str] = &[
    "create",
    "createMany",
    "connect",
    "connectOrCreate",
    "disconnect",
    "set",
    "update",
    "updateMany",
    "upsert",
    "delete",
    "deleteMany",
];
const FIELD_UPDATE_KEYS: &[&str] = &["set", "increment", "decrement", "multiply", "divide"];

/// Fields of a record created through `rel` that the parent already sets:
/// the foreign key pointing back at the parent and the back relation.
fn implied_fields(rel: &ResolvedRelation<'_>) -> Vec<String> {
    let mut implied: Vec<String> = match rel.link {
        RelationLink::Inverse { .. } => rel.join_pairs().into_iter().map(|(_, f)| f.to_owned()).collect(),
        _ => Vec::new(),
    };

    implied.extend(rel.opposite.map(|f| f.name.clone()));
    implied
}

impl ArgumentParser<'_> {
    /// `implied` fields are set through the parent of a nested create and
    /// must not be given.
    pub(super) fn parse_create_data(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
        implied: &[String],
    ) -> Option<CreateInput> {
        let obj = self.object(path, json)?;

        if model.is_delegate {
            self.violation(path, format!("`{}` is a delegate model and cannot be created directly", model.name));
            return None;
        }

        let mut data = WriteArgs::new();
        let mut nested = Vec::new();
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            let Some(field) = self.writable_field(model, &path, key) else {
                valid = false;
                continue;
            };

            if implied.contains(key) {
                self.violation(&path, "set through the parent relation");
                valid = false;
                continue;
            }

            if field.is_relation() {
                match self.parse_relation_writes(model, field, &path, value, false) {
                    Some(writes) => nested.extend(writes),
                    None => valid = false,
                }

                continue;
            }

            match self.write_value(field, &path, value) {
                Some(value) => data.set(key.clone(), value),
                None => valid = false,
            }
        }

        for field in model.scalar_fields() {
            let satisfied = obj.contains_key(&field.name)
                || implied.contains(&field.name)
                || !field.is_required()
                || field.is_generated()
                || field.is_discriminator
                || field
                    .foreign_key_for
                    .iter()
                    .any(|rel| implied.contains(rel) || nested.iter().any(|n: &NestedWrite| &n.field == rel));

            if !satisfied {
                self.violation(&path.add(&field.name), "argument is required");
                valid = false;
            }
        }

        valid.then_some(CreateInput { data, nested })
    }

    /// One row or an array of rows, without relation writes.
    pub(super) fn parse_create_many_data(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<Vec<WriteArgs>> {
        self.parse_create_many_rows(model, path, json, &[])
    }

    fn parse_create_many_rows(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
        implied: &[String],
    ) -> Option<Vec<WriteArgs>> {
        self.each(path, json, true, |p, path, row| {
            if let JsonValue::Object(obj) = row {
                if let Some(relation) = obj.keys().find(|k| model.find_field(k).is_some_and(FieldDef::is_relation)) {
                    p.violation(&path.add(relation), "relations cannot be written by bulk creates");
                    return None;
                }
            }

            p.parse_create_data(model, path, row, implied).map(|input| input.data)
        })
    }

    pub(super) fn parse_update_data(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<UpdateInput> {
        self.parse_update_fields(model, path, json, true)
    }

    pub(super) fn parse_update_many_data(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
    ) -> Option<WriteArgs> {
        self.parse_update_fields(model, path, json, false).map(|input| input.data)
    }

    fn parse_update_fields(
        &mut self,
        model: &ModelDef,
        path: &ArgumentPath,
        json: &JsonValue,
        relations: bool,
    ) -> Option<UpdateInput> {
        let obj = self.object(path, json)?;
        let mut input = UpdateInput::default();
        let mut valid = true;

        for (key, value) in obj {
            let path = path.add(key);

            let Some(field) = self.writable_field(model, &path, key) else {
                valid = false;
                continue;
            };

            if field.is_relation() {
                if !relations {
                    self.violation(&path, "relations cannot be written by bulk updates");
                    valid = false;
                    continue;
                }

                match self.parse_relation_writes(model, field, &path, value, true) {
                    Some(writes) => input.nested.extend(writes),
                    None => valid = false,
                }

                continue;
            }

            match self.parse_field_update(field, &path, value) {
                Some(op) => input.data.insert(key.clone(), op),
                None => valid = false,
            }
        }

        valid.then_some(input)
    }

    fn writable_field<'m>(&mut self, model: &'m ModelDef, path: &ArgumentPath, name: &str) -> Option<&'m FieldDef> {
        let field = self.field(model, path, name)?;

        if field.computed {
            self.violation(path, "computed fields cannot be written");
            return None;
        }

        if field.is_discriminator {
            self.violation(path, "the discriminator is set automatically");
            return None;
        }

        Some(field)
    }

    fn write_value(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<Value> {
        let value = self.coerce(field, path, json)?;

        if value.is_null() && !field.optional {
            self.violation(path, "must not be null");
            return None;
        }

        self.check_validations(field, path, &value).then_some(value)
    }

    /// A plain value or `{ set | increment | decrement | multiply | divide: value }`.
    fn parse_field_update(&mut self, field: &FieldDef, path: &ArgumentPath, json: &JsonValue) -> Option<WriteOperation> {
        let is_document = matches!(
            self.schema.field_kind(field),
            Some(FieldKind::Scalar(ScalarType::Json)) | Some(FieldKind::TypeDef(_))
        );

        let obj = match json {
            JsonValue::Object(obj) if !is_document && type_tag(obj).is_none() => obj,
            plain => return self.write_value(field, path, plain).map(WriteOperation::Set),
        };

        self.check_keys(path, obj, FIELD_UPDATE_KEYS);

        let mut ops = obj.iter();
        let (Some((op, operand)), None) = (ops.next(), ops.next()) else {
            self.violation(path, "expected exactly one update operation");
            return None;
        };

        let path = path.add(op);

        if op == "set" {
            return self.write_value(field, &path, operand).map(WriteOperation::Set);
        }

        if field.array || !field.scalar_type().is_some_and(|t| t.is_numeric()) {
            self.violation(&path, format!("`{op}` needs a numeric field"));
            return None;
        }

        let operand = self.coerce(field, &path, operand)?;

        if operand.is_null() {
            self.violation(&path, "must not be null");
            return None;
        }

        match op.as_str() {
            "increment" => Some(WriteOperation::Increment(operand)),
            "decrement" => Some(WriteOperation::Decrement(operand)),
            "multiply" => Some(WriteOperation::Multiply(operand)),
            "divide" => Some(WriteOperation::Divide(operand)),
            _ => None,
        }
    }

    /// Nested writes of one relation field, one per given action.
    fn parse_relation_writes(
        &mut self,
        model: &ModelDef,
        field: &FieldDef,
        path: &ArgumentPath,
        json: &JsonValue,
        updating: bool,
    ) -> Option<Vec<NestedWrite>> {
        let rel = match self.schema.relation(&model.name, &field.name) {
            Ok(rel) => rel,
            Err(err) => {
                self.violation(path, err.to_string());
                return None;
            }
        };

        let obj = self.object(path, json)?;

        let allowed = match (updating, rel.is_to_many()) {
            (false, false) => CREATE_TO_ONE_KEYS,
            (false, true) => CREATE_TO_MANY_KEYS,
            (true, false) => UPDATE_TO_ONE_KEYS,
            (true, true) => UPDATE_TO_MANY_KEYS,
        };

        self.check_keys(path, obj, allowed);

        if !updating && !rel.is_to_many() && obj.len() > 1 {
            self.violation(path, "a to-one relation takes a single nested write");
            return None;
        }

        let implied = implied_fields(&rel);

        let writes: Vec<Option<NestedWrite>> = obj
            .iter()
            .filter(|(key, _)| allowed.contains(&key.as_str()))
            .map(|(key, value)| {
                let action = self.parse_nested_action(&rel, &implied, &path.add(key), key, value)?;

                Some(NestedWrite {
                    field: field.name.clone(),
                    action,
                })
            })
            .collect();

        writes.into_iter().collect()
    }

    fn parse_nested_action(
        &mut self,
        rel: &ResolvedRelation<'_>,
        implied: &[String],
        path: &ArgumentPath,
        key: &str,
        json: &JsonValue,
    ) -> Option<NestedAction> {
        let target = rel.target;
        let many = rel.is_to_many();

        let action = match key {
            "create" => NestedAction::Create(
                self.each(path, json, many, |p, path, item| p.parse_create_data(target, path, item, implied))?,
            ),
            "createMany" => {
                let obj = self.object(path, json)?;
                self.check_keys(path, obj, &["data", "skipDuplicates"]);

                let data = self
                    .required(path, obj, "data")
                    .and_then(|data| self.parse_create_many_rows(target, &path.add("data"), data, implied));

                let skip_duplicates = match obj.get("skipDuplicates") {
                    Some(json) => self.boolean(&path.add("skipDuplicates"), json),
                    None => Some(false),
                };

                NestedAction::CreateMany {
                    data: data?,
                    skip_duplicates: skip_duplicates?,
                }
            }
            "connect" => NestedAction::Connect(
                self.each(path, json, many, |p, path, item| p.parse_unique_filter(target, path, item))?,
            ),
            "connectOrCreate" => NestedAction::ConnectOrCreate(self.each(path, json, many, |p, path, item| {
                let obj = p.object(path, item)?;
                p.check_keys(path, obj, &["where", "create"]);

                let filter = p
                    .required(path, obj, "where")
                    .and_then(|json| p.parse_unique_filter(target, &path.add("where"), json));
                let create = p
                    .required(path, obj, "create")
                    .and_then(|json| p.parse_create_data(target, &path.add("create"), json, implied));

                Some(ConnectOrCreate {
                    filter: filter?,
                    create: create?,
                })
            })?),
            "disconnect" if !many => NestedAction::Disconnect(self.to_one_target(target, path, json)?),
            "disconnect" => NestedAction::Disconnect(
                self.each(path, json, true, |p, path, item| p.parse_unique_filter(target, path, item))?,
            ),
            "set" => {
                let filters = match json {
                    JsonValue::Array(items) if items.is_empty() => Some(Vec::new()),
                    other => self.each(path, other, true, |p, path, item| p.parse_unique_filter(target, path, item)),
                };

                NestedAction::Set(filters?)
            }
            "update" if !many => {
                let obj = self.object(path, json)?;

                // `{ where, data }` or the data itself
                let (filter, data) = if obj.contains_key("data") && obj.keys().all(|k| k == "where" || k == "data") {
                    let filter = match obj.get("where") {
                        Some(json) => self.parse_filter(target, &path.add("where"), json),
                        None => Some(Filter::Empty),
                    };

                    (filter, self.parse_update_data(target, &path.add("data"), &obj["data"]))
                } else {
                    (Some(Filter::Empty), self.parse_update_data(target, path, json))
                };

                NestedAction::Update(vec![NestedUpdate {
                    filter: filter?,
                    data: data?,
                }])
            }
            "update" => NestedAction::Update(self.each(path, json, true, |p, path, item| {
                let obj = p.object(path, item)?;
                p.check_keys(path, obj, &["where", "data"]);

                let filter = p
                    .required(path, obj, "where")
                    .and_then(|json| p.parse_unique_filter(target, &path.add("where"), json));
                let data = p
                    .required(path, obj, "data")
                    .and_then(|json| p.parse_update_data(target, &path.add("data"), json));

                Some(NestedUpdate {
                    filter: filter?,
                    data: data?,
                })
            })?),
            "updateMany" => NestedAction::UpdateMany(self.each(path, json, true, |p, path, item| {
                let obj = p.object(path, item)?;
                p.check_keys(path, obj, &["where", "data"]);

                let filter = match obj.get("where") {
                    Some(json) => p.parse_filter(target, &path.add("where"), json),
                    None => Some(Filter::Empty),
                };
                let data = p
                    .required(path, obj, "data")
                    .and_then(|json| p.parse_update_many_data(target, &path.add("data"), json));

                Some(NestedUpdateMany {
                    filter: filter?,
                    data: data?,
                })
            })?),
            "upsert" => NestedAction::Upsert(self.each(path, json, many, |p, path, item| {
                let obj = p.object(path, item)?;
                p.check_keys(path, obj, &["where", "create", "update"]);

                let filter = match (obj.get("where"), many) {
                    (Some(json), true) => p.parse_unique_filter(target, &path.add("where"), json),
                    (Some(json), false) => p.parse_filter(target, &path.add("where"), json),
                    (None, true) => {
                        p.violation(&path.add("where"), "argument is required");
                        None
                    }
                    (None, false) => Some(Filter::Empty),
                };
                let create = p
                    .required(path, obj, "create")
                    .and_then(|json| p.parse_create_data(target, &path.add("create"), json, implied));
                let update = p
                    .required(path, obj, "update")
                    .and_then(|json| p.parse_update_data(target, &path.add("update"), json));

                Some(NestedUpsert {
                    filter: filter?,
                    create: create?,
                    update: update?,
                })
            })?),
            "delete" if !many => NestedAction::Delete(self.to_one_target(target, path, json)?),
            "delete" => NestedAction::Delete(
                self.each(path, json, true, |p, path, item| p.parse_unique_filter(target, path, item))?,
            ),
            "deleteMany" => NestedAction::DeleteMany(
                self.each(path, json, true, |p, path, item| p.parse_filter(target, path, item))?,
            ),
            other => {
                self.violation(path, format!("unknown nested write `{other}`"));
                return None;
            }
        };

        Some(action)
    }

    /// `true`, `false` or a filter the related row must match, for
    /// `disconnect` and `delete` of to-one relations.
    fn to_one_target(&mut self, target: &ModelDef, path: &ArgumentPath, json: &JsonValue) -> Option<Vec<Filter>> {
        match json {
            JsonValue::Bool(true) => Some(vec![Filter::Empty]),
            JsonValue::Bool(false) => Some(Vec::new()),
            JsonValue::Object(_) => self.parse_filter(target, path, json).map(|f| vec![f]),
            other => {
                self.violation(path, format!("expected a boolean or a filter, received {}", describe(other)));
                None
            }
        }
    }

    /// Parses each element of an array, or `json` itself when `many` is not
    /// set or it is not an array.
    fn each<T>(
        &mut self,
        path: &ArgumentPath,
        json: &JsonValue,
        many: bool,
        mut parse: impl FnMut(&mut Self, &ArgumentPath, &JsonValue) -> Option<T>,
    ) -> Option<Vec<T>> {
        let parsed: Vec<Option<T>> = match json {
            JsonValue::Array(items) if many => items
                .iter()
                .enumerate()
                .map(|(i, item)| parse(self, &path.index(i), item))
                .collect(),
            single => vec![parse(self, path, single)],
        };

        parsed.into_iter().collect()
    }
}
