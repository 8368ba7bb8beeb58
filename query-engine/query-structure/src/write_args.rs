use crate::Filter;
use bastion_value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Set(Value),
    Increment(Value),
    Decrement(Value),
    Multiply(Value),
    Divide(Value),
}

impl WriteOperation {
    pub fn as_set(&self) -> Option<&Value> {
        match self {
            WriteOperation::Set(v) => Some(v),
            _ => None,
        }
    }
}

/// Scalar values of a create or update, in argument order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteArgs {
    pub args: IndexMap<String, WriteOperation>,
}

impl WriteArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, op: WriteOperation) {
        self.args.insert(field.into(), op);
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.insert(field, WriteOperation::Set(value));
    }

    pub fn get(&self, field: &str) -> Option<&WriteOperation> {
        self.args.get(field)
    }

    pub fn get_value(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(WriteOperation::as_set)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.args.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<WriteOperation> {
        self.args.shift_remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WriteOperation)> + '_ {
        self.args.iter()
    }

    /// Splits off the fields matching `predicate` into a new set.
    pub fn split_off<F>(&mut self, predicate: F) -> WriteArgs
    where
        F: Fn(&str) -> bool,
    {
        let (taken, kept): (IndexMap<_, _>, IndexMap<_, _>) =
            std::mem::take(&mut self.args).into_iter().partition(|(k, _)| predicate(k));

        self.args = kept;
        WriteArgs { args: taken }
    }
}

impl FromIterator<(String, Value)> for WriteArgs {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            args: iter.into_iter().map(|(k, v)| (k, WriteOperation::Set(v))).collect(),
        }
    }
}

/// The data of one created record with its nested relation writes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateInput {
    pub data: WriteArgs,
    pub nested: Vec<NestedWrite>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateInput {
    pub data: WriteArgs,
    pub nested: Vec<NestedWrite>,
}

impl UpdateInput {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.nested.is_empty()
    }
}

/// A mutation of the rows related through `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedWrite {
    pub field: String,
    pub action: NestedAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOrCreate {
    pub filter: Filter,
    pub create: CreateInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedUpdate {
    /// Selects the related row. Empty for to-one relations.
    pub filter: Filter,
    pub data: UpdateInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedUpsert {
    pub filter: Filter,
    pub create: CreateInput,
    pub update: UpdateInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedUpdateMany {
    pub filter: Filter,
    pub data: WriteArgs,
}

/// Filters in `connect`, `disconnect`, `set` and `delete` are unique filters;
/// an empty filter on a to-one relation stands for `true`.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedAction {
    Create(Vec<CreateInput>),
    CreateMany { data: Vec<WriteArgs>, skip_duplicates: bool },
    Connect(Vec<Filter>),
    ConnectOrCreate(Vec<ConnectOrCreate>),
    Disconnect(Vec<Filter>),
    Set(Vec<Filter>),
    Update(Vec<NestedUpdate>),
    UpdateMany(Vec<NestedUpdateMany>),
    Upsert(Vec<NestedUpsert>),
    Delete(Vec<Filter>),
    DeleteMany(Vec<Filter>),
}

impl NestedAction {
    pub fn name(&self) -> &'static str {
        match self {
            NestedAction::Create(_) => "create",
            NestedAction::CreateMany { .. } => "createMany",
            NestedAction::Connect(_) => "connect",
            NestedAction::ConnectOrCreate(_) => "connectOrCreate",
            NestedAction::Disconnect(_) => "disconnect",
            NestedAction::Set(_) => "set",
            NestedAction::Update(_) => "update",
            NestedAction::UpdateMany(_) => "updateMany",
            NestedAction::Upsert(_) => "upsert",
            NestedAction::Delete(_) => "delete",
            NestedAction::DeleteMany(_) => "deleteMany",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn split_off_keeps_order() {
        let mut args: WriteArgs = vec![
            ("a".to_owned(), Value::Int(1)),
            ("b".to_owned(), Value::Int(2)),
            ("c".to_owned(), Value::Int(3)),
        ]
        .into_iter()
        .collect();

        let taken = args.split_off(|f| f != "b");

        assert_eq!(vec!["a", "c"], taken.args.keys().collect::<Vec<_>>());
        assert_eq!(vec!["b"], args.args.keys().collect::<Vec<_>>());
    }
}
