use crate::{Filter, QueryArguments};
use bastion_value::Value;

/// The identity of a record: its id or unique fields with their values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionResult {
    pub pairs: Vec<(String, Value)>,
}

impl SelectionResult {
    pub fn new(pairs: Vec<(String, Value)>) -> Self {
        Self { pairs }
    }

    /// Extracts `fields` from a record, failing if one is missing or null.
    pub fn from_record(record: &Value, fields: &[&str]) -> Option<Self> {
        let pairs = fields
            .iter()
            .map(|f| match record.get(f) {
                Some(v) if !v.is_null() => Some((f.to_string(), v.clone())),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self { pairs })
    }

    pub fn single_field(&self) -> Option<&str> {
        match self.pairs.as_slice() {
            [(field, _)] => Some(field),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pairs.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.pairs.iter().map(|(_, v)| v)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.pairs)
    }
}

/// What to return for each row of a model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSelection {
    /// Scalar and computed fields, in output order.
    pub scalars: Vec<String>,
    pub relations: Vec<RelationSelection>,
    /// `_count` of to-many relations.
    pub counts: Vec<RelationCount>,
}

impl FieldSelection {
    pub fn scalars<I>(fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            scalars: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty() || !self.counts.is_empty()
    }

    pub fn contains_scalar(&self, field: &str) -> bool {
        self.scalars.iter().any(|s| s == field)
    }

    /// Adds scalar fields that are not selected yet. Returns those added.
    pub fn ensure_scalars(&mut self, fields: &[&str]) -> Vec<String> {
        let mut added = Vec::new();

        for field in fields {
            if !self.contains_scalar(field) {
                self.scalars.push(field.to_string());
                added.push(field.to_string());
            }
        }

        added
    }

    pub fn relation(&self, field: &str) -> Option<&RelationSelection> {
        self.relations.iter().find(|r| r.field == field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationSelection {
    pub field: String,
    pub args: QueryArguments,
    pub selection: FieldSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationCount {
    pub field: String,
    pub filter: Filter,
}
