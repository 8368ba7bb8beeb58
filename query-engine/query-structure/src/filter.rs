use crate::{AggregationFunction, SelectionResult};
use bastion_value::{NullSentinel, Value};

/// A normalized `where` tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Vec<Filter>),
    Scalar(ScalarFilter),
    Relation(RelationFilter),
    /// A condition on an aggregate, only valid in `having`.
    Aggregation(AggregationFilter),
    BoolFilter(bool),
    #[default]
    Empty,
}

impl Filter {
    pub fn empty() -> Self {
        Filter::Empty
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        let mut filters: Vec<Filter> = filters.into_iter().filter(|f| !f.is_empty()).collect();

        match filters.len() {
            0 => Filter::Empty,
            1 => filters.remove(0),
            _ => Filter::And(filters),
        }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn not(filters: Vec<Filter>) -> Self {
        Filter::Not(filters)
    }

    pub fn scalar(field: impl Into<String>, condition: ScalarCondition) -> Self {
        Filter::Scalar(ScalarFilter {
            field: field.into(),
            condition,
            mode: QueryMode::Default,
        })
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Empty => true,
            Filter::And(filters) => filters.iter().all(Filter::is_empty),
            _ => false,
        }
    }

    /// Equality on every pair of the selection.
    pub fn from_selection(selection: &SelectionResult) -> Self {
        let filters = selection
            .pairs
            .iter()
            .map(|(field, value)| Filter::scalar(field.clone(), ScalarCondition::Equals(value.clone().into())))
            .collect();

        Filter::and(filters)
    }

    /// Matches any of the given records.
    pub fn from_selections(selections: &[SelectionResult]) -> Self {
        match selections {
            [] => Filter::BoolFilter(false),
            [single] => Filter::from_selection(single),
            many => {
                if let Some(field) = many[0].single_field() {
                    let values = many.iter().filter_map(|s| s.pairs.first().map(|(_, v)| v.clone())).collect();

                    Filter::scalar(field.to_owned(), ScalarCondition::In(values))
                } else {
                    Filter::Or(many.iter().map(Filter::from_selection).collect())
                }
            }
        }
    }

    /// Whether the tree references a relation anywhere.
    pub fn has_relations(&self) -> bool {
        match self {
            Filter::Relation(_) => true,
            Filter::And(fs) | Filter::Or(fs) | Filter::Not(fs) => fs.iter().any(Filter::has_relations),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFilter {
    pub field: String,
    pub condition: ScalarCondition,
    pub mode: QueryMode,
}

/// The right-hand side of a scalar comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Value(Value),
    /// Another field of the same row.
    FieldRef(String),
}

impl ConditionValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ConditionValue::Value(v) => Some(v),
            ConditionValue::FieldRef(_) => None,
        }
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        ConditionValue::Value(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarCondition {
    Equals(ConditionValue),
    NotEquals(ConditionValue),
    Contains(ConditionValue),
    NotContains(ConditionValue),
    StartsWith(ConditionValue),
    NotStartsWith(ConditionValue),
    EndsWith(ConditionValue),
    NotEndsWith(ConditionValue),
    LessThan(ConditionValue),
    LessThanOrEquals(ConditionValue),
    GreaterThan(ConditionValue),
    GreaterThanOrEquals(ConditionValue),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// List field contains the value.
    Has(Value),
    HasSome(Vec<Value>),
    HasEvery(Vec<Value>),
    IsEmpty(bool),
    Json(JsonCondition),
}

impl ScalarCondition {
    pub fn invert(self, condition: bool) -> Self {
        if !condition {
            return self;
        }

        match self {
            Self::Equals(v) => Self::NotEquals(v),
            Self::NotEquals(v) => Self::Equals(v),
            Self::Contains(v) => Self::NotContains(v),
            Self::NotContains(v) => Self::Contains(v),
            Self::StartsWith(v) => Self::NotStartsWith(v),
            Self::NotStartsWith(v) => Self::StartsWith(v),
            Self::EndsWith(v) => Self::NotEndsWith(v),
            Self::NotEndsWith(v) => Self::EndsWith(v),
            Self::LessThan(v) => Self::GreaterThanOrEquals(v),
            Self::LessThanOrEquals(v) => Self::GreaterThan(v),
            Self::GreaterThan(v) => Self::LessThanOrEquals(v),
            Self::GreaterThanOrEquals(v) => Self::LessThan(v),
            Self::In(v) => Self::NotIn(v),
            Self::NotIn(v) => Self::In(v),
            Self::IsEmpty(v) => Self::IsEmpty(!v),
            Self::Json(json) => Self::Json(JsonCondition {
                negated: !json.negated,
                ..json
            }),
            other @ (Self::Has(_) | Self::HasSome(_) | Self::HasEvery(_)) => other,
        }
    }
}

/// The target of a JSON equality, which distinguishes the three nulls.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonTarget {
    Value(serde_json::Value),
    Null(NullSentinel),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonPredicate {
    Equals(JsonTarget),
    StringContains(String),
    StringStartsWith(String),
    StringEndsWith(String),
    ArrayContains(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonCondition {
    /// Path into the document. Empty compares the whole value.
    pub path: Vec<String>,
    pub predicate: JsonPredicate,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationCondition {
    /// Some related row matches (to-many).
    AtLeastOneRelatedRecord,
    /// Every related row matches (to-many).
    EveryRelatedRecord,
    /// No related row matches (to-many).
    NoRelatedRecord,
    /// The related row exists and matches (to-one).
    ToOneRelatedRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationFilter {
    pub field: String,
    pub condition: RelationCondition,
    pub nested: Box<Filter>,
}

impl RelationFilter {
    pub fn new(field: impl Into<String>, condition: RelationCondition, nested: Filter) -> Self {
        Self {
            field: field.into(),
            condition,
            nested: Box::new(nested),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationFilter {
    pub function: AggregationFunction,
    /// `None` is `_count` over all rows.
    pub field: Option<String>,
    pub condition: ScalarCondition,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn and_collapses_empty_and_single() {
        assert_eq!(Filter::Empty, Filter::and(vec![Filter::Empty, Filter::Empty]));

        let single = Filter::scalar("x", ScalarCondition::Equals(Value::Int(1).into()));
        assert_eq!(single.clone(), Filter::and(vec![Filter::Empty, single]));
    }

    #[test]
    fn selections_become_in_filters() {
        let selections = vec![
            SelectionResult::new(vec![("id".into(), Value::Int(1))]),
            SelectionResult::new(vec![("id".into(), Value::Int(2))]),
        ];

        assert_eq!(
            Filter::scalar("id", ScalarCondition::In(vec![Value::Int(1), Value::Int(2)])),
            Filter::from_selections(&selections)
        );
        assert_eq!(Filter::BoolFilter(false), Filter::from_selections(&[]));
    }

    #[test]
    fn inverting_comparisons() {
        let cond = ScalarCondition::LessThan(Value::Int(3).into()).invert(true);
        assert_eq!(ScalarCondition::GreaterThanOrEquals(Value::Int(3).into()), cond);
    }
}
