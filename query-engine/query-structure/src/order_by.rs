use crate::AggregationFunction;

#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn reverse(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Ascending),
            "desc" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn reverse(self) -> Self {
        match self {
            NullsOrder::First => NullsOrder::Last,
            NullsOrder::Last => NullsOrder::First,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderBy {
    Scalar(OrderByScalar),
    /// Ordering by the number of related rows of a to-many relation.
    ToManyCount(OrderByToManyCount),
    /// Ordering groups by an aggregate.
    Aggregation(OrderByAggregation),
}

impl OrderBy {
    pub fn scalar(field: impl Into<String>, sort_order: SortOrder) -> Self {
        OrderBy::Scalar(OrderByScalar {
            field: field.into(),
            path: Vec::new(),
            sort_order,
            nulls_order: None,
        })
    }

    pub fn sort_order(&self) -> SortOrder {
        match self {
            OrderBy::Scalar(o) => o.sort_order,
            OrderBy::ToManyCount(o) => o.sort_order,
            OrderBy::Aggregation(o) => o.sort_order,
        }
    }

    /// The same ordering in the opposite direction, flipping null placement.
    pub fn reversed(&self) -> Self {
        match self {
            OrderBy::Scalar(o) => OrderBy::Scalar(OrderByScalar {
                sort_order: o.sort_order.reverse(),
                nulls_order: o.nulls_order.map(NullsOrder::reverse),
                ..o.clone()
            }),
            OrderBy::ToManyCount(o) => OrderBy::ToManyCount(OrderByToManyCount {
                sort_order: o.sort_order.reverse(),
                ..o.clone()
            }),
            OrderBy::Aggregation(o) => OrderBy::Aggregation(OrderByAggregation {
                sort_order: o.sort_order.reverse(),
                ..o.clone()
            }),
        }
    }

    /// The own scalar field being sorted on, without relation hops.
    pub fn own_field(&self) -> Option<&str> {
        match self {
            OrderBy::Scalar(o) if o.path.is_empty() => Some(&o.field),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByScalar {
    pub field: String,
    /// To-one relation fields leading to the model holding `field`.
    pub path: Vec<String>,
    pub sort_order: SortOrder,
    pub nulls_order: Option<NullsOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByToManyCount {
    pub field: String,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByAggregation {
    pub function: AggregationFunction,
    pub field: String,
    pub sort_order: SortOrder,
}
