use crate::{Filter, OrderBy, SelectionResult};

/// Filtering, ordering and pagination of a read.
///
/// A negative `take` reads from the end: the ordering is reversed for the
/// query and the rows are put back in the requested order afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryArguments {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<SelectionResult>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    /// Fields to de-duplicate rows on.
    pub distinct: Vec<String>,
}

impl QueryArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn needs_reversed_order(&self) -> bool {
        self.take.map(|t| t < 0).unwrap_or(false)
    }

    pub fn take_abs(&self) -> Option<i64> {
        self.take.map(i64::saturating_abs)
    }

    pub fn has_pagination(&self) -> bool {
        self.cursor.is_some() || self.skip.is_some() || self.take.is_some()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.as_ref().map(|f| !f.is_empty()).unwrap_or(false)
    }

    /// Whether rows can be fetched without an inner bounded subquery.
    pub fn is_unconstrained(&self) -> bool {
        !self.has_filter() && self.order_by.is_empty() && !self.has_pagination() && self.distinct.is_empty()
    }

    /// Distinct is applied in memory unless the engine has `DISTINCT ON`.
    pub fn requires_inmemory_distinct(&self, supports_distinct_on: bool) -> bool {
        !self.distinct.is_empty() && !supports_distinct_on
    }

    /// Pagination that has to wait for in-memory de-duplication.
    pub fn requires_inmemory_pagination(&self, supports_distinct_on: bool) -> bool {
        self.requires_inmemory_distinct(supports_distinct_on) && (self.skip.is_some() || self.take.is_some())
    }

    pub fn and_filter(&mut self, filter: Filter) {
        let current = self.filter.take().unwrap_or_default();
        self.filter = Some(Filter::and(vec![current, filter]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn taking(take: i64) -> QueryArguments {
        QueryArguments {
            take: Some(take),
            ..Default::default()
        }
    }

    #[test]
    fn negative_take_reads_from_the_end() {
        let args = taking(-3);

        assert!(args.needs_reversed_order());
        assert_eq!(Some(3), args.take_abs());
        assert!(!taking(3).needs_reversed_order());
    }

    #[test]
    fn the_smallest_take_saturates() {
        let args = taking(i64::MIN);

        assert!(args.needs_reversed_order());
        assert_eq!(Some(i64::MAX), args.take_abs());
    }
}
