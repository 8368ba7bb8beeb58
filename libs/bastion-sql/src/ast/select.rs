use super::*;

#[derive(Debug, PartialEq, Clone)]
pub enum DistinctType {
    Default,
    /// `DISTINCT ON (..)`, PostgreSQL only.
    OnClause(Vec<Expression>),
}

/// A builder for a `SELECT` statement.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Select {
    pub distinct: Option<DistinctType>,
    pub tables: Vec<Table>,
    pub columns: Vec<Expression>,
    pub conditions: Option<ConditionTree>,
    pub ordering: Ordering,
    pub grouping: Vec<Expression>,
    pub having: Option<ConditionTree>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub joins: Vec<Join>,
}

impl Select {
    /// Creates a new `SELECT` statement for the given table.
    pub fn from_table<T>(table: T) -> Self
    where
        T: Into<Table>,
    {
        Select {
            tables: vec![table.into()],
            ..Default::default()
        }
    }

    /// Selects a static value or any other expression as a column.
    pub fn value<T>(mut self, value: T) -> Self
    where
        T: Into<Expression>,
    {
        self.columns.push(value.into());
        self
    }

    /// Adds a column to be selected.
    pub fn column<T>(mut self, column: T) -> Self
    where
        T: Into<Column>,
    {
        self.columns.push(column.into().into());
        self
    }

    /// A bulk method to select multiple values.
    pub fn columns<T, C>(mut self, columns: T) -> Self
    where
        T: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns.extend(columns.into_iter().map(|c| c.into().into()));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = Some(DistinctType::Default);
        self
    }

    pub fn distinct_on(mut self, exprs: Vec<Expression>) -> Self {
        self.distinct = Some(DistinctType::OnClause(exprs));
        self
    }

    /// Adds `WHERE` conditions to the query, replacing the previous ones.
    pub fn so_that<T>(mut self, conditions: T) -> Self
    where
        T: Into<ConditionTree>,
    {
        self.conditions = Some(conditions.into());
        self
    }

    /// Adds an additional `WHERE` condition to the query combining the
    /// possible previous condition with `AND`.
    pub fn and_where<T>(mut self, conditions: T) -> Self
    where
        T: Into<ConditionTree>,
    {
        self.conditions = Some(match self.conditions.take() {
            Some(previous) => previous.and_with(conditions.into()),
            None => conditions.into(),
        });

        self
    }

    pub fn inner_join(mut self, join: JoinData) -> Self {
        self.joins.push(Join::Inner(join));
        self
    }

    pub fn left_join(mut self, join: JoinData) -> Self {
        self.joins.push(Join::Left(join));
        self
    }

    pub fn order_by(mut self, value: OrderDefinition) -> Self {
        self.ordering = self.ordering.append(value);
        self
    }

    pub fn group_by<T>(mut self, value: T) -> Self
    where
        T: Into<Expression>,
    {
        self.grouping.push(value.into());
        self
    }

    pub fn having<T>(mut self, conditions: T) -> Self
    where
        T: Into<ConditionTree>,
    {
        self.having = Some(conditions.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}
