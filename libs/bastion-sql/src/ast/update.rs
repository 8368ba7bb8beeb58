use super::*;

/// A builder for an `UPDATE` statement.
#[derive(Debug, PartialEq, Clone)]
pub struct Update {
    pub table: Table,
    pub columns: Vec<Column>,
    pub values: Vec<Expression>,
    pub conditions: Option<ConditionTree>,
    pub returning: Option<Vec<Column>>,
}

impl Update {
    /// Creates the basis for an `UPDATE` statement to the given table.
    pub fn table<T>(table: T) -> Self
    where
        T: Into<Table>,
    {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            conditions: None,
            returning: None,
        }
    }

    /// Add another column value assignment to the query
    pub fn set<K, V>(mut self, column: K, value: V) -> Self
    where
        K: Into<Column>,
        V: Into<Expression>,
    {
        self.columns.push(column.into());
        self.values.push(value.into());
        self
    }

    pub fn so_that<T>(mut self, conditions: T) -> Self
    where
        T: Into<ConditionTree>,
    {
        self.conditions = Some(conditions.into());
        self
    }

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

    pub fn returning<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.returning = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}
