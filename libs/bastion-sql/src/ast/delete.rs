use super::*;

/// A builder for a `DELETE` statement.
#[derive(Debug, PartialEq, Clone)]
pub struct Delete {
    pub table: Table,
    pub conditions: Option<ConditionTree>,
    pub returning: Option<Vec<Column>>,
}

impl Delete {
    /// Creates a new `DELETE` statement for the given table.
    pub fn from_table<T>(table: T) -> Self
    where
        T: Into<Table>,
    {
        Self {
            table: table.into(),
            conditions: None,
            returning: None,
        }
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
