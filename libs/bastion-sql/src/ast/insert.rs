use super::*;

/// A builder for an `INSERT` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub table: Table,
    pub columns: Vec<Column>,
    /// One entry per inserted row, aligned with `columns`.
    pub values: Vec<Vec<Expression>>,
    pub on_conflict: Option<OnConflict>,
    pub returning: Option<Vec<Column>>,
}

/// What to do when an insert violates a unique constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnConflict {
    DoNothing,
}

impl Insert {
    /// Creates a new single row `INSERT` statement for the given table.
    /// Without values the row is inserted with all defaults.
    pub fn single_into<T>(table: T) -> Self
    where
        T: Into<Table>,
    {
        Insert {
            table: table.into(),
            columns: Vec::new(),
            values: vec![Vec::new()],
            on_conflict: None,
            returning: None,
        }
    }

    /// Creates a new multi row `INSERT` statement for the given table and
    /// columns.
    pub fn multi_into<T, I, C>(table: T, columns: I) -> Self
    where
        T: Into<Table>,
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        Insert {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            values: Vec::new(),
            on_conflict: None,
            returning: None,
        }
    }

    /// Adds a value to a single row insert.
    pub fn value<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<Column>,
        V: Into<Expression>,
    {
        self.columns.push(key.into());

        match self.values.last_mut() {
            Some(row) => row.push(value.into()),
            None => self.values.push(vec![value.into()]),
        }

        self
    }

    /// Adds a row to a multi row insert.
    pub fn values<I, E>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        self.values.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
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
