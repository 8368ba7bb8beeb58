use super::{ConditionTree, Table};

/// The `JOIN` table and conditions.
#[derive(Debug, PartialEq, Clone)]
pub struct JoinData {
    pub table: Table,
    pub conditions: ConditionTree,
    /// `LATERAL` joins may reference columns of the preceding tables.
    pub lateral: bool,
}

impl JoinData {
    pub fn lateral(mut self) -> Self {
        self.lateral = true;
        self
    }
}

/// A representation of a `JOIN` statement.
#[derive(Debug, PartialEq, Clone)]
pub enum Join {
    /// Implements an `INNER JOIN` with given `JoinData`.
    Inner(JoinData),
    /// Implements an `LEFT JOIN` with given `JoinData`.
    Left(JoinData),
}

impl Join {
    pub fn data(&self) -> &JoinData {
        match self {
            Join::Inner(data) | Join::Left(data) => data,
        }
    }

    pub fn data_mut(&mut self) -> &mut JoinData {
        match self {
            Join::Inner(data) | Join::Left(data) => data,
        }
    }
}

/// An item that can be joined.
pub trait Joinable {
    /// Add the `JOIN` conditions.
    fn on<T>(self, conditions: T) -> JoinData
    where
        T: Into<ConditionTree>;
}

impl<U> Joinable for U
where
    U: Into<Table>,
{
    fn on<T>(self, conditions: T) -> JoinData
    where
        T: Into<ConditionTree>,
    {
        JoinData {
            table: self.into(),
            conditions: conditions.into(),
            lateral: false,
        }
    }
}
