use super::{Column, Expression};

pub type OrderDefinition = (Expression, Option<Order>);

/// A list of definitions for the `ORDER BY` statement
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Ordering(pub Vec<OrderDefinition>);

impl Ordering {
    pub fn append(mut self, value: OrderDefinition) -> Self {
        self.0.push(value);
        self
    }

    pub fn new(values: Vec<OrderDefinition>) -> Self {
        Self(values)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The ordering direction
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    /// Ascending
    Asc,
    /// Descending
    Desc,
    /// Ascending nulls first
    AscNullsFirst,
    /// Ascending nulls last
    AscNullsLast,
    /// Descending nulls first
    DescNullsFirst,
    /// Descending nulls last
    DescNullsLast,
}

impl Order {
    /// The opposite direction. Null placement flips with it so that the
    /// reversed result is exactly the original one read backwards.
    pub fn reverse(self) -> Order {
        match self {
            Order::Asc => Order::Desc,
            Order::Desc => Order::Asc,
            Order::AscNullsFirst => Order::DescNullsLast,
            Order::AscNullsLast => Order::DescNullsFirst,
            Order::DescNullsFirst => Order::AscNullsLast,
            Order::DescNullsLast => Order::AscNullsFirst,
        }
    }

    pub fn is_ascending(self) -> bool {
        matches!(self, Order::Asc | Order::AscNullsFirst | Order::AscNullsLast)
    }
}

/// An item that can be used in the `ORDER BY` statement
pub trait Orderable
where
    Self: Sized,
{
    /// Order by `self` in the given order
    fn order(self, order: Option<Order>) -> OrderDefinition;

    /// Change the order to `ASC`
    fn ascend(self) -> OrderDefinition {
        self.order(Some(Order::Asc))
    }

    /// Change the order to `DESC`
    fn descend(self) -> OrderDefinition {
        self.order(Some(Order::Desc))
    }
}

impl Orderable for Expression {
    fn order(self, order: Option<Order>) -> OrderDefinition {
        (self, order)
    }
}

impl Orderable for Column {
    fn order(self, order: Option<Order>) -> OrderDefinition {
        (self.into(), order)
    }
}
