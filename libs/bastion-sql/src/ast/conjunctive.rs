use super::*;

/// `AND`, `OR` and `NOT` conjunctive implementations.
pub trait Conjunctive {
    /// Builds an `AND` condition having `self` as the left leaf and `other` as the right.
    fn and<E>(self, other: E) -> ConditionTree
    where
        E: Into<Expression>;

    /// Builds an `OR` condition having `self` as the left leaf and `other` as the right.
    fn or<E>(self, other: E) -> ConditionTree
    where
        E: Into<Expression>;

    /// Builds a `NOT` condition having `self` as the condition.
    fn not(self) -> ConditionTree;
}

impl<T> Conjunctive for T
where
    T: Into<Expression>,
{
    fn and<E>(self, other: E) -> ConditionTree
    where
        E: Into<Expression>,
    {
        ConditionTree::from(self.into()).and_with(ConditionTree::from(other.into()))
    }

    fn or<E>(self, other: E) -> ConditionTree
    where
        E: Into<Expression>,
    {
        ConditionTree::from(self.into()).or_with(ConditionTree::from(other.into()))
    }

    fn not(self) -> ConditionTree {
        ConditionTree::from(self.into()).negate()
    }
}
