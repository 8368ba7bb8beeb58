use super::*;

/// For modeling comparison expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Compare {
    /// `left = right`
    Equals(Box<Expression>, Box<Expression>),
    /// `left <> right`
    NotEquals(Box<Expression>, Box<Expression>),
    /// `left < right`
    LessThan(Box<Expression>, Box<Expression>),
    /// `left <= right`
    LessThanOrEquals(Box<Expression>, Box<Expression>),
    /// `left > right`
    GreaterThan(Box<Expression>, Box<Expression>),
    /// `left >= right`
    GreaterThanOrEquals(Box<Expression>, Box<Expression>),
    /// `left IN (..)`
    In(Box<Expression>, Box<Expression>),
    /// `left NOT IN (..)`
    NotIn(Box<Expression>, Box<Expression>),
    /// `left LIKE pattern ESCAPE '\'`
    Like(Box<Expression>, Box<Expression>, LikeOptions),
    /// `value IS NULL`
    Null(Box<Expression>),
    /// `value IS NOT NULL`
    NotNull(Box<Expression>),
    /// `EXISTS (..)`
    Exists(Box<Select>),
    /// `NOT EXISTS (..)`
    NotExists(Box<Select>),
    /// Membership tests on list columns.
    ListHas(Box<Expression>, Vec<Expression>, ListQuantifier),
    /// `list` is (not) an empty list.
    ListIsEmpty(Box<Expression>, bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LikeOptions {
    pub insensitive: bool,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListQuantifier {
    /// At least one of the values is an element of the list.
    Some,
    /// Every value is an element of the list.
    Every,
}

pub fn exists(select: Select) -> Compare {
    Compare::Exists(Box::new(select))
}

pub fn not_exists(select: Select) -> Compare {
    Compare::NotExists(Box::new(select))
}

impl From<Compare> for ConditionTree {
    fn from(cmp: Compare) -> Self {
        ConditionTree::single(Expression::from(cmp))
    }
}

/// An item that can be compared against other values in the database.
pub trait Comparable {
    fn equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>;

    fn not_equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>;

    fn less_than<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>;

    fn less_than_or_equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>;

    fn greater_than<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>;

    fn greater_than_or_equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>;

    /// Tests if the expression is included in a row of values or a sub-select.
    fn in_selection<T>(self, selection: T) -> Compare
    where
        T: Into<Expression>;

    fn not_in_selection<T>(self, selection: T) -> Compare
    where
        T: Into<Expression>;

    /// `LIKE` with `\` as the escape character.
    fn like<T>(self, pattern: T, options: LikeOptions) -> Compare
    where
        T: Into<Expression>;

    fn is_null(self) -> Compare;

    fn is_not_null(self) -> Compare;

    fn list_has(self, values: Vec<Expression>, quantifier: ListQuantifier) -> Compare;

    fn list_is_empty(self, empty: bool) -> Compare;
}

impl<U> Comparable for U
where
    U: Into<Expression>,
{
    fn equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::Equals(Box::new(self.into()), Box::new(comparison.into()))
    }

    fn not_equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::NotEquals(Box::new(self.into()), Box::new(comparison.into()))
    }

    fn less_than<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::LessThan(Box::new(self.into()), Box::new(comparison.into()))
    }

    fn less_than_or_equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::LessThanOrEquals(Box::new(self.into()), Box::new(comparison.into()))
    }

    fn greater_than<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::GreaterThan(Box::new(self.into()), Box::new(comparison.into()))
    }

    fn greater_than_or_equals<T>(self, comparison: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::GreaterThanOrEquals(Box::new(self.into()), Box::new(comparison.into()))
    }

    fn in_selection<T>(self, selection: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::In(Box::new(self.into()), Box::new(selection.into()))
    }

    fn not_in_selection<T>(self, selection: T) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::NotIn(Box::new(self.into()), Box::new(selection.into()))
    }

    fn like<T>(self, pattern: T, options: LikeOptions) -> Compare
    where
        T: Into<Expression>,
    {
        Compare::Like(Box::new(self.into()), Box::new(pattern.into()), options)
    }

    fn is_null(self) -> Compare {
        Compare::Null(Box::new(self.into()))
    }

    fn is_not_null(self) -> Compare {
        Compare::NotNull(Box::new(self.into()))
    }

    fn list_has(self, values: Vec<Expression>, quantifier: ListQuantifier) -> Compare {
        Compare::ListHas(Box::new(self.into()), values, quantifier)
    }

    fn list_is_empty(self, empty: bool) -> Compare {
        Compare::ListIsEmpty(Box::new(self.into()), empty)
    }
}
