use super::*;

/// Tree structures and leaves for condition building.
#[derive(Debug, PartialEq, Clone, Default)]
pub enum ConditionTree {
    /// `(left_expression AND right_expression)`
    And(Vec<Expression>),
    /// `(left_expression OR right_expression)`
    Or(Vec<Expression>),
    /// `(NOT expression)`
    Not(Box<Expression>),
    /// A single expression leaf
    Single(Box<Expression>),
    /// A leaf that does nothing to the condition, `1=1`
    #[default]
    NoCondition,
    /// A leaf that cancels the condition, `1=0`
    NegativeCondition,
}

impl ConditionTree {
    /// An `AND` statement, is true when all of the expressions are true.
    pub fn and<I, E>(exprs: I) -> ConditionTree
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        let mut exprs: Vec<Expression> = exprs.into_iter().map(Into::into).collect();

        match exprs.len() {
            0 => ConditionTree::NoCondition,
            1 => ConditionTree::Single(Box::new(exprs.remove(0))),
            _ => ConditionTree::And(exprs),
        }
    }

    /// An `OR` statement, is true when one of the expressions is true.
    pub fn or<I, E>(exprs: I) -> ConditionTree
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        let mut exprs: Vec<Expression> = exprs.into_iter().map(Into::into).collect();

        match exprs.len() {
            0 => ConditionTree::NegativeCondition,
            1 => ConditionTree::Single(Box::new(exprs.remove(0))),
            _ => ConditionTree::Or(exprs),
        }
    }

    /// A `NOT` statement, is true when the expression is false.
    pub fn not<E>(expr: E) -> ConditionTree
    where
        E: Into<Expression>,
    {
        ConditionTree::Not(Box::new(expr.into()))
    }

    /// A single leaf, is true when the expression is true.
    pub fn single<E>(expr: E) -> ConditionTree
    where
        E: Into<Expression>,
    {
        ConditionTree::Single(Box::new(expr.into()))
    }

    /// Inverts the entire condition tree if condition is met.
    pub fn invert_if(self, invert: bool) -> ConditionTree {
        if invert {
            self.negate()
        } else {
            self
        }
    }

    /// Negation that folds the constant leaves.
    pub fn negate(self) -> ConditionTree {
        match self {
            ConditionTree::NoCondition => ConditionTree::NegativeCondition,
            ConditionTree::NegativeCondition => ConditionTree::NoCondition,
            other => ConditionTree::not(other),
        }
    }

    pub fn is_no_condition(&self) -> bool {
        matches!(self, ConditionTree::NoCondition)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, ConditionTree::NegativeCondition)
    }

    /// Combines two trees with `AND`, dropping constant `1=1` leaves.
    pub fn and_with(self, other: ConditionTree) -> ConditionTree {
        match (self, other) {
            (ConditionTree::NoCondition, other) | (other, ConditionTree::NoCondition) => other,
            (ConditionTree::NegativeCondition, _) | (_, ConditionTree::NegativeCondition) => {
                ConditionTree::NegativeCondition
            }
            (ConditionTree::And(mut left), right) => {
                left.push(right.into());
                ConditionTree::And(left)
            }
            (left, right) => ConditionTree::And(vec![left.into(), right.into()]),
        }
    }

    /// Combines two trees with `OR`, dropping constant `1=0` leaves.
    pub fn or_with(self, other: ConditionTree) -> ConditionTree {
        match (self, other) {
            (ConditionTree::NegativeCondition, other) | (other, ConditionTree::NegativeCondition) => other,
            (ConditionTree::NoCondition, _) | (_, ConditionTree::NoCondition) => ConditionTree::NoCondition,
            (ConditionTree::Or(mut left), right) => {
                left.push(right.into());
                ConditionTree::Or(left)
            }
            (left, right) => ConditionTree::Or(vec![left.into(), right.into()]),
        }
    }
}

impl From<Expression> for ConditionTree {
    fn from(expr: Expression) -> Self {
        match expr.kind {
            ExpressionKind::ConditionTree(tree) if expr.alias.is_none() => *tree,
            kind => ConditionTree::Single(Box::new(Expression { kind, alias: expr.alias })),
        }
    }
}

impl From<Select> for ConditionTree {
    fn from(sel: Select) -> Self {
        ConditionTree::single(Expression::from(sel))
    }
}
