use super::Expression;

/// Arithmetic between two expressions, `(left <op> right)`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOp {
    Add(Expression, Expression),
    Sub(Expression, Expression),
    Mul(Expression, Expression),
    Div(Expression, Expression),
}

impl SqlOp {
    pub fn add(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        SqlOp::Add(left.into(), right.into())
    }

    pub fn sub(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        SqlOp::Sub(left.into(), right.into())
    }

    pub fn mul(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        SqlOp::Mul(left.into(), right.into())
    }

    pub fn div(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        SqlOp::Div(left.into(), right.into())
    }
}
