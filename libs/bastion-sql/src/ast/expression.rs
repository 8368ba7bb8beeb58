use super::*;

/// An expression that can be positioned in a query. Can be a single value or a
/// statement that is evaluated into a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub alias: Option<String>,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self { kind, alias: None }
    }

    pub fn is_asterisk(&self) -> bool {
        matches!(self.kind, ExpressionKind::Asterisk(_))
    }

    /// The column this expression refers to, if it is a plain column.
    pub fn as_column(&self) -> Option<&Column> {
        match &self.kind {
            ExpressionKind::Column(c) => Some(c),
            _ => None,
        }
    }

    /// The name under which this expression appears in a result row.
    pub fn output_name(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .or_else(|| self.as_column().map(|c| c.alias.as_deref().unwrap_or(c.name.as_str())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// A database column
    Column(Box<Column>),
    /// A value bound as a query parameter
    Parameterized(Value),
    /// A trusted SQL fragment written as-is
    Raw(String),
    /// `*` or `table.*`
    Asterisk(Option<String>),
    /// A scalar sub-select
    Selection(Box<Select>),
    /// A tuple of expressions, `(a, b, c)`
    Row(Vec<Expression>),
    /// A database function call
    Function(Box<Function>),
    /// A comparison expression
    Compare(Box<Compare>),
    /// A tree of expressions to evaluate from the deepest value to up
    ConditionTree(Box<ConditionTree>),
    /// An arithmetic operation
    Op(Box<SqlOp>),
    /// The `DEFAULT` keyword in inserts
    Default,
}

/// A quick alias to create a parameterized value expression.
pub fn val<T>(value: T) -> Expression
where
    T: Into<Value>,
{
    Expression::new(ExpressionKind::Parameterized(value.into()))
}

/// A quick alias to create a raw SQL expression. Never use with user input.
pub fn raw(sql: impl Into<String>) -> Expression {
    Expression::new(ExpressionKind::Raw(sql.into()))
}

/// `*`
pub fn asterisk() -> Expression {
    Expression::new(ExpressionKind::Asterisk(None))
}

/// `table.*`
pub fn table_asterisk(table: impl Into<String>) -> Expression {
    Expression::new(ExpressionKind::Asterisk(Some(table.into())))
}

pub fn row<I, E>(values: I) -> Expression
where
    I: IntoIterator<Item = E>,
    E: Into<Expression>,
{
    Expression::new(ExpressionKind::Row(values.into_iter().map(Into::into).collect()))
}

/// A row of parameters, used for `IN` lists.
pub fn values_row<I>(values: I) -> Expression
where
    I: IntoIterator<Item = Value>,
{
    row(values.into_iter().map(val))
}

/// The boolean literal `true`, written in a way every dialect understands.
pub fn sql_true() -> Expression {
    raw("1=1")
}

pub fn sql_false() -> Expression {
    raw("1=0")
}

impl Aliasable for Expression {
    type Target = Expression;

    fn alias<T>(mut self, alias: T) -> Self::Target
    where
        T: Into<String>,
    {
        self.alias = Some(alias.into());
        self
    }
}

impl From<Column> for Expression {
    fn from(col: Column) -> Self {
        Expression::new(ExpressionKind::Column(Box::new(col)))
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::new(ExpressionKind::Parameterized(value))
    }
}

impl From<Select> for Expression {
    fn from(sel: Select) -> Self {
        Expression::new(ExpressionKind::Selection(Box::new(sel)))
    }
}

impl From<Function> for Expression {
    fn from(f: Function) -> Self {
        Expression::new(ExpressionKind::Function(Box::new(f)))
    }
}

impl From<Compare> for Expression {
    fn from(cmp: Compare) -> Self {
        Expression::new(ExpressionKind::Compare(Box::new(cmp)))
    }
}

impl From<ConditionTree> for Expression {
    fn from(ct: ConditionTree) -> Self {
        match ct {
            ConditionTree::Single(expr) => *expr,
            ct => Expression::new(ExpressionKind::ConditionTree(Box::new(ct))),
        }
    }
}

impl From<SqlOp> for Expression {
    fn from(op: SqlOp) -> Self {
        Expression::new(ExpressionKind::Op(Box::new(op)))
    }
}
