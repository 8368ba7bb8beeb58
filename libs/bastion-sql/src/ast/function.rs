use super::*;

/// A database function call. The JSON variants are rendered differently by
/// every visitor.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// `COUNT(*)` when the argument is `None`.
    Count(Option<Box<Expression>>),
    Sum(Box<Expression>),
    Avg(Box<Expression>),
    Min(Box<Expression>),
    Max(Box<Expression>),
    Coalesce(Vec<Expression>),
    Lower(Box<Expression>),
    /// Builds a JSON object from key-expression pairs.
    JsonObject(Vec<(String, Expression)>),
    /// Aggregates rows into a JSON array.
    JsonArrayAgg(Box<Expression>),
    /// An empty JSON array literal.
    JsonArrayEmpty,
    /// Extracts a value at a path of object keys. With `as_text` the result
    /// is an unquoted SQL text value, otherwise a JSON value.
    JsonExtract {
        expr: Box<Expression>,
        path: Vec<String>,
        as_text: bool,
    },
    /// Interprets a text value as JSON.
    JsonParse(Box<Expression>),
    /// Encodes a binary column into a string that can be embedded in JSON.
    EncodeBytes(Box<Expression>),
    /// `CAST(expr AS sql_type)`.
    Cast { expr: Box<Expression>, sql_type: String },
    /// Any other function, written as `name(args..)`.
    Generic { name: String, args: Vec<Expression> },
}

pub fn count_all() -> Function {
    Function::Count(None)
}

pub fn count<E: Into<Expression>>(expr: E) -> Function {
    Function::Count(Some(Box::new(expr.into())))
}

pub fn sum<E: Into<Expression>>(expr: E) -> Function {
    Function::Sum(Box::new(expr.into()))
}

pub fn avg<E: Into<Expression>>(expr: E) -> Function {
    Function::Avg(Box::new(expr.into()))
}

pub fn min<E: Into<Expression>>(expr: E) -> Function {
    Function::Min(Box::new(expr.into()))
}

pub fn max<E: Into<Expression>>(expr: E) -> Function {
    Function::Max(Box::new(expr.into()))
}

pub fn coalesce<I, E>(exprs: I) -> Function
where
    I: IntoIterator<Item = E>,
    E: Into<Expression>,
{
    Function::Coalesce(exprs.into_iter().map(Into::into).collect())
}

pub fn lower<E: Into<Expression>>(expr: E) -> Function {
    Function::Lower(Box::new(expr.into()))
}

pub fn json_object(pairs: Vec<(String, Expression)>) -> Function {
    Function::JsonObject(pairs)
}

pub fn json_array_agg<E: Into<Expression>>(expr: E) -> Function {
    Function::JsonArrayAgg(Box::new(expr.into()))
}

pub fn json_array_empty() -> Function {
    Function::JsonArrayEmpty
}

pub fn json_extract<E: Into<Expression>>(expr: E, path: Vec<String>, as_text: bool) -> Function {
    Function::JsonExtract {
        expr: Box::new(expr.into()),
        path,
        as_text,
    }
}

pub fn json_parse<E: Into<Expression>>(expr: E) -> Function {
    Function::JsonParse(Box::new(expr.into()))
}

pub fn encode_bytes<E: Into<Expression>>(expr: E) -> Function {
    Function::EncodeBytes(Box::new(expr.into()))
}

pub fn cast<E: Into<Expression>>(expr: E, sql_type: impl Into<String>) -> Function {
    Function::Cast {
        expr: Box::new(expr.into()),
        sql_type: sql_type.into(),
    }
}

pub fn generic_function(name: impl Into<String>, args: Vec<Expression>) -> Function {
    Function::Generic {
        name: name.into(),
        args,
    }
}
