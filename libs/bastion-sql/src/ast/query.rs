use super::*;

/// A database query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Box<Select>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    /// A hand-written statement with its parameters.
    Raw(String, Vec<Value>),
}

impl Query {
    pub fn is_select(&self) -> bool {
        matches!(self, Query::Select(_))
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Query::Insert(_) | Query::Update(_) | Query::Delete(_))
    }

    /// Whether executing the query produces rows.
    pub fn returns_rows(&self) -> bool {
        match self {
            Query::Select(_) => true,
            Query::Insert(i) => i.returning.is_some(),
            Query::Update(u) => u.returning.is_some(),
            Query::Delete(d) => d.returning.is_some(),
            Query::Raw(sql, _) => {
                let sql = sql.trim_start().to_ascii_lowercase();
                sql.starts_with("select") || sql.starts_with("with") || sql.contains(" returning ")
            }
        }
    }

    /// A short tag for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Query::Select(_) => "select",
            Query::Insert(_) => "insert",
            Query::Update(_) => "update",
            Query::Delete(_) => "delete",
            Query::Raw(..) => "raw",
        }
    }
}

impl From<Select> for Query {
    fn from(sel: Select) -> Self {
        Query::Select(Box::new(sel))
    }
}

impl From<Insert> for Query {
    fn from(ins: Insert) -> Self {
        Query::Insert(Box::new(ins))
    }
}

impl From<Update> for Query {
    fn from(upd: Update) -> Self {
        Query::Update(Box::new(upd))
    }
}

impl From<Delete> for Query {
    fn from(del: Delete) -> Self {
        Query::Delete(Box::new(del))
    }
}
