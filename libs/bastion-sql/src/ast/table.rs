use super::{Column, Select};

/// An object that can be aliased.
pub trait Aliasable {
    type Target;

    /// Alias the object for usage elsewhere in the query.
    fn alias<T>(self, alias: T) -> Self::Target
    where
        T: Into<String>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableType {
    Table(String),
    /// A derived table, `(SELECT ...) AS alias`.
    Query(Box<Select>),
}

/// A table definition
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub typ: TableType,
    pub alias: Option<String>,
}

impl Table {
    /// The name of a physical table, `None` for derived tables.
    pub fn name(&self) -> Option<&str> {
        match &self.typ {
            TableType::Table(name) => Some(name.as_str()),
            TableType::Query(_) => None,
        }
    }

    pub fn alias_or_name(&self) -> Option<&str> {
        self.alias.as_deref().or_else(|| self.name())
    }

    /// A column qualified with this table's alias or name.
    pub fn column(&self, name: impl Into<String>) -> Column {
        Column::new(name).of(self)
    }
}

impl Aliasable for Table {
    type Target = Table;

    fn alias<T>(mut self, alias: T) -> Self::Target
    where
        T: Into<String>,
    {
        self.alias = Some(alias.into());
        self
    }
}

impl From<&str> for Table {
    fn from(s: &str) -> Table {
        Table {
            typ: TableType::Table(s.to_string()),
            alias: None,
        }
    }
}

impl From<&String> for Table {
    fn from(s: &String) -> Table {
        Table::from(s.as_str())
    }
}

impl From<String> for Table {
    fn from(s: String) -> Table {
        Table {
            typ: TableType::Table(s),
            alias: None,
        }
    }
}

impl From<Select> for Table {
    fn from(select: Select) -> Table {
        Table {
            typ: TableType::Query(Box::new(select)),
            alias: None,
        }
    }
}
