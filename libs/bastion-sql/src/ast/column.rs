use super::{Aliasable, Table};

/// A column definition.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Column {
    pub name: String,
    /// The table name or alias qualifying the column.
    pub table: Option<String>,
    pub alias: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Include the table name or alias in the column expression.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Qualifies the column with the alias (or name) of the given table.
    pub fn of(mut self, table: &Table) -> Self {
        self.table = table.alias_or_name().map(ToOwned::to_owned);
        self
    }
}

impl Aliasable for Column {
    type Target = Column;

    fn alias<T>(mut self, alias: T) -> Self::Target
    where
        T: Into<String>,
    {
        self.alias = Some(alias.into());
        self
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::new(name)
    }
}

impl From<(&str, &str)> for Column {
    fn from((table, name): (&str, &str)) -> Self {
        Column::new(name).table(table)
    }
}

impl From<(String, String)> for Column {
    fn from((table, name): (String, String)) -> Self {
        Column::new(name).table(table)
    }
}

impl From<(&String, &String)> for Column {
    fn from((table, name): (&String, &String)) -> Self {
        Column::new(name.as_str()).table(table.as_str())
    }
}
