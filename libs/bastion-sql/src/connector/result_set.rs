use crate::{
    ast::Value,
    error::{Error, ErrorKind},
};
use std::sync::Arc;

/// Encapsulates a set of results and their respective column names.
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    rows: Vec<Vec<Value>>,
    last_insert_id: Option<u64>,
    affected_rows: Option<u64>,
}

impl ResultSet {
    /// Creates a new instance, bound to the given column names and result rows.
    pub fn new(names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: Arc::new(names),
            rows,
            last_insert_id: None,
            affected_rows: None,
        }
    }

    pub(crate) fn set_last_insert_id(&mut self, id: u64) {
        self.last_insert_id = Some(id);
    }

    pub(crate) fn set_affected_rows(&mut self, count: u64) {
        self.affected_rows = Some(count);
    }

    /// Rows changed by a write statement run as a query.
    pub fn affected_rows(&self) -> Option<u64> {
        self.affected_rows
    }

    /// The last id inserted, if available. Only works on databases supporting
    /// the feature, and only for auto-incrementing integer ids.
    pub fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    /// An iterator of column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows in the `ResultSet`.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the `ResultSet` contains no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the first row of the `ResultSet`, or None if the set is empty.
    pub fn first(&self) -> Option<ResultRow> {
        self.rows.first().map(|values| ResultRow {
            columns: Arc::clone(&self.columns),
            values: values.clone(),
        })
    }

    /// Takes the first row if existing, otherwise returns error.
    pub fn into_single(self) -> crate::Result<ResultRow> {
        match self.into_iter().next() {
            Some(row) => Ok(row),
            None => Err(Error::builder(ErrorKind::conversion("Query returned no data")).build()),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRow;
    type IntoIter = ResultSetIterator;

    fn into_iter(self) -> Self::IntoIter {
        ResultSetIterator {
            columns: self.columns,
            internal_iterator: self.rows.into_iter(),
        }
    }
}

/// Thin iterator for ResultSet rows.
/// Might become lazy one day.
pub struct ResultSetIterator {
    columns: Arc<Vec<String>>,
    internal_iterator: std::vec::IntoIter<Vec<Value>>,
}

impl Iterator for ResultSetIterator {
    type Item = ResultRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.internal_iterator.next().map(|values| ResultRow {
            columns: Arc::clone(&self.columns),
            values,
        })
    }
}

/// An owned version of a `Row` in a `ResultSet`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl ResultRow {
    /// Get a value from a column by its name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from a column by its index.
    pub fn at(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Pairs of column name and value, in column order.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}
