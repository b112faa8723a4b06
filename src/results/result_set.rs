use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::row::{Row, index_columns};
use crate::types::Value;

/// Rows returned by a statement plus the statement's write outcome.
///
/// ```rust
/// use mysql_middleware::prelude::*;
///
/// let mut rs = ResultSet::with_columns(vec!["id".into(), "name".into()]);
/// rs.add_row_values(vec![Value::Int(1), Value::Text("alice".into())]);
/// rs.add_row_values(vec![Value::Int(2), Value::Text("bob".into())]);
///
/// assert_eq!(rs.value("name"), Some(&Value::Text("alice".into())));
/// assert_eq!(rs.column(0), vec![&Value::Int(1), &Value::Int(2)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<Row>,
    /// Rows changed by a write statement
    pub rows_affected: u64,
    /// Auto-increment id generated by an insert, when the server reported one
    pub last_insert_id: Option<u64>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Empty result set whose rows will carry `column_names`.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names: Arc::new(column_names),
            column_index,
            ..Self::default()
        }
    }

    /// Result of a write statement that returns no rows.
    #[must_use]
    pub fn affected(rows_affected: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
            ..Self::default()
        }
    }

    /// Add a row built from values in column order.
    pub fn add_row_values(&mut self, values: Vec<Value>) {
        self.results.push(Row::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        ));
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.results
    }

    /// First row, if any.
    #[must_use]
    pub fn one(&self) -> Option<&Row> {
        self.results.first()
    }

    /// Named column of the first row.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.one().and_then(|row| row.get(name))
    }

    /// Every row's value at column `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<&Value> {
        self.results
            .iter()
            .filter_map(|row| row.get_by_index(index))
            .collect()
    }

    /// First column rendered as key, second column as value.
    #[must_use]
    pub fn key_value(&self) -> BTreeMap<String, Value> {
        self.results
            .iter()
            .filter_map(|row| match (row.get_by_index(0), row.get_by_index(1)) {
                (Some(key), Some(value)) => Some((key.to_string(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Column-oriented view: column name to the values of every row.
    #[must_use]
    pub fn table(&self) -> HashMap<String, Vec<Value>> {
        let mut table: HashMap<String, Vec<Value>> = HashMap::new();
        for row in &self.results {
            for (column, value) in row.iter() {
                table.entry(column.to_string()).or_default().push(value.clone());
            }
        }
        table
    }

    /// Affected rows for writes, returned rows for reads.
    #[must_use]
    pub fn count(&self) -> u64 {
        if self.results.is_empty() {
            self.rows_affected
        } else {
            self.results.len() as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> ResultSet {
        let mut rs = ResultSet::with_columns(vec!["id".into(), "word".into()]);
        rs.add_row_values(vec![Value::Int(1), Value::Text("cat".into())]);
        rs.add_row_values(vec![Value::Int(2), Value::Text("dog".into())]);
        rs
    }

    #[test]
    fn key_value_pairs_first_two_columns() {
        let kv = words().key_value();
        assert_eq!(kv.get("1"), Some(&Value::Text("cat".into())));
        assert_eq!(kv.get("2"), Some(&Value::Text("dog".into())));
    }

    #[test]
    fn table_is_column_oriented() {
        let table = words().table();
        assert_eq!(table["word"], vec![Value::Text("cat".into()), Value::Text("dog".into())]);
    }

    #[test]
    fn count_prefers_rows_then_affected() {
        assert_eq!(words().count(), 2);
        assert_eq!(ResultSet::affected(3, Some(10)).count(), 3);
        assert_eq!(ResultSet::default().one(), None);
    }
}
