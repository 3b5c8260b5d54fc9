//! The query-executor collaborator contract.
//!
//! The search engine never connects to a database itself. It compiles SQL and
//! hands it, together with bound parameters, to a [`QueryExecutor`]
//! implementation provided by the application. Results come back as [`Row`]
//! values keyed by the column aliases the compiler assigned.

use decibel_rs_core::error::{DecibelError, DecibelResult};
use indexmap::IndexMap;

use crate::value::Value;

/// A single result row, keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a row from an ordered list of `(alias, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            columns: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Sets a column value, replacing any existing value for the alias.
    pub fn set(&mut self, alias: impl Into<String>, value: Value) {
        self.columns.insert(alias.into(), value);
    }

    /// Returns the value for a column alias, if present.
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.columns.get(alias)
    }

    /// Returns the value for a column alias, treating a missing column as
    /// a malformed result set.
    pub fn require(&self, alias: &str) -> DecibelResult<&Value> {
        self.columns.get(alias).ok_or_else(|| DecibelError::QueryExecutionError {
            message: format!("result row is missing expected column '{alias}'"),
            sql: String::new(),
        })
    }

    /// Returns the integer value for a column alias.
    pub fn require_int(&self, alias: &str) -> DecibelResult<i64> {
        match self.require(alias)? {
            Value::Int(i) => Ok(*i),
            other => Err(DecibelError::QueryExecutionError {
                message: format!("column '{alias}' holds {other:?}, expected an integer"),
                sql: String::new(),
            }),
        }
    }

    /// Iterates over `(alias, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Executes compiled SQL against a database.
///
/// Implementations wrap a concrete driver (or, in tests, a canned result
/// set). Any driver-level failure must be surfaced as
/// [`DecibelError::QueryExecutionError`] so the search engine can apply its
/// degradation policy.
pub trait QueryExecutor {
    /// Executes a SELECT statement and returns all result rows.
    fn execute(&self, sql: &str, params: &[Value]) -> DecibelResult<Vec<Row>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_set_and_get() {
        let mut row = Row::new();
        row.set("id", Value::Int(7));
        assert_eq!(row.get("id"), Some(&Value::Int(7)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_row_from_pairs_preserves_order() {
        let row = Row::from_pairs([("id", Value::Int(1)), ("title", Value::from("a"))]);
        let aliases: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(aliases, vec!["id", "title"]);
    }

    #[test]
    fn test_row_require_missing_column() {
        let row = Row::new();
        let err = row.require("id").unwrap_err();
        assert!(matches!(err, DecibelError::QueryExecutionError { .. }));
    }

    #[test]
    fn test_row_require_int() {
        let row = Row::from_pairs([("id", Value::Int(42)), ("title", Value::from("a"))]);
        assert_eq!(row.require_int("id").unwrap(), 42);
        assert!(row.require_int("title").is_err());
    }

    #[test]
    fn test_row_len_and_empty() {
        let mut row = Row::new();
        assert!(row.is_empty());
        row.set("id", Value::Int(1));
        assert_eq!(row.len(), 1);
        assert!(!row.is_empty());
    }
}
