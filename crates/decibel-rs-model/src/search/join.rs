//! Join clauses accumulated during search preparation.
//!
//! Joins are keyed by alias and deduplicated. Two joins may share an alias
//! only when they are identical; an alias collision with a different table or
//! ON clause is rejected rather than silently overwritten.

use crate::value::Value;

/// SQL join variants used by the search compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// One join clause, optionally carrying its own WHERE fragment.
///
/// The WHERE fragment supports joins that filter the joined rows beyond the
/// ON condition; it is appended to the statement's WHERE list together with
/// its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    table: String,
    alias: String,
    join_type: JoinType,
    on_sql: String,
    where_sql: Option<String>,
    where_params: Vec<Value>,
}

impl Join {
    /// Creates an inner join.
    #[must_use]
    pub fn inner(table: impl Into<String>, alias: impl Into<String>, on_sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            join_type: JoinType::Inner,
            on_sql: on_sql.into(),
            where_sql: None,
            where_params: Vec::new(),
        }
    }

    /// Creates a left join.
    #[must_use]
    pub fn left(table: impl Into<String>, alias: impl Into<String>, on_sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            join_type: JoinType::Left,
            on_sql: on_sql.into(),
            where_sql: None,
            where_params: Vec::new(),
        }
    }

    /// Attaches a WHERE fragment (with parameters) to this join.
    #[must_use]
    pub fn with_where(mut self, where_sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.where_sql = Some(where_sql.into());
        self.where_params = params;
        self
    }

    /// The joined table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The table alias, unique within one search.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The join's WHERE fragment, if any.
    #[must_use]
    pub fn where_sql(&self) -> Option<&str> {
        self.where_sql.as_deref()
    }

    /// Parameters bound by the WHERE fragment.
    #[must_use]
    pub fn where_params(&self) -> &[Value] {
        &self.where_params
    }

    /// Returns `true` if `other` describes the same join (same alias, table,
    /// type, and ON clause), making deduplication safe.
    #[must_use]
    pub fn is_duplicate_of(&self, other: &Self) -> bool {
        self.alias == other.alias
            && self.table == other.table
            && self.join_type == other.join_type
            && self.on_sql == other.on_sql
    }

    /// Renders the JOIN clause.
    #[must_use]
    pub fn sql(&self) -> String {
        if self.alias == self.table {
            format!("{} \"{}\" ON {}", self.join_type.keyword(), self.table, self.on_sql)
        } else {
            format!(
                "{} \"{}\" AS \"{}\" ON {}",
                self.join_type.keyword(),
                self.table,
                self.alias,
                self.on_sql
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_join_sql() {
        let join = Join::inner(
            "blog_user",
            "blog_article__author",
            "\"blog_article__author\".\"id\" = \"blog_article\".\"author_id\"",
        );
        assert_eq!(
            join.sql(),
            "INNER JOIN \"blog_user\" AS \"blog_article__author\" ON \
             \"blog_article__author\".\"id\" = \"blog_article\".\"author_id\""
        );
    }

    #[test]
    fn test_join_without_alias_rename() {
        let join = Join::inner("decibel_model", "decibel_model", "\"decibel_model\".\"id\" = \"t\".\"id\"");
        assert_eq!(
            join.sql(),
            "INNER JOIN \"decibel_model\" ON \"decibel_model\".\"id\" = \"t\".\"id\""
        );
    }

    #[test]
    fn test_left_join_sql() {
        let join = Join::left("tags", "t1", "\"t1\".\"source_id\" = \"a\".\"id\"");
        assert!(join.sql().starts_with("LEFT JOIN"));
    }

    #[test]
    fn test_duplicate_detection() {
        let a = Join::inner("t", "x", "\"x\".\"id\" = 1");
        let b = Join::inner("t", "x", "\"x\".\"id\" = 1");
        let c = Join::inner("t", "x", "\"x\".\"id\" = 2");
        assert!(a.is_duplicate_of(&b));
        assert!(!a.is_duplicate_of(&c));
    }

    #[test]
    fn test_join_where_fragment() {
        let join = Join::left("tags", "t1", "\"t1\".\"source_id\" = \"a\".\"id\"")
            .with_where("\"t1\".\"deleted\" = ?", vec![Value::Bool(false)]);
        assert_eq!(join.where_sql(), Some("\"t1\".\"deleted\" = ?"));
        assert_eq!(join.where_params(), &[Value::Bool(false)]);
    }
}
