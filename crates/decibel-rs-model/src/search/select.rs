//! Field selects: which columns a search returns and in what shape.

use decibel_rs_core::error::DecibelResult;
use indexmap::IndexMap;

use crate::fields::Field;
use crate::instance::ModelInstance;
use crate::search::model_search::{JoinContext, ModelSearch};
use crate::value::Value;

/// SQL aggregate functions supported by field selects and aggregate
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Max,
    Min,
    Avg,
    Sum,
    Count,
    GroupConcat,
}

impl Aggregate {
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Avg => "AVG",
            Self::Sum => "SUM",
            Self::Count => "COUNT",
            Self::GroupConcat => "GROUP_CONCAT",
        }
    }
}

/// How a selected field value is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnMode {
    /// The raw storage value (e.g. a linked id).
    #[default]
    Serialized,
    /// The application value (e.g. a hydrated model instance).
    Unserialized,
    /// A human-readable string.
    Text,
}

impl ReturnMode {
    const fn cache_tag(self) -> &'static str {
        match self {
            Self::Serialized => "s",
            Self::Unserialized => "u",
            Self::Text => "t",
        }
    }
}

/// One included field of a search's result set.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelect {
    chain: Vec<String>,
    alias: Option<String>,
    aggregate: Option<Aggregate>,
    mode: ReturnMode,
}

impl FieldSelect {
    /// Selects a single field by name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            chain: vec![name.to_string()],
            alias: None,
            aggregate: None,
            mode: ReturnMode::Serialized,
        }
    }

    /// Selects through a chain of relational fields.
    #[must_use]
    pub fn chained(chain: Vec<String>) -> Self {
        Self {
            chain,
            alias: None,
            aggregate: None,
            mode: ReturnMode::Serialized,
        }
    }

    /// Applies an aggregate function.
    #[must_use]
    pub const fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Sets the return shape.
    #[must_use]
    pub const fn mode(mut self, mode: ReturnMode) -> Self {
        self.mode = mode;
        self
    }

    /// Overrides the output column name.
    #[must_use]
    pub fn aliased(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    #[must_use]
    pub const fn return_mode(&self) -> ReturnMode {
        self.mode
    }

    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        self.aggregate.is_some()
    }

    /// The name this select appears under in result rows: the explicit
    /// alias, or the chain joined with `__`.
    #[must_use]
    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.chain.join("__"))
    }

    /// The cache-id component for this select. Only non-default return
    /// modes and aggregates contribute beyond the name, keeping keys stable
    /// for plain selects.
    #[must_use]
    pub fn cache_id(&self) -> String {
        let mut id = self.output_name();
        if self.mode != ReturnMode::Serialized {
            id.push(':');
            id.push_str(self.mode.cache_tag());
        }
        if let Some(aggregate) = self.aggregate {
            id.push(':');
            id.push_str(aggregate.sql_name());
        }
        id
    }

    /// Resolves the chain, requests joins, and renders the full select
    /// expression with its output alias. Also returns the resolved field so
    /// the executor can convert values later.
    pub(crate) fn resolve(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<(String, Field)> {
        let resolved = search.resolve_chain(&self.chain, ctx)?;
        let mut expr = format!("\"{}\".\"{}\"", resolved.alias, resolved.column);
        if let Some(aggregate) = self.aggregate {
            expr = format!("{}({expr})", aggregate.sql_name());
        }
        Ok((format!("{expr} AS \"{}\"", self.output_name()), resolved.field))
    }
}

/// One converted value of a selected field.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectedValue {
    /// A scalar (or combined list) value.
    Value(Value),
    /// A hydrated instance, for unserialized linked-object selects.
    Instance(ModelInstance),
    /// Hydrated instances, for unserialized one-to-many selects.
    Instances(Vec<ModelInstance>),
}

/// One logical result row of a fields query, keyed by the search's key
/// field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub key: Value,
    pub values: IndexMap<String, SelectedValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name() {
        assert_eq!(FieldSelect::new("title").output_name(), "title");
        assert_eq!(
            FieldSelect::chained(vec!["author".to_string(), "name".to_string()]).output_name(),
            "author__name"
        );
        assert_eq!(
            FieldSelect::new("title").aliased("headline").output_name(),
            "headline"
        );
    }

    #[test]
    fn test_cache_id_defaults_to_name() {
        assert_eq!(FieldSelect::new("title").cache_id(), "title");
    }

    #[test]
    fn test_cache_id_includes_non_defaults() {
        let select = FieldSelect::new("title").mode(ReturnMode::Text);
        assert_eq!(select.cache_id(), "title:t");
        let select = FieldSelect::new("id").aggregate(Aggregate::Count);
        assert_eq!(select.cache_id(), "id:COUNT");
        let select = FieldSelect::new("author")
            .mode(ReturnMode::Unserialized)
            .aggregate(Aggregate::Max);
        assert_eq!(select.cache_id(), "author:u:MAX");
    }

    #[test]
    fn test_aggregate_sql_names() {
        assert_eq!(Aggregate::GroupConcat.sql_name(), "GROUP_CONCAT");
        assert_eq!(Aggregate::Count.sql_name(), "COUNT");
    }
}
