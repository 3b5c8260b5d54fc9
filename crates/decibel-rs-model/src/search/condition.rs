//! Search conditions: the WHERE/HAVING clause value objects.
//!
//! Each condition resolves its field chain against the search's definition,
//! requests any joins it needs, and renders a structured
//! [`ConditionSql`] fragment. Conditions added at the top level combine with
//! AND; [`OrCondition`] merges its children with OR while sharing one join
//! context, which is what distinguishes "has X or Y" from "has both X and Y"
//! across one-to-many joins.

use decibel_rs_core::error::{DecibelError, DecibelResult};

use crate::search::model_search::{JoinContext, ModelSearch};
use crate::search::operator::Operator;
use crate::search::select::Aggregate;
use crate::value::Value;

/// The structured SQL output of one condition: optional extra select
/// expressions, a WHERE fragment, and a HAVING fragment for aggregate-based
/// conditions.
#[derive(Debug, Clone, Default)]
pub struct ConditionSql {
    pub selects: Vec<String>,
    pub where_sql: Option<String>,
    pub where_params: Vec<Value>,
    pub having_sql: Option<String>,
    pub having_params: Vec<Value>,
}

/// A single comparison against one field (or field chain).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    chain: Vec<String>,
    value: Value,
    operator: Operator,
    aggregate: Option<Aggregate>,
}

impl FieldCondition {
    #[must_use]
    pub fn new(chain: Vec<String>, value: Value, operator: Operator) -> Self {
        Self {
            chain,
            value,
            operator,
            aggregate: None,
        }
    }

    /// A condition on an aggregate of the field, rendered into HAVING.
    #[must_use]
    pub fn aggregated(
        chain: Vec<String>,
        value: Value,
        operator: Operator,
        aggregate: Aggregate,
    ) -> Self {
        Self {
            chain,
            value,
            operator,
            aggregate: Some(aggregate),
        }
    }

    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    fn build(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<ConditionSql> {
        let resolved = search.resolve_chain(&self.chain, ctx)?;
        let expr = format!("\"{}\".\"{}\"", resolved.alias, resolved.column);
        // Values are stored-form before comparison; lists element-wise.
        let stored = match &self.value {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| resolved.field.serialize(item))
                    .collect::<DecibelResult<Vec<Value>>>()?,
            ),
            other => resolved.field.serialize(other)?,
        };
        let mut out = ConditionSql::default();
        match self.aggregate {
            Some(aggregate) => {
                let agg_expr = format!("{}({expr})", aggregate.sql_name());
                let (sql, params) = self.operator.sql(&agg_expr, &stored)?;
                out.selects.push(agg_expr);
                out.having_sql = Some(sql);
                out.having_params = params;
            }
            None => {
                let (sql, params) = self.operator.sql(&expr, &stored)?;
                out.where_sql = Some(sql);
                out.where_params = params;
            }
        }
        Ok(out)
    }
}

/// N sub-conditions merged with OR.
///
/// Children share the parent's join context, so two conditions on the same
/// one-to-many field reuse a single join alias.
#[derive(Debug, Clone, PartialEq)]
pub struct OrCondition {
    conditions: Vec<SearchCondition>,
}

impl OrCondition {
    #[must_use]
    pub fn new(conditions: Vec<SearchCondition>) -> Self {
        Self { conditions }
    }

    #[must_use]
    pub fn conditions(&self) -> &[SearchCondition] {
        &self.conditions
    }

    fn build(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<ConditionSql> {
        let mut merged = ConditionSql::default();
        let mut wheres = Vec::new();
        let mut havings = Vec::new();
        for condition in &self.conditions {
            let fragment = condition.condition(search, ctx)?;
            merged.selects.extend(fragment.selects);
            if let Some(sql) = fragment.where_sql {
                wheres.push(sql);
                merged.where_params.extend(fragment.where_params);
            }
            if let Some(sql) = fragment.having_sql {
                havings.push(sql);
                merged.having_params.extend(fragment.having_params);
            }
        }
        merged.where_sql = or_join(wheres);
        merged.having_sql = or_join(havings);
        Ok(merged)
    }
}

/// Parenthesizes only when more than one fragment is merged.
fn or_join(mut fragments: Vec<String>) -> Option<String> {
    match fragments.len() {
        0 => None,
        1 => fragments.pop(),
        _ => Some(format!("({})", fragments.join(" OR "))),
    }
}

/// Excludes a set of ids: `id NOT IN (...)`, with object references
/// normalized to their ids first.
#[derive(Debug, Clone, PartialEq)]
pub struct IgnoreCondition {
    ids: Vec<Value>,
}

impl IgnoreCondition {
    #[must_use]
    pub fn new(ids: Vec<Value>) -> Self {
        Self { ids }
    }

    fn build(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<ConditionSql> {
        for id in &self.ids {
            if !matches!(id, Value::Int(_)) {
                return Err(DecibelError::InvalidParameterValue(format!(
                    "ignored ids must be integers, got {id:?}"
                )));
            }
        }
        FieldCondition::new(
            vec!["id".to_string()],
            Value::List(self.ids.clone()),
            Operator::NotIn,
        )
        .build(search, ctx)
    }
}

/// Any condition addable to a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchCondition {
    Field(FieldCondition),
    Or(OrCondition),
    Ignore(IgnoreCondition),
}

impl SearchCondition {
    /// Resolves the condition against the search, requesting joins through
    /// the given context, and renders its SQL fragments.
    pub fn condition(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<ConditionSql> {
        match self {
            Self::Field(c) => c.build(search, ctx),
            Self::Or(c) => c.build(search, ctx),
            Self::Ignore(c) => c.build(search, ctx),
        }
    }
}

impl From<FieldCondition> for SearchCondition {
    fn from(c: FieldCondition) -> Self {
        Self::Field(c)
    }
}

impl From<OrCondition> for SearchCondition {
    fn from(c: OrCondition) -> Self {
        Self::Or(c)
    }
}

impl From<IgnoreCondition> for SearchCondition {
    fn from(c: IgnoreCondition) -> Self {
        Self::Ignore(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_join_fragments() {
        assert_eq!(or_join(vec![]), None);
        assert_eq!(or_join(vec!["a = ?".to_string()]), Some("a = ?".to_string()));
        assert_eq!(
            or_join(vec!["a = ?".to_string(), "b = ?".to_string()]),
            Some("(a = ? OR b = ?)".to_string())
        );
    }

    #[test]
    fn test_condition_conversions() {
        let field = FieldCondition::new(vec!["title".to_string()], Value::from("x"), Operator::Equal);
        let condition: SearchCondition = field.clone().into();
        assert!(matches!(condition, SearchCondition::Field(_)));

        let or: SearchCondition = OrCondition::new(vec![field.into()]).into();
        assert!(matches!(or, SearchCondition::Or(_)));
    }
}
