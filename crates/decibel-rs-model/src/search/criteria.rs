//! Sort and group criteria value objects.

use std::str::FromStr;

use decibel_rs_core::error::{DecibelError, DecibelResult};

use crate::search::model_search::{JoinContext, ModelSearch};

/// Sort direction. Parsing rejects anything other than `ASC`/`DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DecibelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Ascending),
            "DESC" => Ok(Self::Descending),
            other => Err(DecibelError::InvalidParameterValue(format!(
                "sort order must be ASC or DESC, got '{other}'"
            ))),
        }
    }
}

/// Sorts by one field (or field chain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCriteria {
    chain: Vec<String>,
}

impl SortCriteria {
    #[must_use]
    pub fn new(chain: Vec<String>) -> Self {
        Self { chain }
    }

    #[must_use]
    pub fn field(name: &str) -> Self {
        Self {
            chain: vec![name.to_string()],
        }
    }

    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Resolves the chain and renders the ORDER BY expression (without the
    /// direction keyword).
    pub fn criteria_sql(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<String> {
        let resolved = search.resolve_chain(&self.chain, ctx)?;
        Ok(format!("\"{}\".\"{}\"", resolved.alias, resolved.column))
    }
}

/// Groups by one field (or field chain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCriteria {
    chain: Vec<String>,
}

impl GroupCriteria {
    #[must_use]
    pub fn new(chain: Vec<String>) -> Self {
        Self { chain }
    }

    #[must_use]
    pub fn field(name: &str) -> Self {
        Self {
            chain: vec![name.to_string()],
        }
    }

    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Resolves the chain and renders the GROUP BY expression.
    pub fn criteria_sql(
        &self,
        search: &mut ModelSearch<'_>,
        ctx: &mut JoinContext,
    ) -> DecibelResult<String> {
        let resolved = search.resolve_chain(&self.chain, ctx)?;
        Ok(format!("\"{}\".\"{}\"", resolved.alias, resolved.column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert!(matches!(
            "SIDEWAYS".parse::<SortOrder>(),
            Err(DecibelError::InvalidParameterValue(_))
        ));
    }

    #[test]
    fn test_sort_order_sql() {
        assert_eq!(SortOrder::Ascending.sql(), "ASC");
        assert_eq!(SortOrder::Descending.sql(), "DESC");
    }

    #[test]
    fn test_criteria_equality() {
        assert_eq!(SortCriteria::field("title"), SortCriteria::field("title"));
        assert_ne!(SortCriteria::field("title"), SortCriteria::field("created"));
    }
}
