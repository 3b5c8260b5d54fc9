//! Comparison operators for search conditions.

use decibel_rs_core::error::{DecibelError, DecibelResult};

use crate::value::Value;

/// A comparison operator usable in a field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Operator {
    /// Returns the default operator for a value: `In` for lists, `Equal`
    /// otherwise.
    #[must_use]
    pub const fn default_for(value: &Value) -> Self {
        if value.is_list() {
            Self::In
        } else {
            Self::Equal
        }
    }

    /// The SQL keyword or symbol for this operator.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// Renders `<column> <op> <placeholder>` SQL with bound parameters.
    ///
    /// `Equal`/`NotEqual` against `Null` render as `IS [NOT] NULL`. The set
    /// operators accept lists; an empty `IN` list renders the always-false
    /// literal `1 = 0` (and `NOT IN` the always-true `1 = 1`) so that an
    /// empty filter set behaves as "matches nothing" rather than failing.
    pub fn sql(self, column: &str, value: &Value) -> DecibelResult<(String, Vec<Value>)> {
        match self {
            Self::Equal if value.is_null() => Ok((format!("{column} IS NULL"), Vec::new())),
            Self::NotEqual if value.is_null() => {
                Ok((format!("{column} IS NOT NULL"), Vec::new()))
            }
            Self::In | Self::NotIn => {
                let items: Vec<Value> = match value {
                    Value::List(items) => items.clone(),
                    other => vec![other.clone()],
                };
                if items.is_empty() {
                    let literal = if self == Self::In { "1 = 0" } else { "1 = 1" };
                    return Ok((literal.to_string(), Vec::new()));
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                Ok((
                    format!("{column} {} ({placeholders})", self.symbol()),
                    items,
                ))
            }
            _ => {
                if value.is_list() {
                    return Err(DecibelError::InvalidParameterValue(format!(
                        "operator '{}' cannot be applied to a list value",
                        self.symbol()
                    )));
                }
                Ok((format!("{column} {} ?", self.symbol()), vec![value.clone()]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_operator() {
        assert_eq!(Operator::default_for(&Value::Int(1)), Operator::Equal);
        assert_eq!(
            Operator::default_for(&Value::List(vec![Value::Int(1)])),
            Operator::In
        );
    }

    #[test]
    fn test_equal_sql() {
        let (sql, params) = Operator::Equal
            .sql("\"t\".\"title\"", &Value::from("a"))
            .unwrap();
        assert_eq!(sql, "\"t\".\"title\" = ?");
        assert_eq!(params, vec![Value::from("a")]);
    }

    #[test]
    fn test_null_comparisons() {
        let (sql, params) = Operator::Equal.sql("\"t\".\"x\"", &Value::Null).unwrap();
        assert_eq!(sql, "\"t\".\"x\" IS NULL");
        assert!(params.is_empty());

        let (sql, _) = Operator::NotEqual.sql("\"t\".\"x\"", &Value::Null).unwrap();
        assert_eq!(sql, "\"t\".\"x\" IS NOT NULL");
    }

    #[test]
    fn test_in_sql() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let (sql, params) = Operator::In.sql("\"t\".\"id\"", &list).unwrap();
        assert_eq!(sql, "\"t\".\"id\" IN (?, ?, ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_in_wraps_scalar() {
        let (sql, params) = Operator::In.sql("\"t\".\"id\"", &Value::Int(1)).unwrap();
        assert_eq!(sql, "\"t\".\"id\" IN (?)");
        assert_eq!(params, vec![Value::Int(1)]);
    }

    #[test]
    fn test_empty_in_literals() {
        let empty = Value::List(vec![]);
        let (sql, _) = Operator::In.sql("\"t\".\"id\"", &empty).unwrap();
        assert_eq!(sql, "1 = 0");
        let (sql, _) = Operator::NotIn.sql("\"t\".\"id\"", &empty).unwrap();
        assert_eq!(sql, "1 = 1");
    }

    #[test]
    fn test_scalar_operator_rejects_list() {
        let list = Value::List(vec![Value::Int(1)]);
        let err = Operator::GreaterThan.sql("\"t\".\"n\"", &list).unwrap_err();
        assert!(matches!(err, DecibelError::InvalidParameterValue(_)));
    }

    #[test]
    fn test_range_operators() {
        for (op, sym) in [
            (Operator::GreaterThan, ">"),
            (Operator::GreaterThanOrEqual, ">="),
            (Operator::LessThan, "<"),
            (Operator::LessThanOrEqual, "<="),
        ] {
            let (sql, _) = op.sql("\"t\".\"n\"", &Value::Int(5)).unwrap();
            assert_eq!(sql, format!("\"t\".\"n\" {sym} ?"));
        }
    }
}
