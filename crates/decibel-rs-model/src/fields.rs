//! Field metadata: the typed description of one persistent model attribute.
//!
//! A [`Field`] knows its storage kind, validation rules, default value, and
//! how to render itself into SQL fragments (select expression, condition
//! expression, link-table name). Fields are pure metadata; they never touch
//! the database themselves.

use decibel_rs_core::error::{DecibelError, DecibelResult};
use serde::{Deserialize, Serialize};

use crate::search::operator::Operator;
use crate::value::Value;

/// Referential-integrity policy for relational fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkIntegrity {
    /// Deleting the target cascades to the referencing rows.
    Cascade,
    /// No automatic action.
    None,
}

/// The semantic storage kind of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// The auto-incrementing primary id. Added automatically to every
    /// definition; never declared by application code.
    Id,
    /// UTF-8 text, optionally length-limited.
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    /// A globally unique identifier.
    Guid,
    /// A closed set of string choices.
    Enum { choices: Vec<String> },
    /// A many-to-one link to another model. Stored as an integer id column
    /// named `<field>_id` on the owning table.
    LinkedObject {
        target: String,
        integrity: LinkIntegrity,
    },
    /// A one-to-many link to another model. Stored in a separate link table
    /// with `source_id`/`value_id` columns; the owning table has no column.
    LinkedObjects {
        target: String,
        integrity: LinkIntegrity,
    },
}

impl FieldKind {
    /// A short kind name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Guid => "guid",
            Self::Enum { .. } => "enum",
            Self::LinkedObject { .. } => "linked_object",
            Self::LinkedObjects { .. } => "linked_objects",
        }
    }
}

/// The outcome of validating one value against a field's rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<String>,
}

impl ValidationResult {
    /// A passing result with no errors.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Records a validation failure.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Returns `true` if no errors were recorded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The recorded error messages.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Metadata for one persistent model attribute.
///
/// Built with a chainable constructor, mirroring how definitions declare
/// fields:
///
/// ```
/// use decibel_rs_model::fields::{Field, FieldKind};
///
/// let field = Field::new("title", FieldKind::Text)
///     .max_length(255)
///     .exportable(true);
/// assert_eq!(field.name(), "title");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    #[serde(flatten)]
    kind: FieldKind,
    /// The physical table holding this field's column. Set when the field is
    /// registered on a definition; inherited fields keep the declaring
    /// ancestor's table.
    #[serde(default)]
    table: String,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    exportable: bool,
    #[serde(default)]
    randomisable: bool,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    null_label: Option<String>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    default: Option<Value>,
}

impl Field {
    /// Creates a field with the given name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            table: String::new(),
            read_only: false,
            exportable: false,
            randomisable: false,
            nullable: false,
            null_label: None,
            max_length: None,
            default: None,
        }
    }

    /// Shorthand for a many-to-one link field.
    #[must_use]
    pub fn linked_object(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::LinkedObject {
                target: target.into(),
                integrity: LinkIntegrity::None,
            },
        )
    }

    /// Shorthand for a one-to-many link field.
    #[must_use]
    pub fn linked_objects(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::LinkedObjects {
                target: target.into(),
                integrity: LinkIntegrity::None,
            },
        )
    }

    // ── Chainable configuration ────────────────────────────────────────

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub const fn exportable(mut self, exportable: bool) -> Self {
        self.exportable = exportable;
        self
    }

    #[must_use]
    pub const fn randomisable(mut self, randomisable: bool) -> Self {
        self.randomisable = randomisable;
        self
    }

    /// Marks the field nullable, with an optional human-readable label for
    /// the null option.
    #[must_use]
    pub fn nullable(mut self, null_label: Option<&str>) -> Self {
        self.nullable = true;
        self.null_label = null_label.map(str::to_string);
        self
    }

    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets the default value used when no value has been assigned.
    #[must_use]
    pub fn default_to(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the referential-integrity policy for relational fields. Has no
    /// effect on scalar kinds.
    #[must_use]
    pub fn integrity(mut self, policy: LinkIntegrity) -> Self {
        match &mut self.kind {
            FieldKind::LinkedObject { integrity, .. }
            | FieldKind::LinkedObjects { integrity, .. } => *integrity = policy,
            _ => {}
        }
        self
    }

    // ── Accessors ──────────────────────────────────────────────────────

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn set_table(&mut self, table: &str) {
        if self.table.is_empty() {
            self.table = table.to_string();
        }
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub const fn is_exportable(&self) -> bool {
        self.exportable
    }

    #[must_use]
    pub const fn is_randomisable(&self) -> bool {
        self.randomisable
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn null_label(&self) -> Option<&str> {
        self.null_label.as_deref()
    }

    /// Returns `true` for both relational kinds.
    #[must_use]
    pub const fn is_relational(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::LinkedObject { .. } | FieldKind::LinkedObjects { .. }
        )
    }

    /// Returns `true` for one-to-many links, which cannot be sorted or
    /// grouped by and need per-occurrence join aliases.
    #[must_use]
    pub const fn is_multi_valued(&self) -> bool {
        matches!(self.kind, FieldKind::LinkedObjects { .. })
    }

    /// The qualified name of the linked model, for relational kinds.
    #[must_use]
    pub fn link_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::LinkedObject { target, .. }
            | FieldKind::LinkedObjects { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }

    /// Returns `true` when this field auto-increments (the primary id).
    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        matches!(self.kind, FieldKind::Id)
    }

    // ── SQL rendering ──────────────────────────────────────────────────

    /// The column name in the owning table, or `None` for one-to-many links
    /// (which store no column on the owning table).
    #[must_use]
    pub fn column_name(&self) -> Option<String> {
        match &self.kind {
            FieldKind::Id => Some("id".to_string()),
            FieldKind::LinkedObject { .. } => Some(format!("{}_id", self.name)),
            FieldKind::LinkedObjects { .. } => None,
            _ => Some(self.name.clone()),
        }
    }

    /// The column conditions and selects compare against. For one-to-many
    /// links this is the link table's `value_id` column; callers must pair it
    /// with the link-table alias.
    #[must_use]
    pub fn condition_column(&self) -> String {
        match &self.kind {
            FieldKind::LinkedObjects { .. } => "value_id".to_string(),
            _ => self.column_name().unwrap_or_else(|| self.name.clone()),
        }
    }

    /// Renders the qualified select expression for this field under the
    /// given table alias.
    #[must_use]
    pub fn select_sql(&self, table_alias: &str) -> String {
        format!("\"{table_alias}\".\"{}\"", self.condition_column())
    }

    /// Renders a conditional expression against this field.
    pub fn conditional_sql(
        &self,
        table_alias: &str,
        operator: Operator,
        value: &Value,
    ) -> DecibelResult<(String, Vec<Value>)> {
        operator.sql(&self.select_sql(table_alias), value)
    }

    /// The link table holding rows of a one-to-many field, named after the
    /// owning table and the field.
    #[must_use]
    pub fn link_table(&self, owning_table: &str) -> Option<String> {
        match &self.kind {
            FieldKind::LinkedObjects { .. } => Some(format!("{owning_table}_{}", self.name)),
            _ => None,
        }
    }

    /// The SQL column type for schema generation, or `None` when the field
    /// stores no column on the owning table.
    #[must_use]
    pub fn sql_type(&self) -> Option<String> {
        match &self.kind {
            FieldKind::Id => Some("BIGINT PRIMARY KEY AUTO_INCREMENT".to_string()),
            FieldKind::Text => Some(
                self.max_length
                    .map_or_else(|| "TEXT".to_string(), |n| format!("VARCHAR({n})")),
            ),
            FieldKind::Integer => Some("BIGINT".to_string()),
            FieldKind::Float => Some("DOUBLE PRECISION".to_string()),
            FieldKind::Boolean => Some("BOOLEAN".to_string()),
            FieldKind::Date => Some("DATE".to_string()),
            FieldKind::DateTime => Some("TIMESTAMP".to_string()),
            FieldKind::Guid => Some("CHAR(36)".to_string()),
            FieldKind::Enum { .. } => Some("VARCHAR(255)".to_string()),
            FieldKind::LinkedObject { .. } => Some("BIGINT".to_string()),
            FieldKind::LinkedObjects { .. } => None,
        }
    }

    // ── Value conversion ───────────────────────────────────────────────

    /// Converts an application-level value to its storage representation.
    ///
    /// Relational values normalize to integer ids (lists element-wise);
    /// everything else passes through after a type check.
    pub fn serialize(&self, value: &Value) -> DecibelResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match &self.kind {
            FieldKind::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                other => Err(DecibelError::InvalidParameterValue(format!(
                    "field '{}' expects a boolean, got {other:?}",
                    self.name
                ))),
            },
            FieldKind::LinkedObject { .. } => match value {
                Value::Int(_) => Ok(value.clone()),
                other => Err(DecibelError::InvalidParameterValue(format!(
                    "field '{}' expects a model id, got {other:?}",
                    self.name
                ))),
            },
            FieldKind::LinkedObjects { .. } => match value {
                Value::Int(_) => Ok(value.clone()),
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Int(_) => out.push(item.clone()),
                            other => {
                                return Err(DecibelError::InvalidParameterValue(format!(
                                    "field '{}' expects model ids, got {other:?}",
                                    self.name
                                )))
                            }
                        }
                    }
                    Ok(Value::List(out))
                }
                other => Err(DecibelError::InvalidParameterValue(format!(
                    "field '{}' expects model ids, got {other:?}",
                    self.name
                ))),
            },
            _ => Ok(value.clone()),
        }
    }

    /// Converts a storage-level value back to its application representation.
    #[must_use]
    pub fn unserialize(&self, raw: &Value) -> Value {
        match (&self.kind, raw) {
            (FieldKind::Boolean, Value::Int(i)) => Value::Bool(*i != 0),
            _ => raw.clone(),
        }
    }

    /// Renders a storage-level value as a human-readable string.
    #[must_use]
    pub fn text_value(&self, raw: &Value) -> String {
        if matches!(self.kind, FieldKind::Boolean) {
            let truthy = match raw {
                Value::Bool(b) => Some(*b),
                Value::Int(i) => Some(*i != 0),
                _ => None,
            };
            if let Some(truthy) = truthy {
                return if truthy { "Yes" } else { "No" }.to_string();
            }
        }
        match raw {
            Value::Null => self.null_label.clone().unwrap_or_default(),
            other => other.to_string(),
        }
    }

    /// The value used when no value has been assigned: the configured
    /// default, `Null` for nullable fields, or the kind's zero value.
    #[must_use]
    pub fn default_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        if self.nullable {
            return Value::Null;
        }
        match &self.kind {
            FieldKind::Text | FieldKind::Guid => Value::String(String::new()),
            FieldKind::Id | FieldKind::Integer | FieldKind::LinkedObject { .. } => Value::Int(0),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::Boolean => Value::Bool(false),
            FieldKind::LinkedObjects { .. } => Value::List(Vec::new()),
            FieldKind::Enum { choices } => choices
                .first()
                .map_or(Value::Null, |c| Value::String(c.clone())),
            FieldKind::Date | FieldKind::DateTime => Value::Null,
        }
    }

    /// Validates a value against the field's rules.
    #[must_use]
    pub fn check_value(&self, value: &Value) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if value.is_null() {
            if !self.nullable {
                result.add_error(format!("field '{}' cannot be null", self.name));
            }
            return result;
        }
        match &self.kind {
            FieldKind::Text | FieldKind::Guid => match value {
                Value::String(s) => {
                    if let Some(max) = self.max_length {
                        if s.chars().count() > max {
                            result.add_error(format!(
                                "field '{}' exceeds maximum length {max}",
                                self.name
                            ));
                        }
                    }
                }
                other => result.add_error(format!(
                    "field '{}' expects text, got {other:?}",
                    self.name
                )),
            },
            FieldKind::Id | FieldKind::Integer | FieldKind::LinkedObject { .. } => {
                if !matches!(value, Value::Int(_)) {
                    result.add_error(format!(
                        "field '{}' expects an integer, got {value:?}",
                        self.name
                    ));
                }
            }
            FieldKind::Float => {
                if !matches!(value, Value::Float(_) | Value::Int(_)) {
                    result.add_error(format!(
                        "field '{}' expects a number, got {value:?}",
                        self.name
                    ));
                }
            }
            FieldKind::Boolean => {
                if !matches!(value, Value::Bool(_) | Value::Int(0 | 1)) {
                    result.add_error(format!(
                        "field '{}' expects a boolean, got {value:?}",
                        self.name
                    ));
                }
            }
            FieldKind::Date => {
                if !matches!(value, Value::Date(_)) {
                    result.add_error(format!(
                        "field '{}' expects a date, got {value:?}",
                        self.name
                    ));
                }
            }
            FieldKind::DateTime => {
                if !matches!(value, Value::DateTime(_)) {
                    result.add_error(format!(
                        "field '{}' expects a datetime, got {value:?}",
                        self.name
                    ));
                }
            }
            FieldKind::Enum { choices } => match value {
                Value::String(s) if choices.contains(s) => {}
                other => result.add_error(format!(
                    "field '{}' expects one of {choices:?}, got {other:?}",
                    self.name
                )),
            },
            FieldKind::LinkedObjects { .. } => match value {
                Value::List(items) => {
                    for item in items {
                        if !matches!(item, Value::Int(_)) {
                            result.add_error(format!(
                                "field '{}' expects model ids, got {item:?}",
                                self.name
                            ));
                        }
                    }
                }
                other => result.add_error(format!(
                    "field '{}' expects a list of model ids, got {other:?}",
                    self.name
                )),
            },
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builder() {
        let field = Field::new("title", FieldKind::Text)
            .max_length(255)
            .exportable(true)
            .nullable(Some("Untitled"));
        assert_eq!(field.name(), "title");
        assert!(field.is_nullable());
        assert_eq!(field.null_label(), Some("Untitled"));
        assert!(field.is_exportable());
    }

    #[test]
    fn test_column_names() {
        assert_eq!(
            Field::new("title", FieldKind::Text).column_name(),
            Some("title".to_string())
        );
        assert_eq!(
            Field::linked_object("author", "blog.User").column_name(),
            Some("author_id".to_string())
        );
        assert_eq!(Field::linked_objects("tags", "blog.Tag").column_name(), None);
        assert_eq!(
            Field::linked_objects("tags", "blog.Tag").condition_column(),
            "value_id"
        );
    }

    #[test]
    fn test_select_sql() {
        let field = Field::new("title", FieldKind::Text);
        assert_eq!(field.select_sql("blog_article"), "\"blog_article\".\"title\"");
        let field = Field::linked_object("author", "blog.User");
        assert_eq!(
            field.select_sql("blog_article"),
            "\"blog_article\".\"author_id\""
        );
    }

    #[test]
    fn test_conditional_sql() {
        let field = Field::new("published", FieldKind::Boolean);
        let (sql, params) = field
            .conditional_sql("blog_article", Operator::Equal, &Value::Bool(true))
            .unwrap();
        assert_eq!(sql, "\"blog_article\".\"published\" = ?");
        assert_eq!(params, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_link_table() {
        let field = Field::linked_objects("tags", "blog.Tag");
        assert_eq!(
            field.link_table("blog_article"),
            Some("blog_article_tags".to_string())
        );
        assert_eq!(Field::new("x", FieldKind::Text).link_table("t"), None);
    }

    #[test]
    fn test_relational_flags() {
        assert!(Field::linked_object("author", "blog.User").is_relational());
        assert!(!Field::linked_object("author", "blog.User").is_multi_valued());
        assert!(Field::linked_objects("tags", "blog.Tag").is_multi_valued());
        assert!(!Field::new("title", FieldKind::Text).is_relational());
    }

    #[test]
    fn test_serialize_linked_object() {
        let field = Field::linked_object("author", "blog.User");
        assert_eq!(field.serialize(&Value::Int(7)).unwrap(), Value::Int(7));
        assert!(field.serialize(&Value::from("x")).is_err());
        assert_eq!(field.serialize(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_unserialize_boolean() {
        let field = Field::new("published", FieldKind::Boolean);
        assert_eq!(field.unserialize(&Value::Int(1)), Value::Bool(true));
        assert_eq!(field.unserialize(&Value::Int(0)), Value::Bool(false));
        assert_eq!(field.unserialize(&Value::Bool(true)), Value::Bool(true));
    }

    #[test]
    fn test_text_value() {
        let field = Field::new("published", FieldKind::Boolean);
        assert_eq!(field.text_value(&Value::Bool(true)), "Yes");
        assert_eq!(field.text_value(&Value::Int(0)), "No");

        let field = Field::new("note", FieldKind::Text).nullable(Some("(none)"));
        assert_eq!(field.text_value(&Value::Null), "(none)");
        assert_eq!(field.text_value(&Value::from("hi")), "hi");
    }

    #[test]
    fn test_default_values() {
        assert_eq!(
            Field::new("title", FieldKind::Text).default_value(),
            Value::String(String::new())
        );
        assert_eq!(
            Field::new("count", FieldKind::Integer).default_value(),
            Value::Int(0)
        );
        assert_eq!(
            Field::new("note", FieldKind::Text)
                .nullable(None)
                .default_value(),
            Value::Null
        );
        assert_eq!(
            Field::new("title", FieldKind::Text)
                .default_to(Value::from("untitled"))
                .default_value(),
            Value::from("untitled")
        );
    }

    #[test]
    fn test_check_value_null() {
        let field = Field::new("title", FieldKind::Text);
        assert!(!field.check_value(&Value::Null).is_ok());
        let field = Field::new("title", FieldKind::Text).nullable(None);
        assert!(field.check_value(&Value::Null).is_ok());
    }

    #[test]
    fn test_check_value_max_length() {
        let field = Field::new("title", FieldKind::Text).max_length(3);
        assert!(field.check_value(&Value::from("abc")).is_ok());
        assert!(!field.check_value(&Value::from("abcd")).is_ok());
    }

    #[test]
    fn test_check_value_enum() {
        let field = Field::new(
            "status",
            FieldKind::Enum {
                choices: vec!["draft".to_string(), "published".to_string()],
            },
        );
        assert!(field.check_value(&Value::from("draft")).is_ok());
        assert!(!field.check_value(&Value::from("archived")).is_ok());
    }

    #[test]
    fn test_check_value_linked_objects() {
        let field = Field::linked_objects("tags", "blog.Tag");
        assert!(field
            .check_value(&Value::List(vec![Value::Int(1), Value::Int(2)]))
            .is_ok());
        assert!(!field.check_value(&Value::Int(1)).is_ok());
        assert!(!field
            .check_value(&Value::List(vec![Value::from("x")]))
            .is_ok());
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(
            Field::new("title", FieldKind::Text).max_length(100).sql_type(),
            Some("VARCHAR(100)".to_string())
        );
        assert_eq!(
            Field::new("body", FieldKind::Text).sql_type(),
            Some("TEXT".to_string())
        );
        assert_eq!(Field::linked_objects("tags", "blog.Tag").sql_type(), None);
    }
}
