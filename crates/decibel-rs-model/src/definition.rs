//! Model definitions: the immutable-after-construction registry of fields,
//! indexes, options, and inheritance hierarchy for one model type.
//!
//! A [`Definition`] is built once per model qualified name and cached by the
//! [`DefinitionRegistry`](crate::registry::DefinitionRegistry) for the life
//! of the process. Structural mistakes (duplicate or reserved field names,
//! hierarchy mismatches) fail at build time; the model is unusable until the
//! declaring code is fixed.

use std::collections::HashMap;

use decibel_rs_core::error::{DecibelError, DecibelResult};
use indexmap::IndexMap;

use crate::fields::{Field, FieldKind};

/// Qualified name of the framework's root model. Standard models implicitly
/// join to its table for shared attributes (creation time, owner, GUID).
pub const ROOT_MODEL: &str = "decibel.Model";

/// Model property names that field names may not collide with.
const RESERVED_PROPERTIES: &[&str] = &[
    "id",
    "guid",
    "qualified_name",
    "definition",
    "fields",
    "original",
    "events",
    "options",
];

/// Reserved names that fields are nonetheless allowed to use.
const WHITELISTED_PROPERTIES: &[&str] = &["id", "guid", "qualified_name"];

/// The persistence shape of a model type.
///
/// Kind-specific behavior (join ordering, count SQL, default grouping) hangs
/// off this enum rather than a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// A full model: table-per-class inheritance joined to the shared root
    /// table. Searches deduplicate and group by id.
    Standard,
    /// A single-table model with no inheritance joins.
    Light,
    /// A child object attached to a parent model; its `parent` link target
    /// resolves through the `parent_model` definition option.
    Child,
}

impl ModelKind {
    /// Whether searches join the root model table and reorder hierarchy
    /// joins.
    #[must_use]
    pub const fn joins_hierarchy(self) -> bool {
        matches!(self, Self::Standard)
    }

    /// Whether searches deduplicate rows (DISTINCT / COUNT(DISTINCT id)).
    #[must_use]
    pub const fn deduplicates_rows(self) -> bool {
        matches!(self, Self::Standard)
    }
}

/// Index variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Standard,
    Unique,
    Primary,
}

/// A named database index over an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    kind: IndexKind,
    fields: Vec<String>,
}

impl Index {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: IndexKind, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            fields,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Renders the `CREATE INDEX` statement for this index on `table`.
    #[must_use]
    pub fn create_sql(&self, table: &str) -> String {
        let columns = self
            .fields
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let unique = match self.kind {
            IndexKind::Unique | IndexKind::Primary => "UNIQUE ",
            IndexKind::Standard => "",
        };
        format!(
            "CREATE {unique}INDEX \"{}\" ON \"{table}\" ({columns})",
            self.name
        )
    }
}

/// One column of a derived table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

/// The physical schema for a definition's own table, used for migration.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSchema>,
    pub indexes: Vec<Index>,
}

impl TableSchema {
    /// Renders the `CREATE TABLE` statement for this schema.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("\"{}\" {}{null}", c.name, c.sql_type)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE \"{}\" ({columns})", self.table)
    }
}

/// Field metadata, indexes, options, and hierarchy for one model type.
///
/// Insertion order of fields is declaration order and is preserved in all
/// iteration. The `id` field is registered automatically.
#[derive(Debug, Clone)]
pub struct Definition {
    qualified_name: String,
    kind: ModelKind,
    table_name: String,
    fields: IndexMap<String, Field>,
    indexes: IndexMap<String, Index>,
    /// Statically assigned option values.
    options: HashMap<String, serde_json::Value>,
    /// Declared option defaults, used when neither a static value nor a
    /// deployment override is present.
    option_defaults: HashMap<String, serde_json::Value>,
    /// Ancestor qualified names from the closest parent up to (but not
    /// including) the root model.
    hierarchy: Vec<String>,
}

impl Definition {
    /// Creates a definition for the given qualified name.
    ///
    /// The physical table name is derived from the qualified name
    /// (`blog.Article` becomes `blog_article`), and the auto-incrementing
    /// `id` field is registered immediately.
    pub fn new(qualified_name: impl Into<String>, kind: ModelKind) -> DecibelResult<Self> {
        let qualified_name = qualified_name.into();
        if qualified_name.is_empty() {
            return Err(DecibelError::InvalidParameterValue(
                "definition qualified name cannot be empty".to_string(),
            ));
        }
        let table_name = table_name_for(&qualified_name);
        let mut id_field = Field::new("id", FieldKind::Id).read_only();
        id_field.set_table(&table_name);
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), id_field);
        Ok(Self {
            qualified_name,
            kind,
            table_name,
            fields,
            indexes: IndexMap::new(),
            options: HashMap::new(),
            option_defaults: HashMap::new(),
            hierarchy: Vec::new(),
        })
    }

    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Ancestor qualified names, closest parent first, excluding the root.
    #[must_use]
    pub fn hierarchy(&self) -> &[String] {
        &self.hierarchy
    }

    /// Ancestor table names in hierarchy order.
    #[must_use]
    pub fn hierarchy_tables(&self) -> Vec<String> {
        self.hierarchy.iter().map(|qn| table_name_for(qn)).collect()
    }

    // ── Field registration ─────────────────────────────────────────────

    /// Registers a field declared by this model.
    ///
    /// Fails with `DuplicateFieldName` when the name is already registered,
    /// `ReservedFieldName` when it collides with a non-whitelisted model
    /// property, and `InvalidMethodCall` when the definition has no
    /// qualified name yet.
    pub fn add_field(&mut self, mut field: Field) -> DecibelResult<()> {
        if self.qualified_name.is_empty() {
            return Err(DecibelError::InvalidMethodCall(
                "fields cannot be added before the definition's qualified name is set".to_string(),
            ));
        }
        let name = field.name().to_string();
        if self.fields.contains_key(&name) {
            return Err(DecibelError::DuplicateFieldName(
                name,
                self.qualified_name.clone(),
            ));
        }
        if RESERVED_PROPERTIES.contains(&name.as_str())
            && !WHITELISTED_PROPERTIES.contains(&name.as_str())
        {
            return Err(DecibelError::ReservedFieldName(name));
        }
        field.set_table(&self.table_name);
        self.fields.insert(name, field);
        Ok(())
    }

    /// Registers an index. Keyed by name; a second index with the same name
    /// replaces the first (last write wins).
    pub fn add_index(&mut self, index: Index) {
        self.indexes.insert(index.name().to_string(), index);
    }

    /// Inherits fields, indexes, option defaults, and hierarchy from a
    /// parent definition. Must be called before declaring this model's own
    /// fields so that declaration order stays parent-first.
    ///
    /// Inherited fields keep the declaring ancestor's table, which is what
    /// drives table-per-class joins at search time.
    pub fn extend(&mut self, parent: &Self) -> DecibelResult<()> {
        for (name, field) in &parent.fields {
            if name == "id" {
                continue;
            }
            if self.fields.contains_key(name) {
                return Err(DecibelError::DuplicateFieldName(
                    name.clone(),
                    self.qualified_name.clone(),
                ));
            }
            self.fields.insert(name.clone(), field.clone());
        }
        for (name, index) in &parent.indexes {
            self.indexes
                .entry(name.clone())
                .or_insert_with(|| index.clone());
        }
        for (name, default) in &parent.option_defaults {
            self.option_defaults
                .entry(name.clone())
                .or_insert_with(|| default.clone());
        }
        self.hierarchy = std::iter::once(parent.qualified_name.clone())
            .chain(parent.hierarchy.iter().cloned())
            .collect();
        Ok(())
    }

    // ── Lookup ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    // ── Options ────────────────────────────────────────────────────────

    /// Assigns a static option value.
    pub fn set_option(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.options.insert(name.into(), value);
    }

    /// Declares an option's default value.
    pub fn declare_option(&mut self, name: impl Into<String>, default: serde_json::Value) {
        self.option_defaults.insert(name.into(), default);
    }

    /// The statically assigned value of an option, if any. Deployment
    /// overrides are resolved by the registry, which falls back to
    /// [`option_default`](Self::option_default).
    #[must_use]
    pub fn static_option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options.get(name)
    }

    /// The declared default of an option, if any.
    #[must_use]
    pub fn option_default(&self, name: &str) -> Option<&serde_json::Value> {
        self.option_defaults.get(name)
    }

    // ── Derived facts ──────────────────────────────────────────────────

    /// Returns `true` when values of the field are globally unique: the
    /// auto-incrementing id, or a field covered alone by a unique index.
    #[must_use]
    pub fn is_field_unique(&self, field_name: &str) -> bool {
        if self
            .fields
            .get(field_name)
            .is_some_and(Field::is_auto_increment)
        {
            return true;
        }
        self.indexes.values().any(|index| {
            matches!(index.kind(), IndexKind::Unique | IndexKind::Primary)
                && index.fields() == [field_name]
        })
    }

    /// Derives the physical schema of this definition's own table: columns
    /// for fields stored here (inherited fields live in ancestor tables) and
    /// indexes whose full column set is present.
    #[must_use]
    pub fn table_schema(&self) -> TableSchema {
        let columns: Vec<ColumnSchema> = self
            .fields
            .values()
            .filter(|f| f.table() == self.table_name)
            .filter_map(|f| {
                f.sql_type().and_then(|sql_type| {
                    f.column_name().map(|name| ColumnSchema {
                        name,
                        sql_type,
                        nullable: f.is_nullable(),
                    })
                })
            })
            .collect();
        let column_names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let indexes = self
            .indexes
            .values()
            .filter(|index| {
                index.fields().iter().all(|f| {
                    let column = self
                        .fields
                        .get(f)
                        .and_then(Field::column_name)
                        .unwrap_or_else(|| f.clone());
                    column_names.contains(&column.as_str())
                })
            })
            .cloned()
            .collect();
        TableSchema {
            table: self.table_name.clone(),
            columns,
            indexes,
        }
    }
}

/// Derives the physical table name from a model qualified name:
/// namespace separators become underscores and CamelCase words are
/// lowercased with underscore boundaries (`blog.NewsArticle` becomes
/// `blog_news_article`).
#[must_use]
pub fn table_name_for(qualified_name: &str) -> String {
    let mut out = String::with_capacity(qualified_name.len() + 4);
    let mut prev_lower = false;
    for ch in qualified_name.chars() {
        if ch == '.' {
            out.push('_');
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
