//! # decibel-rs-model
//!
//! The model layer of the decibel-rs framework: typed field metadata,
//! per-model definitions with inheritance, and a fluent search builder that
//! compiles filters, joins, sorting, grouping, and pagination into a single
//! SQL statement executed through a pluggable query executor.
//!
//! ## Modules
//!
//! - [`value`] - Backend-agnostic database values
//! - [`fields`] - Field metadata and validation
//! - [`definition`] - Per-model field/index/option registries
//! - [`registry`] - The process-wide definition registry
//! - [`instance`] - Model instances and the hydration factory contract
//! - [`executor`] - The query-executor collaborator contract
//! - [`cache`] - Search result caching
//! - [`search`] - The fluent search builder and query compiler
//!
//! ## Example
//!
//! ```no_run
//! use decibel_rs_model::definition::{Definition, ModelKind};
//! use decibel_rs_model::fields::{Field, FieldKind};
//! use decibel_rs_model::registry::DefinitionRegistry;
//!
//! fn declare(registry: &DefinitionRegistry) -> decibel_rs_core::DecibelResult<()> {
//!     let mut article = Definition::new("blog.Article", ModelKind::Standard)?;
//!     article.add_field(Field::new("title", FieldKind::Text).max_length(255))?;
//!     article.add_field(Field::new("published", FieldKind::Boolean))?;
//!     registry.register(article)?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod definition;
pub mod executor;
pub mod fields;
pub mod instance;
pub mod registry;
pub mod search;
pub mod value;

pub use cache::{MemoryResultCache, NullResultCache, ResultCache};
pub use definition::{ColumnSchema, Definition, Index, IndexKind, ModelKind, TableSchema};
pub use executor::{QueryExecutor, Row};
pub use fields::{Field, FieldKind, LinkIntegrity, ValidationResult};
pub use instance::{InMemoryModelFactory, ModelFactory, ModelInstance};
pub use registry::DefinitionRegistry;
pub use search::{
    Aggregate, FieldCondition, FieldRow, FieldSelect, GroupCriteria, IgnoreCondition, Join,
    JoinType, ModelSearch, Operator, OrCondition, Page, ReturnMode, SearchCondition, SearchEnv,
    SelectedValue, SortCriteria, SortOrder,
};
pub use value::Value;
