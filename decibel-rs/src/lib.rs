//! # decibel-rs
//!
//! A model/ORM framework for Rust: declare persistent model types with typed
//! fields, map them to relational tables, and query them through a fluent
//! search builder with caching, joins across inheritance hierarchies,
//! sorting, grouping, and pagination.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access; depend on the individual crates for finer-grained control.

/// Core types, settings, logging, and the error taxonomy.
pub use decibel_rs_core as core;

/// Field metadata, model definitions, and the search engine.
pub use decibel_rs_model as model;

pub use decibel_rs_core::{DecibelError, DecibelResult, ErrorClass};
pub use decibel_rs_model::{
    Definition, DefinitionRegistry, Field, FieldKind, ModelInstance, ModelKind, ModelSearch,
    SearchEnv, Value,
};

// Third-party crates re-exported so applications can stay on the versions
// this crate was built against.
pub use chrono;
pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;
