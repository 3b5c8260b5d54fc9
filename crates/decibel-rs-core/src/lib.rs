//! # decibel-rs-core
//!
//! Core types, settings, and error taxonomy for the decibel-rs framework.
//! This crate has no dependency on the model layer and provides the
//! foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types, error classes, and the [`ErrorReporter`](error::ErrorReporter) contract
//! - [`settings`] - Deployment settings and global configuration
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;

// Re-export the most commonly used types at the crate root.
pub use error::{DecibelError, DecibelResult, ErrorClass, ErrorReporter, TracingErrorReporter};
pub use settings::{DatabaseSettings, Settings};
