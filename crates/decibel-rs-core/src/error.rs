//! Core error types for the decibel-rs framework.
//!
//! This module provides the [`DecibelError`] enum covering the four error
//! categories of the model layer: structural definition errors, call-contract
//! errors, data errors, and infrastructure errors. The category of an error
//! decides its propagation policy (see [`ErrorClass`]).

use thiserror::Error;

/// The primary error type for the decibel-rs model layer.
///
/// Variants are grouped by category; [`DecibelError::class`] returns the
/// category, which callers use to decide between propagation (structural and
/// call-contract errors are programmer errors) and absorption (data and
/// infrastructure errors degrade to empty results at the search boundary).
#[derive(Error, Debug)]
pub enum DecibelError {
    // ── Structural definition errors ─────────────────────────────────

    /// A field name was registered twice on the same definition.
    #[error("Duplicate field name '{0}' in definition for '{1}'")]
    DuplicateFieldName(String, String),

    /// A field name collides with a reserved model property.
    #[error("Field name '{0}' is reserved and cannot be redefined")]
    ReservedFieldName(String),

    /// A field kind cannot be used where it was requested.
    #[error("Unsupported field kind: {0}")]
    UnsupportedFieldType(String),

    /// The definition hierarchy does not mirror the model hierarchy.
    #[error("Invalid definition hierarchy for '{qualified_name}': {message}")]
    InvalidDefinitionHierarchy {
        /// The model whose definition failed the mirror check.
        qualified_name: String,
        /// What went wrong.
        message: String,
    },

    // ── Call-contract errors ─────────────────────────────────────────

    /// A parameter value violates the API contract (bad field name, bad sort
    /// order, non-unique key field, ...).
    #[error("Invalid parameter value: {0}")]
    InvalidParameterValue(String),

    /// A method was called at the wrong point of an object's lifecycle.
    #[error("Invalid method call: {0}")]
    InvalidMethodCall(String),

    /// A search was mutated after it had been prepared and executed.
    #[error("Search has already been executed and can no longer be modified")]
    SearchAlreadyExecuted,

    /// No definition is registered under the given qualified name.
    #[error("No definition registered for model '{0}'")]
    UnknownDefinition(String),

    // ── Data errors ──────────────────────────────────────────────────

    /// The id does not resolve to a live model instance.
    #[error("Unknown instance {id} of model '{qualified_name}'")]
    UnknownModelInstance {
        /// The model qualified name.
        qualified_name: String,
        /// The id that failed to resolve.
        id: i64,
    },

    // ── Infrastructure errors ────────────────────────────────────────

    /// Query execution against the database failed. Carries the offending
    /// SQL for diagnostics.
    #[error("Query execution failed: {message} (sql: {sql})")]
    QueryExecutionError {
        /// The driver-level failure message.
        message: String,
        /// The SQL statement that failed.
        sql: String,
    },
}

/// The propagation category of a [`DecibelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal at definition-build time; the model is unusable until fixed.
    Structural,
    /// Synchronous API misuse; propagates to the caller.
    Contract,
    /// Expected at runtime; handled (e.g. skip the id) where it occurs.
    Data,
    /// External-system failure; absorbed at the search boundary and
    /// reported, degrading reads to empty results.
    Infrastructure,
}

impl DecibelError {
    /// Returns the propagation category of this error.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::DuplicateFieldName(..)
            | Self::ReservedFieldName(_)
            | Self::UnsupportedFieldType(_)
            | Self::InvalidDefinitionHierarchy { .. } => ErrorClass::Structural,
            Self::InvalidParameterValue(_)
            | Self::InvalidMethodCall(_)
            | Self::SearchAlreadyExecuted
            | Self::UnknownDefinition(_) => ErrorClass::Contract,
            Self::UnknownModelInstance { .. } => ErrorClass::Data,
            Self::QueryExecutionError { .. } => ErrorClass::Infrastructure,
        }
    }
}

/// A convenience type alias for `Result<T, DecibelError>`.
pub type DecibelResult<T> = Result<T, DecibelError>;

/// Records errors for diagnostics without halting execution.
///
/// This is the "report" side of the catch-and-degrade policy: when a read
/// search hits an infrastructure error, the error is handed to the reporter
/// and the search returns an empty result instead of propagating.
pub trait ErrorReporter {
    /// Records the error. Must not panic or block indefinitely.
    fn report(&self, error: &DecibelError);
}

/// Default reporter that emits errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &DecibelError) {
        tracing::error!(error = %error, "model search error");
    }
}
