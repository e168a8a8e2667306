//! Error types for the Term rules engine.
//!
//! Every failure is represented by [`RuleError`]. Errors fall into three
//! categories (see [`ErrorCategory`]) so callers can tell a badly authored
//! configuration apart from invalid data and from the validator itself
//! breaking.

use crate::core::ViolationRecord;
use thiserror::Error;

/// Broad classification of a [`RuleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The rule configuration is malformed.
    Config,
    /// The data does not satisfy the schema.
    Violation,
    /// An unexpected failure while running the validation.
    Execution,
}

/// The main error type for the rules engine.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A required key is absent from the configuration.
    #[error("Missing the following key in config input: {path}")]
    MissingKey {
        /// Location of the missing key, e.g. `columns[0].data_type`
        path: String,
    },

    /// A configuration value has the wrong JSON type.
    #[error("Invalid config type at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// The configuration is well typed but structurally invalid.
    #[error("Invalid schema at '{path}': {reason}")]
    InvalidSchema { path: String, reason: String },

    /// A check references a predicate name the registry does not know.
    #[error("Unknown predicate '{name}'")]
    UnknownPredicate { name: String },

    /// The data violates the schema. Only surfaced when exception
    /// collection is disabled.
    #[error("Schema '{schema}' failed validation with {} violation(s)", records.len())]
    Violations {
        schema: String,
        records: Vec<ViolationRecord>,
    },

    /// A column could not be cast to its declared type.
    #[error("Invalid cast of column '{column}' to {target}: {source}")]
    InvalidCast {
        column: String,
        target: String,
        #[source]
        source: arrow::error::ArrowError,
    },

    /// Row data could not be turned into a table.
    #[error("Failed to build table: {0}")]
    TableConstruction(String),

    /// A referenced column does not exist in the table.
    #[error("Column '{column}' not found in table")]
    ColumnNotFound { column: String },

    /// A predicate failed while being evaluated.
    #[error("Predicate '{predicate}' failed: {message}")]
    Predicate { predicate: String, message: String },

    /// Error from DataFusion expression planning or evaluation.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, RuleError>`.
pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// Creates a missing key error.
    pub fn missing_key(path: impl Into<String>) -> Self {
        Self::MissingKey { path: path.into() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a schema validation error.
    pub fn invalid_schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a predicate evaluation error.
    pub fn predicate(predicate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Predicate {
            predicate: predicate.into(),
            message: message.into(),
        }
    }

    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RuleError::MissingKey { .. }
            | RuleError::TypeMismatch { .. }
            | RuleError::InvalidSchema { .. }
            | RuleError::UnknownPredicate { .. } => ErrorCategory::Config,
            RuleError::Violations { .. } => ErrorCategory::Violation,
            _ => ErrorCategory::Execution,
        }
    }

    /// Returns a stable, kebab-case identifier for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleError::MissingKey { .. } => "missing-key",
            RuleError::TypeMismatch { .. } => "type-mismatch",
            RuleError::InvalidSchema { .. } => "schema-validation",
            RuleError::UnknownPredicate { .. } => "unknown-predicate",
            RuleError::Violations { .. } => "schema-violations",
            RuleError::InvalidCast { .. } => "invalid-cast",
            RuleError::TableConstruction(_) => "table-construction",
            RuleError::ColumnNotFound { .. } => "column-not-found",
            RuleError::Predicate { .. } => "predicate-failure",
            RuleError::DataFusion(_) => "datafusion",
            RuleError::Arrow(_) => "arrow",
            RuleError::Io(_) => "io",
            RuleError::Json(_) => "json",
            RuleError::Internal(_) => "internal",
        }
    }

    /// Returns true for configuration-authoring mistakes.
    pub fn is_config_error(&self) -> bool {
        self.category() == ErrorCategory::Config
    }
}
