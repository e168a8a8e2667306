//! Compiled checks: an executable expression plus its reporting metadata.

use super::expression::{CheckExpression, CompiledExpr};
use super::Severity;
use crate::predicates::PredicateRegistry;
use crate::prelude::*;
use crate::table::Table;
use arrow::array::BooleanArray;
use serde_json::Value;
use std::collections::BTreeSet;

/// Reporting options attached to a check when it is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Display name; defaults to the expression title.
    pub name: Option<String>,
    pub severity: Severity,
    /// Failure message; defaults to the expression message.
    pub message: Option<String>,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Metadata describing a compiled check, independent of execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckMetadata {
    pub name: String,
    pub severity: Severity,
    pub message: String,
    pub args_summary: Value,
}

/// A check ready to run against a table.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_rules::core::{CheckOptions, CompiledCheck, Severity, SimpleCheck};
/// use term_rules::predicates::PredicateRegistry;
///
/// let check = CompiledCheck::new(
///     &SimpleCheck::named("is_less_than").with_values(vec![json!(150)]).into(),
///     CheckOptions::new().with_severity(Severity::Warning),
///     &PredicateRegistry::builtin(),
///     Some("age"),
/// )
/// .unwrap();
///
/// assert_eq!(check.name(), "Is less than");
/// assert_eq!(check.message(), "The column under validation is less than \"150\"");
/// ```
#[derive(Debug, Clone)]
pub struct CompiledCheck {
    metadata: CheckMetadata,
    expression: CompiledExpr,
    columns: BTreeSet<String>,
}

impl CompiledCheck {
    /// Compiles `expression` with the given options.
    ///
    /// `key` is the column the check is attached to, or `None` for a
    /// table-level check.
    pub fn new(
        expression: &CheckExpression,
        options: CheckOptions,
        registry: &PredicateRegistry,
        key: Option<&str>,
    ) -> Result<Self> {
        let compiled = expression.compile(registry, key)?;
        let columns = compiled.referenced_columns();

        let metadata = CheckMetadata {
            name: options.name.unwrap_or_else(|| expression.title()),
            severity: options.severity,
            message: options.message.unwrap_or_else(|| expression.message()),
            args_summary: expression.args_summary(),
        };

        Ok(Self {
            metadata,
            expression: compiled,
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn severity(&self) -> Severity {
        self.metadata.severity
    }

    pub fn message(&self) -> &str {
        &self.metadata.message
    }

    pub fn args_summary(&self) -> &Value {
        &self.metadata.args_summary
    }

    pub fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    pub fn expression(&self) -> &CompiledExpr {
        &self.expression
    }

    /// Every column the check reads.
    pub fn referenced_columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    /// Subject columns of the check, in first-seen order.
    pub fn subject_columns(&self) -> Vec<String> {
        self.expression.subject_columns()
    }

    /// True when the check reads nothing but `column`.
    pub fn is_confined_to(&self, column: &str) -> bool {
        self.columns.iter().all(|c| c == column)
    }

    /// Evaluates the check, returning one outcome per row.
    pub fn evaluate(&self, table: &Table) -> Result<BooleanArray> {
        self.expression.evaluate(table)
    }
}
