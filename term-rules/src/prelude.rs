//! Prelude for commonly used types and traits in term-rules.

pub use crate::error::{ErrorCategory, Result, RuleError};
pub use crate::formatters::{FormatterConfig, ReportFormatter};
pub use crate::logging::LogConfig;
