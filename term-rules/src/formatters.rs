//! Rendering of collector contents.
//!
//! Formatters turn a [`CollectorSnapshot`] into text: structured JSON for
//! programs, or a human-readable summary for terminals and logs.
//!
//! # Examples
//!
//! ```rust
//! use term_rules::collector::ErrorCollector;
//! use term_rules::formatters::{HumanFormatter, ReportFormatter};
//!
//! let collector = ErrorCollector::new();
//! let output = HumanFormatter::new().format(&collector.snapshot()).unwrap();
//! assert!(output.contains("No violations"));
//! ```

use crate::core::{CollectorSnapshot, ExceptionRecord, Severity, ViolationReport};
use crate::prelude::*;
use serde_json::{json, Value};

/// Options controlling what a formatter includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    pub include_violations: bool,
    pub include_exceptions: bool,
    /// Include the rendered error chain of exceptions
    pub include_traces: bool,
    /// Maximum number of violations shown per report; `None` shows all
    pub max_violations: Option<usize>,
    /// Maximum number of row indices shown per violation; `None` shows all
    pub max_row_indices: Option<usize>,
    /// Colorize output (human formatter only)
    pub use_colors: bool,
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_violations: true,
            include_exceptions: true,
            include_traces: false,
            max_violations: None,
            max_row_indices: Some(20),
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Counts only.
    pub fn minimal() -> Self {
        Self {
            include_violations: false,
            include_exceptions: false,
            include_traces: false,
            max_violations: Some(0),
            max_row_indices: Some(0),
            use_colors: false,
            include_timestamps: false,
        }
    }

    pub fn detailed() -> Self {
        Self {
            include_violations: true,
            include_exceptions: true,
            include_traces: true,
            max_violations: None,
            max_row_indices: None,
            use_colors: true,
            include_timestamps: true,
        }
    }

    /// Bounded, uncolored output for CI logs.
    pub fn ci() -> Self {
        Self {
            include_violations: true,
            include_exceptions: true,
            include_traces: true,
            max_violations: Some(50),
            max_row_indices: Some(20),
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_violations(mut self, include: bool) -> Self {
        self.include_violations = include;
        self
    }

    pub fn with_exceptions(mut self, include: bool) -> Self {
        self.include_exceptions = include;
        self
    }

    pub fn with_max_violations(mut self, max: Option<usize>) -> Self {
        self.max_violations = max;
        self
    }

    pub fn with_max_row_indices(mut self, max: Option<usize>) -> Self {
        self.max_row_indices = max;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Renders collector snapshots.
///
/// # Examples
///
/// ```rust
/// use term_rules::core::CollectorSnapshot;
/// use term_rules::formatters::ReportFormatter;
///
/// struct CountFormatter;
///
/// impl ReportFormatter for CountFormatter {
///     fn format(&self, snapshot: &CollectorSnapshot) -> term_rules::prelude::Result<String> {
///         Ok(format!("{} violation(s)", snapshot.total_violations()))
///     }
/// }
///
/// assert_eq!(CountFormatter.format(&CollectorSnapshot::default()).unwrap(), "0 violation(s)");
/// ```
pub trait ReportFormatter {
    fn format(&self, snapshot: &CollectorSnapshot) -> Result<String>;

    /// Formats with explicit options. The default ignores them.
    fn format_with_config(
        &self,
        snapshot: &CollectorSnapshot,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(snapshot)
    }
}

/// Structured JSON output.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, snapshot: &CollectorSnapshot) -> Result<String> {
        self.format_with_config(snapshot, &self.config)
    }

    fn format_with_config(
        &self,
        snapshot: &CollectorSnapshot,
        config: &FormatterConfig,
    ) -> Result<String> {
        let value = filter_snapshot(snapshot, config)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }
}

fn filter_snapshot(snapshot: &CollectorSnapshot, config: &FormatterConfig) -> Result<Value> {
    let mut summary = json!({
        "reports": snapshot.violation_reports.len(),
        "violations": snapshot.total_violations(),
        "exceptions": snapshot.exceptions.len(),
        "has_critical": snapshot.has_critical(),
    });

    if config.include_violations {
        let reports = snapshot
            .violation_reports
            .iter()
            .map(|report| filter_report(report, config))
            .collect::<Result<Vec<_>>>()?;
        summary["violation_reports"] = Value::Array(reports);
    }

    if config.include_exceptions {
        let exceptions = snapshot
            .exceptions
            .iter()
            .map(|exception| -> Result<Value> {
                let mut value = serde_json::to_value(exception)?;
                if !config.include_traces {
                    if let Some(object) = value.as_object_mut() {
                        object.remove("trace");
                    }
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>>>()?;
        summary["exception_records"] = Value::Array(exceptions);
    }

    Ok(summary)
}

fn filter_report(report: &ViolationReport, config: &FormatterConfig) -> Result<Value> {
    let shown = limit(&report.violations, config.max_violations);
    let violations = shown
        .iter()
        .map(|violation| -> Result<Value> {
            let mut value = serde_json::to_value(violation)?;
            if let Some(max) = config.max_row_indices {
                if violation.row_indices.len() > max {
                    value["failing_row_indices"] = json!(&violation.row_indices[..max]);
                    value["truncated_rows"] = json!(violation.row_indices.len() - max);
                }
            }
            Ok(value)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut value = json!({
        "id": report.id,
        "name": report.name,
        "count": report.count,
        "violations": violations,
    });
    if config.include_timestamps {
        value["timestamp"] = json!(report.timestamp);
    }
    Ok(value)
}

/// Console-oriented summary.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, snapshot: &CollectorSnapshot) -> Result<String> {
        self.format_with_config(snapshot, &self.config)
    }

    fn format_with_config(
        &self,
        snapshot: &CollectorSnapshot,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut out = String::new();

        if snapshot.is_empty() {
            line(&mut out, paint(config, "32", "No violations or exceptions recorded"));
            return Ok(out);
        }

        let header = format!(
            "{} violation(s) in {} report(s), {} exception(s)",
            snapshot.total_violations(),
            snapshot.violation_reports.len(),
            snapshot.exceptions.len()
        );
        let color = if snapshot.has_critical() { "31" } else { "33" };
        line(&mut out, paint(config, color, &header));

        if config.include_violations {
            for report in &snapshot.violation_reports {
                write_report(&mut out, report, config);
            }
        }

        if config.include_exceptions && !snapshot.exceptions.is_empty() {
            line(&mut out, "");
            line(&mut out, "Exceptions:");
            for exception in &snapshot.exceptions {
                write_exception(&mut out, exception, config);
            }
        }

        Ok(out)
    }
}

fn write_report(out: &mut String, report: &ViolationReport, config: &FormatterConfig) {
    line(out, "");
    let mut heading = format!("Report #{} '{}': {} violation(s)", report.id, report.name, report.count);
    if config.include_timestamps {
        heading.push_str(&format!(" at {}", report.timestamp));
    }
    line(out, heading);

    let shown = limit(&report.violations, config.max_violations);
    for violation in shown {
        line(
            out,
            format!(
                "  {} [{}] {}",
                severity_tag(config, violation.severity),
                violation.column_names.join(", "),
                violation.title
            ),
        );
        line(out, format!("      {}", violation.message));
        if !violation.row_indices.is_empty() {
            let rows = limit(&violation.row_indices, config.max_row_indices);
            let mut text = rows
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if rows.len() < violation.row_indices.len() {
                text.push_str(&format!(
                    ", ... ({} more)",
                    violation.row_indices.len() - rows.len()
                ));
            }
            line(out, format!("      rows: {text}"));
        }
    }

    if shown.len() < report.violations.len() {
        line(
            out,
            format!(
                "  ... and {} more violation(s)",
                report.violations.len() - shown.len()
            ),
        );
    }
}

fn write_exception(out: &mut String, exception: &ExceptionRecord, config: &FormatterConfig) {
    line(
        out,
        format!(
            "  {} {}: {}",
            severity_tag(config, exception.severity),
            exception.kind,
            exception.message
        ),
    );
    if config.include_traces {
        for trace_line in exception.trace.lines() {
            line(out, format!("      {trace_line}"));
        }
    }
}

fn severity_tag(config: &FormatterConfig, severity: Severity) -> String {
    let color = match severity {
        Severity::Warning => "33",
        Severity::Error => "31",
        Severity::Critical => "1;31",
    };
    paint(config, color, &severity.as_str().to_uppercase())
}

fn paint(config: &FormatterConfig, color: &str, text: &str) -> String {
    if config.use_colors {
        format!("\x1b[{color}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn limit<T>(items: &[T], max: Option<usize>) -> &[T] {
    match max {
        Some(max) => &items[..items.len().min(max)],
        None => items,
    }
}

fn line(out: &mut String, text: impl AsRef<str>) {
    out.push_str(text.as_ref());
    out.push('\n');
}
