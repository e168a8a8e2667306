//! Validation result types.

use super::Severity;
use serde::{Deserialize, Serialize};

/// One failed check or structural rule, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub severity: Severity,
    pub message: String,
    pub title: String,
    /// Columns the violation applies to
    pub column_names: Vec<String>,
    /// Zero-based positions of the failing rows
    #[serde(rename = "failing_row_indices")]
    pub row_indices: Vec<usize>,
    /// The composite key of the schema, if any
    pub unique_key_columns: Vec<String>,
    /// Machine-readable reason code, e.g. `dataframe_check`
    pub reason: String,
}

impl ViolationRecord {
    pub fn failing_rows(&self) -> usize {
        self.row_indices.len()
    }
}

/// The violations found by one validation pass.
///
/// Reports are immutable once appended; `id` is the collector's violation
/// counter at the time of the append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub id: usize,
    /// Name of the schema that was validated
    pub name: String,
    pub violations: Vec<ViolationRecord>,
    pub count: usize,
    /// When the report was appended (RFC 3339)
    pub timestamp: String,
}

impl ViolationReport {
    pub fn new(id: usize, name: impl Into<String>, violations: Vec<ViolationRecord>) -> Self {
        Self {
            id,
            name: name.into(),
            count: violations.len(),
            violations,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Returns true if any violation is at least `severity`.
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.severity.is_at_least(severity))
    }

    pub fn violations_by_severity(&self, severity: Severity) -> Vec<&ViolationRecord> {
        self.violations
            .iter()
            .filter(|violation| violation.severity == severity)
            .collect()
    }
}

/// An error captured instead of being returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    /// Stable kebab-case kind, e.g. `missing-key`
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    /// The rendered error chain
    pub trace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A point-in-time copy of everything a collector holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorSnapshot {
    pub violation_reports: Vec<ViolationReport>,
    pub exceptions: Vec<ExceptionRecord>,
}

impl CollectorSnapshot {
    pub fn is_empty(&self) -> bool {
        self.violation_reports.is_empty() && self.exceptions.is_empty()
    }

    /// Total number of violations across all reports.
    pub fn total_violations(&self) -> usize {
        self.violation_reports.iter().map(|report| report.count).sum()
    }

    /// Returns true if any exception or violation is critical.
    pub fn has_critical(&self) -> bool {
        self.exceptions
            .iter()
            .any(|exception| exception.severity.is_critical())
            || self
                .violation_reports
                .iter()
                .any(|report| report.has_severity(Severity::Critical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(severity: Severity, rows: Vec<usize>) -> ViolationRecord {
        ViolationRecord {
            severity,
            message: "m".to_string(),
            title: "t".to_string(),
            column_names: vec!["c".to_string()],
            row_indices: rows,
            unique_key_columns: vec![],
            reason: "dataframe_check".to_string(),
        }
    }

    #[test]
    fn test_report_counts() {
        let report = ViolationReport::new(
            3,
            "people",
            vec![record(Severity::Warning, vec![1]), record(Severity::Error, vec![2, 3])],
        );
        assert_eq!(report.id, 3);
        assert_eq!(report.count, 2);
        assert!(report.has_severity(Severity::Error));
        assert!(!report.has_severity(Severity::Critical));
        assert_eq!(report.violations_by_severity(Severity::Warning).len(), 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn test_record_serializes_row_indices() {
        let json = serde_json::to_value(record(Severity::Error, vec![4])).unwrap();
        assert_eq!(json["failing_row_indices"], serde_json::json!([4]));
        assert_eq!(json["severity"], "error");
    }

    #[test]
    fn test_snapshot_totals() {
        let snapshot = CollectorSnapshot {
            violation_reports: vec![
                ViolationReport::new(0, "a", vec![record(Severity::Error, vec![0])]),
                ViolationReport::new(1, "b", vec![record(Severity::Critical, vec![])]),
            ],
            exceptions: vec![],
        };
        assert_eq!(snapshot.total_violations(), 2);
        assert!(snapshot.has_critical());
        assert!(!snapshot.is_empty());
        assert!(CollectorSnapshot::default().is_empty());
    }
}
