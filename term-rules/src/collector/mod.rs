//! Aggregation of violation reports and exception records.
//!
//! An [`ErrorCollector`] accumulates everything the validator observes across
//! calls until it is explicitly cleared. Validators receive their collector
//! by injection; [`ErrorCollector::global`] is the process-wide default.
//!
//! Violation reports are numbered with a running counter: the id of a report
//! is the number of violations appended before it.

pub mod handlers;

use crate::core::{CollectorSnapshot, ExceptionRecord, ViolationRecord, ViolationReport};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

static GLOBAL_COLLECTOR: Lazy<Arc<ErrorCollector>> = Lazy::new(|| Arc::new(ErrorCollector::new()));

#[derive(Debug, Default)]
struct CollectorState {
    reports: Vec<ViolationReport>,
    exceptions: Vec<ExceptionRecord>,
    counter: usize,
}

/// Thread-safe store of violation reports and exception records.
///
/// Every operation takes the internal lock once, so each append is atomic
/// with respect to the counter.
///
/// # Examples
///
/// ```rust
/// use term_rules::collector::ErrorCollector;
///
/// let collector = ErrorCollector::new();
/// assert_eq!(collector.append_violation_report("a", vec![]), 0);
/// assert!(collector.snapshot().violation_reports.len() == 1);
/// collector.clear();
/// assert!(collector.snapshot().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ErrorCollector {
    state: Mutex<CollectorState>,
}

impl ErrorCollector {
    /// Creates an empty, isolated collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide collector.
    pub fn global() -> Arc<ErrorCollector> {
        Arc::clone(&GLOBAL_COLLECTOR)
    }

    // A panic while holding the lock cannot leave the state half-written:
    // every mutation is a single push or counter update.
    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a report of `violations` for the schema `name`.
    ///
    /// Returns the id of the new report: the counter value before the
    /// append. The counter then advances by the number of violations.
    pub fn append_violation_report(&self, name: &str, violations: Vec<ViolationRecord>) -> usize {
        let mut state = self.lock();
        let id = state.counter;
        state.counter += violations.len();

        let report = ViolationReport::new(id, name, violations);
        debug!(
            report.id = id,
            report.name = %name,
            report.count = report.count,
            "Appended violation report"
        );
        state.reports.push(report);
        id
    }

    /// Appends an exception record. Exceptions do not take counter slots.
    pub fn append_exception(&self, record: ExceptionRecord) {
        debug!(exception.kind = %record.kind, exception.severity = %record.severity, "Appended exception");
        self.lock().exceptions.push(record);
    }

    /// Returns a copy of the current contents.
    pub fn snapshot(&self) -> CollectorSnapshot {
        let state = self.lock();
        CollectorSnapshot {
            violation_reports: state.reports.clone(),
            exceptions: state.exceptions.clone(),
        }
    }

    /// Removes all reports and exceptions and resets the counter.
    pub fn clear(&self) {
        *self.lock() = CollectorState::default();
    }

    /// The running violation counter.
    pub fn total_violations(&self) -> usize {
        self.lock().counter
    }

    pub fn report_count(&self) -> usize {
        self.lock().reports.len()
    }

    pub fn exception_count(&self) -> usize {
        self.lock().exceptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use std::thread;

    fn violations(n: usize) -> Vec<ViolationRecord> {
        (0..n)
            .map(|i| ViolationRecord {
                severity: Severity::Error,
                message: format!("violation {i}"),
                title: "Is not null".to_string(),
                column_names: vec!["c".to_string()],
                row_indices: vec![i],
                unique_key_columns: vec![],
                reason: "dataframe_check".to_string(),
            })
            .collect()
    }

    fn exception() -> ExceptionRecord {
        ExceptionRecord {
            kind: "missing-key".to_string(),
            message: "Missing the following key in config input: columns".to_string(),
            severity: Severity::Critical,
            trace: String::new(),
            context: None,
            source: None,
        }
    }

    #[test]
    fn test_ids_follow_counter() {
        let collector = ErrorCollector::new();
        assert_eq!(collector.append_violation_report("a", violations(2)), 0);
        assert_eq!(collector.append_violation_report("b", violations(3)), 2);
        assert_eq!(collector.append_violation_report("c", violations(0)), 5);
        assert_eq!(collector.total_violations(), 5);
        assert_eq!(collector.report_count(), 3);
    }

    #[test]
    fn test_exceptions_do_not_advance_counter() {
        let collector = ErrorCollector::new();
        collector.append_exception(exception());
        assert_eq!(collector.append_violation_report("a", violations(1)), 0);
        assert_eq!(collector.exception_count(), 1);
        assert_eq!(collector.snapshot().exceptions[0].kind, "missing-key");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let collector = ErrorCollector::new();
        collector.append_violation_report("a", violations(2));
        collector.append_exception(exception());

        collector.clear();
        let once = collector.snapshot();
        collector.clear();
        assert_eq!(collector.snapshot(), once);
        assert!(once.is_empty());
        assert_eq!(collector.append_violation_report("a", violations(1)), 0);
    }

    #[test]
    fn test_concurrent_appends_keep_counter_consistent() {
        let collector = Arc::new(ErrorCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for _ in 0..10 {
                        collector.append_violation_report("t", violations(2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(collector.total_violations(), 160);
        let mut ids: Vec<usize> = collector
            .snapshot()
            .violation_reports
            .iter()
            .map(|report| report.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..80).map(|i| i * 2).collect::<Vec<_>>());
    }
}
