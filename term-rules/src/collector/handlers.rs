//! Conversion of runtime outcomes and errors into collector records.

use super::ErrorCollector;
use crate::core::{ExceptionRecord, Severity, ViolationRecord};
use crate::prelude::*;
use crate::runtime::{SchemaViolation, ViolationOrigin, ViolationSet};
use std::error::Error as StdError;
use tracing::{error, warn};

/// Translates a violation set into records, in order.
///
/// With `short_circuit` set, translation stops after the first critical
/// violation; that violation is still included.
pub fn violation_records(set: &ViolationSet, short_circuit: bool) -> Vec<ViolationRecord> {
    let mut records = Vec::with_capacity(set.len());
    for violation in &set.violations {
        let record = violation_record(set, violation);
        let critical = record.severity.is_critical();
        records.push(record);
        if short_circuit && critical {
            warn!(
                schema = %set.schema,
                skipped = set.len() - records.len(),
                "Critical violation found, skipping the rest of the batch"
            );
            break;
        }
    }
    records
}

fn violation_record(set: &ViolationSet, violation: &SchemaViolation) -> ViolationRecord {
    let (severity, title, message) = match &violation.origin {
        ViolationOrigin::Check(metadata) => (
            metadata.severity,
            metadata.name.clone(),
            metadata.message.clone(),
        ),
        ViolationOrigin::Structural => (
            Severity::default(),
            violation.reason.code().to_string(),
            violation.description.clone(),
        ),
    };

    let column_names = if violation.columns.is_empty() {
        vec![set.schema.clone()]
    } else {
        violation.columns.clone()
    };

    ViolationRecord {
        severity,
        message,
        title,
        column_names,
        row_indices: violation.failing_rows(),
        unique_key_columns: set.unique_key.clone(),
        reason: violation.reason.code().to_string(),
    }
}

/// Translates a violation set and appends it as one report.
///
/// Returns the id of the appended report.
pub fn record_violations(
    collector: &ErrorCollector,
    set: &ViolationSet,
    short_circuit: bool,
) -> usize {
    let records = violation_records(set, short_circuit);
    collector.append_violation_report(&set.schema, records)
}

/// Builds an exception record from an error.
///
/// The trace is the rendered error chain, one cause per line.
pub fn exception_record(err: &RuleError, severity: Severity) -> ExceptionRecord {
    let mut causes = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }

    let mut trace = format!("{}: {err}", err.kind());
    for cause in &causes {
        trace.push_str("\n  caused by: ");
        trace.push_str(cause);
    }

    ExceptionRecord {
        kind: err.kind().to_string(),
        message: err.to_string(),
        severity,
        trace,
        source: causes.last().cloned(),
        context: (!causes.is_empty()).then_some(causes),
    }
}

/// Records an error in the collector.
pub fn record_exception(collector: &ErrorCollector, err: &RuleError, severity: Severity) {
    error!(
        error.kind = err.kind(),
        error.severity = %severity,
        error = %err,
        "Recording exception"
    );
    collector.append_exception(exception_record(err, severity));
}
