//! The validation runtime: runs a built schema against a table.
//!
//! The runtime knows two evaluation strategies:
//!
//! - **Lazy**: each column is projected on its own and all of its checks run
//!   against that projection. This cannot serve a column check that reads
//!   other columns, in which case the runtime reports
//!   [`RuntimeOutcome::Unsupported`] before evaluating anything.
//! - **Eager**: every check runs individually against the full table.
//!
//! Both strategies report the same violations for a schema they can serve.

use crate::core::{BuiltColumn, BuiltSchema, CheckMetadata, CompiledCheck};
use crate::prelude::*;
use crate::table::{false_positions, Table};
use arrow::array::BooleanArray;
use arrow::compute::is_not_null;
use arrow::compute::kernels::boolean::not;
use std::fmt::{self, Debug};
use tracing::{debug, instrument};

/// The evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationMode {
    Lazy,
    Eager,
}

impl EvaluationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationMode::Lazy => "lazy",
            EvaluationMode::Eager => "eager",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a violation was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationReason {
    /// A required column is absent from the table.
    ColumnNotInDataframe,
    /// A non-nullable column holds nulls.
    SeriesContainsNulls,
    /// A unique column holds repeated values.
    SeriesContainsDuplicates,
    /// Rows repeat the schema's composite key.
    DuplicateKeys,
    /// A declared check failed.
    DataframeCheck,
}

impl ViolationReason {
    /// The reason code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            ViolationReason::ColumnNotInDataframe => "column_not_in_dataframe",
            ViolationReason::SeriesContainsNulls => "series_contains_nulls",
            ViolationReason::SeriesContainsDuplicates => "series_contains_duplicates",
            ViolationReason::DuplicateKeys => "duplicate_keys",
            ViolationReason::DataframeCheck => "dataframe_check",
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Where a violation comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationOrigin {
    /// A declared check, with its reporting metadata.
    Check(CheckMetadata),
    /// A structural constraint of the schema (presence, nullability,
    /// uniqueness).
    Structural,
}

/// One violation found by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub reason: ViolationReason,
    pub origin: ViolationOrigin,
    /// The offending column set; empty for table checks without subjects.
    pub columns: Vec<String>,
    /// Per-row outcome of the failed rule; `None` when the rule is not
    /// row-based.
    pub check_output: Option<BooleanArray>,
    pub description: String,
}

impl SchemaViolation {
    /// The check metadata, for violations raised by a declared check.
    pub fn metadata(&self) -> Option<&CheckMetadata> {
        match &self.origin {
            ViolationOrigin::Check(metadata) => Some(metadata),
            ViolationOrigin::Structural => None,
        }
    }

    /// Zero-based positions of the failing rows.
    pub fn failing_rows(&self) -> Vec<usize> {
        self.check_output
            .as_ref()
            .map(false_positions)
            .unwrap_or_default()
    }
}

/// Every violation of one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationSet {
    pub schema: String,
    pub unique_key: Vec<String>,
    pub violations: Vec<SchemaViolation>,
}

impl ViolationSet {
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

/// The result of running a schema against a table.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeOutcome {
    Valid,
    /// The requested mode cannot serve this schema; nothing was evaluated.
    Unsupported { reason: String },
    Invalid(ViolationSet),
}

impl RuntimeOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, RuntimeOutcome::Valid)
    }
}

/// Runs built schemas against tables.
pub trait ValidationRuntime: Debug + Send + Sync {
    fn validate(
        &self,
        schema: &BuiltSchema,
        table: &Table,
        mode: EvaluationMode,
    ) -> Result<RuntimeOutcome>;
}

/// The default runtime, evaluating checks with the table engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRuntime;

impl SchemaRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Finds the first column check the lazy strategy cannot serve.
    fn lazy_blocker(schema: &BuiltSchema, table: &Table) -> Option<String> {
        schema
            .columns
            .iter()
            .filter(|column| table.has_column(&column.name))
            .find_map(|column| {
                column
                    .checks
                    .iter()
                    .find(|check| !check.is_confined_to(&column.name))
                    .map(|check| {
                        format!(
                            "check '{}' on column '{}' reads columns {:?}",
                            check.name(),
                            column.name,
                            check.referenced_columns()
                        )
                    })
            })
    }

    fn validate_column(
        &self,
        column: &BuiltColumn,
        table: &Table,
        mode: EvaluationMode,
        out: &mut Vec<SchemaViolation>,
    ) -> Result<()> {
        if !table.has_column(&column.name) {
            if column.required {
                out.push(structural(
                    ViolationReason::ColumnNotInDataframe,
                    vec![column.name.clone()],
                    None,
                    format!("column '{}' not in dataframe", column.name),
                ));
            }
            return Ok(());
        }

        if !column.nullable {
            let mask = is_not_null(table.column(&column.name)?.as_ref())?;
            if has_failures(&mask) {
                out.push(structural(
                    ViolationReason::SeriesContainsNulls,
                    vec![column.name.clone()],
                    Some(mask),
                    format!("non-nullable column '{}' contains null values", column.name),
                ));
            }
        }

        if column.unique {
            let mask = not(&table.duplicated(std::slice::from_ref(&column.name))?)?;
            if has_failures(&mask) {
                out.push(structural(
                    ViolationReason::SeriesContainsDuplicates,
                    vec![column.name.clone()],
                    Some(mask),
                    format!("column '{}' contains duplicate values", column.name),
                ));
            }
        }

        if column.checks.is_empty() {
            return Ok(());
        }

        let projected;
        let target = match mode {
            EvaluationMode::Lazy => {
                projected = table.project(&[column.name.as_str()])?;
                &projected
            }
            EvaluationMode::Eager => table,
        };

        for check in &column.checks {
            if let Some(violation) = run_check(check, target, vec![column.name.clone()])? {
                out.push(violation);
            }
        }
        Ok(())
    }

    fn validate_unique_key(
        &self,
        schema: &BuiltSchema,
        table: &Table,
        out: &mut Vec<SchemaViolation>,
    ) -> Result<()> {
        if schema.unique_key.is_empty()
            || !schema.unique_key.iter().all(|name| table.has_column(name))
        {
            return Ok(());
        }

        let mask = not(&table.duplicated(&schema.unique_key)?)?;
        if has_failures(&mask) {
            out.push(structural(
                ViolationReason::DuplicateKeys,
                schema.unique_key.clone(),
                Some(mask),
                format!("columns {:?} not unique", schema.unique_key),
            ));
        }
        Ok(())
    }
}

impl ValidationRuntime for SchemaRuntime {
    #[instrument(skip(self, schema, table), fields(schema.name = %schema.name, table.rows = table.num_rows()))]
    fn validate(
        &self,
        schema: &BuiltSchema,
        table: &Table,
        mode: EvaluationMode,
    ) -> Result<RuntimeOutcome> {
        if mode == EvaluationMode::Lazy {
            if let Some(reason) = Self::lazy_blocker(schema, table) {
                debug!(%reason, "Lazy evaluation unsupported for schema");
                return Ok(RuntimeOutcome::Unsupported { reason });
            }
        }

        let mut violations = Vec::new();
        for column in &schema.columns {
            self.validate_column(column, table, mode, &mut violations)?;
        }
        self.validate_unique_key(schema, table, &mut violations)?;

        for check in &schema.checks {
            if let Some(violation) = run_check(check, table, check.subject_columns())? {
                violations.push(violation);
            }
        }

        debug!(
            mode = %mode,
            violations = violations.len(),
            checks = schema.check_count(),
            "Runtime evaluation finished"
        );

        if violations.is_empty() {
            Ok(RuntimeOutcome::Valid)
        } else {
            Ok(RuntimeOutcome::Invalid(ViolationSet {
                schema: schema.name.clone(),
                unique_key: schema.unique_key.clone(),
                violations,
            }))
        }
    }
}

/// Evaluates one check. A check reading columns absent from the table is
/// not evaluated; it yields a `column_not_in_dataframe` violation instead.
fn run_check(
    check: &CompiledCheck,
    table: &Table,
    columns: Vec<String>,
) -> Result<Option<SchemaViolation>> {
    let missing: Vec<String> = check
        .referenced_columns()
        .iter()
        .filter(|name| !table.has_column(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        debug!(check.name = %check.name(), ?missing, "Check reads missing columns, skipped");
        return Ok(Some(SchemaViolation {
            reason: ViolationReason::ColumnNotInDataframe,
            origin: ViolationOrigin::Check(check.metadata().clone()),
            columns,
            check_output: None,
            description: format!(
                "check '{}' reads columns {missing:?} not in dataframe",
                check.name()
            ),
        }));
    }

    let mask = check.evaluate(table)?;
    let failures = false_positions(&mask).len();
    if failures == 0 {
        return Ok(None);
    }

    debug!(check.name = %check.name(), failures, "Check failed");
    Ok(Some(SchemaViolation {
        reason: ViolationReason::DataframeCheck,
        origin: ViolationOrigin::Check(check.metadata().clone()),
        columns,
        check_output: Some(mask),
        description: format!("check '{}' failed for {failures} row(s)", check.name()),
    }))
}

fn structural(
    reason: ViolationReason,
    columns: Vec<String>,
    check_output: Option<BooleanArray>,
    description: String,
) -> SchemaViolation {
    SchemaViolation {
        reason,
        origin: ViolationOrigin::Structural,
        columns,
        check_output,
        description,
    }
}

fn has_failures(mask: &BooleanArray) -> bool {
    mask.iter().any(|value| value == Some(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CheckOptions, ColumnSpec, CompiledCheck, DataKind, Severity, SimpleCheck, TableSchema,
    };
    use crate::predicates::PredicateRegistry;
    use serde_json::json;

    fn check(name: &str, key: &str, values: Vec<serde_json::Value>) -> CompiledCheck {
        CompiledCheck::new(
            &SimpleCheck::named(name).with_values(values).into(),
            CheckOptions::default(),
            &PredicateRegistry::builtin(),
            Some(key),
        )
        .unwrap()
    }

    fn table(rows: serde_json::Value) -> Table {
        Table::from_rows(rows.as_object().unwrap()).unwrap()
    }

    fn invalid(outcome: RuntimeOutcome) -> ViolationSet {
        match outcome {
            RuntimeOutcome::Invalid(set) => set,
            other => panic!("expected violations, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_table() {
        let schema = TableSchema::new(
            "t",
            vec![ColumnSpec::new("a", DataKind::Integer).with_check(check(
                "is_greater_than",
                "a",
                vec![json!(0)],
            ))],
        )
        .unwrap()
        .build();

        let outcome = SchemaRuntime::new()
            .validate(&schema, &table(json!({"a": [1, 2]})), EvaluationMode::Lazy)
            .unwrap();
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_structural_violations_in_order() {
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnSpec::new("missing", DataKind::Integer),
                ColumnSpec::new("optional", DataKind::Integer).required(false),
                ColumnSpec::new("a", DataKind::Integer)
                    .nullable(false)
                    .unique(true),
            ],
        )
        .unwrap()
        .build();

        let set = invalid(
            SchemaRuntime::new()
                .validate(
                    &schema,
                    &table(json!({"a": [1, 1, null]})),
                    EvaluationMode::Eager,
                )
                .unwrap(),
        );

        let reasons: Vec<_> = set.violations.iter().map(|v| v.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ViolationReason::ColumnNotInDataframe,
                ViolationReason::SeriesContainsNulls,
                ViolationReason::SeriesContainsDuplicates,
            ]
        );
        assert!(set.violations[0].failing_rows().is_empty());
        assert_eq!(set.violations[1].failing_rows(), vec![2]);
        assert_eq!(set.violations[2].failing_rows(), vec![0, 1]);
        assert!(set.violations.iter().all(|v| v.metadata().is_none()));
    }

    #[test]
    fn test_check_violation_carries_metadata() {
        let warn = CompiledCheck::new(
            &SimpleCheck::named("is_in")
                .with_values(vec![json!("x"), json!("y")])
                .into(),
            CheckOptions::new().with_severity(Severity::Warning),
            &PredicateRegistry::builtin(),
            Some("code"),
        )
        .unwrap();
        let schema = TableSchema::new(
            "t",
            vec![ColumnSpec::new("code", DataKind::Varchar).with_check(warn)],
        )
        .unwrap()
        .build();

        let set = invalid(
            SchemaRuntime::new()
                .validate(
                    &schema,
                    &table(json!({"code": ["x", "z", "y", "w"]})),
                    EvaluationMode::Lazy,
                )
                .unwrap(),
        );
        assert_eq!(set.len(), 1);
        let violation = &set.violations[0];
        assert_eq!(violation.reason.code(), "dataframe_check");
        assert_eq!(violation.columns, vec!["code"]);
        assert_eq!(violation.failing_rows(), vec![1, 3]);
        assert_eq!(violation.metadata().unwrap().severity, Severity::Warning);
    }

    #[test]
    fn test_lazy_unsupported_for_cross_column_checks() {
        let cross = CompiledCheck::new(
            &SimpleCheck::named("is_less_than").with_columns(["end"]).into(),
            CheckOptions::default(),
            &PredicateRegistry::builtin(),
            Some("start"),
        )
        .unwrap();
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnSpec::new("start", DataKind::Integer).with_check(cross),
                ColumnSpec::new("end", DataKind::Integer),
            ],
        )
        .unwrap()
        .build();
        let data = table(json!({"start": [1, 5], "end": [2, 4]}));

        let lazy = SchemaRuntime::new()
            .validate(&schema, &data, EvaluationMode::Lazy)
            .unwrap();
        assert!(matches!(lazy, RuntimeOutcome::Unsupported { .. }));

        let eager = invalid(
            SchemaRuntime::new()
                .validate(&schema, &data, EvaluationMode::Eager)
                .unwrap(),
        );
        assert_eq!(eager.violations[0].failing_rows(), vec![1]);
    }

    #[test]
    fn test_unique_key_and_table_checks() {
        let table_check = CompiledCheck::new(
            &SimpleCheck::named("is_not_null")
                .with_subject(["b"])
                .into(),
            CheckOptions::default(),
            &PredicateRegistry::builtin(),
            None,
        )
        .unwrap();
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnSpec::new("a", DataKind::Integer),
                ColumnSpec::new("b", DataKind::Varchar),
            ],
        )
        .unwrap()
        .with_unique_key(["a", "b"])
        .with_check(table_check)
        .build();

        let set = invalid(
            SchemaRuntime::new()
                .validate(
                    &schema,
                    &table(json!({"a": [1, 1, 2], "b": ["x", "x", null]})),
                    EvaluationMode::Lazy,
                )
                .unwrap(),
        );
        assert_eq!(set.unique_key, vec!["a", "b"]);
        assert_eq!(set.violations[0].reason, ViolationReason::DuplicateKeys);
        assert_eq!(set.violations[0].columns, vec!["a", "b"]);
        assert_eq!(set.violations[0].failing_rows(), vec![0, 1]);
        assert_eq!(set.violations[1].reason, ViolationReason::DataframeCheck);
        assert_eq!(set.violations[1].columns, vec!["b"]);
        assert_eq!(set.violations[1].failing_rows(), vec![2]);
    }

    #[test]
    fn test_checks_on_missing_columns_keep_the_batch() {
        let cross = CompiledCheck::new(
            &SimpleCheck::named("is_less_than").with_columns(["end"]).into(),
            CheckOptions::default(),
            &PredicateRegistry::builtin(),
            Some("start"),
        )
        .unwrap();
        let table_check = CompiledCheck::new(
            &SimpleCheck::named("is_not_null").with_subject(["ghost"]).into(),
            CheckOptions::default(),
            &PredicateRegistry::builtin(),
            None,
        )
        .unwrap();
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnSpec::new("start", DataKind::Integer)
                    .nullable(false)
                    .with_check(cross),
                ColumnSpec::new("end", DataKind::Integer),
            ],
        )
        .unwrap()
        .with_check(table_check)
        .build();
        let data = table(json!({"start": [1, null]}));

        let lazy = SchemaRuntime::new()
            .validate(&schema, &data, EvaluationMode::Lazy)
            .unwrap();
        assert!(matches!(lazy, RuntimeOutcome::Unsupported { .. }));

        let set = invalid(
            SchemaRuntime::new()
                .validate(&schema, &data, EvaluationMode::Eager)
                .unwrap(),
        );
        let found: Vec<_> = set
            .violations
            .iter()
            .map(|v| (v.reason, v.columns.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                (ViolationReason::SeriesContainsNulls, vec!["start".to_string()]),
                (ViolationReason::ColumnNotInDataframe, vec!["start".to_string()]),
                (ViolationReason::ColumnNotInDataframe, vec!["end".to_string()]),
                (ViolationReason::ColumnNotInDataframe, vec!["ghost".to_string()]),
            ]
        );
        assert_eq!(set.violations[0].failing_rows(), vec![1]);
        assert!(set.violations[1].metadata().is_some());
        assert!(set.violations[2].metadata().is_none());
        assert!(set.violations[3].failing_rows().is_empty());
    }
}
