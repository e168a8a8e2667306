//! The validator: loads a schema from configuration and validates data
//! against it, funnelling every outcome into an [`ErrorCollector`].
//!
//! A validator moves through the following states:
//!
//! ```text
//! Uninitialized ──load──▶ SchemaReady ──validate──▶ Validating ──▶ Complete
//!       │
//!       └──── load failure ────▶ Error
//! ```
//!
//! Only a configuration failure leads to `Error`, which is absorbing: once
//! entered, `validate` does nothing. A failure while validating one dataset
//! aborts that call only; the validator stays usable.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use term_rules::collector::ErrorCollector;
//! use term_rules::validator::Validator;
//!
//! let collector = Arc::new(ErrorCollector::new());
//! let mut validator = Validator::builder()
//!     .collector(Arc::clone(&collector))
//!     .from_config(&json!({
//!         "name": "people",
//!         "columns": [{
//!             "id": "age", "data_type": "integer",
//!             "nullable": false, "unique": false, "required": true
//!         }]
//!     }))
//!     .unwrap();
//!
//! let rows = json!({"age": [1, null, 3]});
//! validator.validate(rows.as_object().unwrap().clone()).unwrap();
//!
//! let snapshot = collector.snapshot();
//! assert_eq!(snapshot.violation_reports[0].violations[0].row_indices, vec![1]);
//! ```

use crate::collector::handlers::{record_exception, record_violations, violation_records};
use crate::collector::ErrorCollector;
use crate::config::ConfigReader;
use crate::core::{BuiltSchema, Severity, TableSchema};
use crate::logging::{truncate_field, LogConfig};
use crate::predicates::{Predicate, PredicateRegistry};
use crate::prelude::*;
use crate::runtime::{
    EvaluationMode, RuntimeOutcome, SchemaRuntime, ValidationRuntime, ViolationSet,
};
use crate::table::Table;
use crate::{log_check, log_table_op};
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Lifecycle state of a [`Validator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorState {
    Uninitialized,
    SchemaReady,
    Validating,
    Complete,
    Error,
}

impl ValidatorState {
    /// True when a schema is loaded and data can be validated.
    pub fn can_validate(&self) -> bool {
        matches!(self, ValidatorState::SchemaReady | ValidatorState::Complete)
    }
}

impl fmt::Display for ValidatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidatorState::Uninitialized => "uninitialized",
            ValidatorState::SchemaReady => "schema_ready",
            ValidatorState::Validating => "validating",
            ValidatorState::Complete => "complete",
            ValidatorState::Error => "error",
        };
        write!(f, "{text}")
    }
}

/// Whether translating a batch of violations stops at the first critical
/// one, per evaluation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuitPolicy {
    /// Applies to the lazy pass
    pub lazy: bool,
    /// Applies to eager passes, including the retry after an unsupported
    /// lazy pass
    pub eager: bool,
}

impl Default for ShortCircuitPolicy {
    fn default() -> Self {
        Self {
            lazy: true,
            eager: true,
        }
    }
}

impl ShortCircuitPolicy {
    /// Never short-circuit.
    pub fn exhaustive() -> Self {
        Self {
            lazy: false,
            eager: false,
        }
    }

    pub fn for_mode(&self, mode: EvaluationMode) -> bool {
        match mode {
            EvaluationMode::Lazy => self.lazy,
            EvaluationMode::Eager => self.eager,
        }
    }
}

/// Validator-wide defaults.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Record errors in the collector instead of returning them
    pub collect_exceptions: bool,
    /// Try the lazy strategy before the eager one
    pub lazy: bool,
    pub short_circuit: ShortCircuitPolicy,
    pub log: LogConfig,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            collect_exceptions: true,
            lazy: true,
            short_circuit: ShortCircuitPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

impl ValidatorOptions {
    /// Returns every error to the caller instead of collecting it.
    pub fn strict() -> Self {
        Self {
            collect_exceptions: false,
            ..Self::default()
        }
    }

    /// Collects everything and never short-circuits.
    pub fn exhaustive() -> Self {
        Self {
            short_circuit: ShortCircuitPolicy::exhaustive(),
            log: LogConfig::verbose(),
            ..Self::default()
        }
    }

    pub fn with_collect_exceptions(mut self, collect: bool) -> Self {
        self.collect_exceptions = collect;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_short_circuit(mut self, policy: ShortCircuitPolicy) -> Self {
        self.short_circuit = policy;
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Per-call options matching these defaults.
    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            lazy: self.lazy,
            collect_exceptions: self.collect_exceptions,
        }
    }
}

/// Per-call options of [`Validator::validate_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Try the lazy strategy first; `false` goes straight to eager
    pub lazy: bool,
    pub collect_exceptions: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            lazy: true,
            collect_exceptions: true,
        }
    }
}

/// Data to validate.
#[derive(Debug, Clone)]
pub enum DataInput {
    /// Column name to sequence of values
    Rows(Map<String, Value>),
    Table(Table),
}

impl From<Map<String, Value>> for DataInput {
    fn from(rows: Map<String, Value>) -> Self {
        DataInput::Rows(rows)
    }
}

impl From<Table> for DataInput {
    fn from(table: Table) -> Self {
        DataInput::Table(table)
    }
}

impl From<RecordBatch> for DataInput {
    fn from(batch: RecordBatch) -> Self {
        DataInput::Table(Table::new(batch))
    }
}

/// Validates tables against a schema loaded from configuration.
pub struct Validator {
    state: ValidatorState,
    schema: Option<TableSchema>,
    built: Option<Arc<BuiltSchema>>,
    options: ValidatorOptions,
    reader: ConfigReader,
    collector: Arc<ErrorCollector>,
    runtime: Arc<dyn ValidationRuntime>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("state", &self.state)
            .field("schema", &self.schema.as_ref().map(TableSchema::name))
            .field("options", &self.options)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A validator with no schema, using the global collector and registry.
    pub fn new() -> Self {
        ValidatorBuilder::new().build()
    }

    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    /// Creates a validator with default options and loads `config`.
    ///
    /// Configuration errors are recorded in the global collector and leave
    /// the validator in the `Error` state; they are never returned because
    /// exception collection is on by default.
    pub fn from_config(config: &Value) -> Result<Self> {
        ValidatorBuilder::new().from_config(config)
    }

    pub fn state(&self) -> ValidatorState {
        self.state
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn collector(&self) -> &Arc<ErrorCollector> {
        &self.collector
    }

    /// Parses `config` and makes it the validator's schema.
    ///
    /// On failure the error is recorded as a critical exception and the
    /// validator enters the `Error` state, unless exception collection is
    /// off, in which case the error is returned and nothing is recorded.
    #[instrument(skip(self, config), fields(validator.state = %self.state))]
    pub fn load_config(&mut self, config: &Value) -> Result<()> {
        match self.reader.parse(config) {
            Ok(schema) => {
                info!(schema.name = %schema.name(), "Schema created from configuration");
                self.set_schema(schema);
                Ok(())
            }
            Err(err) => {
                error!(
                    error = %truncate_field(&err.to_string(), self.options.log.max_field_length),
                    "Failed to create schema from configuration"
                );
                self.state = ValidatorState::Error;
                self.handle_error(err, self.options.collect_exceptions)
            }
        }
    }

    /// Uses an already built schema.
    pub fn set_schema(&mut self, schema: TableSchema) {
        self.built = Some(Arc::new(schema.build()));
        self.schema = Some(schema);
        self.state = ValidatorState::SchemaReady;
    }

    /// Validates data with the validator's default options.
    pub fn validate(&mut self, data: impl Into<DataInput>) -> Result<()> {
        let options = self.options.validate_options();
        self.validate_with(data, options)
    }

    /// Validates data.
    ///
    /// Violations are appended to the collector as one report. Other errors
    /// are recorded as critical exceptions and abort this call; later calls
    /// validate normally. With exception collection off, both are returned
    /// instead; violations as [`RuleError::Violations`].
    ///
    /// Does nothing when no schema is loaded.
    #[instrument(skip(self, data), fields(
        validator.state = %self.state,
        schema.name = self.schema.as_ref().map(TableSchema::name).unwrap_or("<none>"),
    ))]
    pub fn validate_with(
        &mut self,
        data: impl Into<DataInput>,
        options: ValidateOptions,
    ) -> Result<()> {
        let built = match (&self.built, self.state.can_validate()) {
            (Some(built), true) => Arc::clone(built),
            _ => {
                error!(state = %self.state, "No schema is loaded, skipping validation");
                return Ok(());
            }
        };

        self.state = ValidatorState::Validating;
        info!(lazy = options.lazy, "Starting validation");

        let result = self
            .prepare_table(&built, data.into())
            .and_then(|table| self.run(&built, &table, options));

        match result {
            Ok(()) => {
                self.state = ValidatorState::Complete;
                info!("Validation completed");
                Ok(())
            }
            Err(err @ RuleError::Violations { .. }) => {
                self.state = ValidatorState::Complete;
                Err(err)
            }
            Err(err) => {
                error!(
                    error.kind = err.kind(),
                    error = %truncate_field(&err.to_string(), self.options.log.max_field_length),
                    "Validation aborted"
                );
                self.state = ValidatorState::Complete;
                self.handle_error(err, options.collect_exceptions)
            }
        }
    }

    fn prepare_table(&self, schema: &BuiltSchema, data: DataInput) -> Result<Table> {
        let table = match data {
            DataInput::Rows(rows) => {
                log_table_op!(self.options.log, columns = rows.len(), "Reading table from row mapping");
                Table::from_rows(&rows)?
            }
            DataInput::Table(table) => table,
        };

        log_table_op!(
            self.options.log,
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Casting table to schema types"
        );
        table.cast_columns(&schema.cast_targets())
    }

    fn run(&self, schema: &BuiltSchema, table: &Table, options: ValidateOptions) -> Result<()> {
        let mut mode = if options.lazy {
            EvaluationMode::Lazy
        } else {
            EvaluationMode::Eager
        };

        let mut outcome = self.runtime.validate(schema, table, mode)?;
        if let RuntimeOutcome::Unsupported { reason } = &outcome {
            warn!(
                reason = %truncate_field(reason, self.options.log.max_field_length),
                "Lazy validation unsupported, retrying in eager mode"
            );
            mode = EvaluationMode::Eager;
            outcome = self.runtime.validate(schema, table, mode)?;
        }

        match outcome {
            RuntimeOutcome::Valid => Ok(()),
            RuntimeOutcome::Invalid(set) => self.report(set, mode, options.collect_exceptions),
            RuntimeOutcome::Unsupported { reason } => Err(RuleError::Internal(format!(
                "runtime cannot evaluate schema '{}' in eager mode: {reason}",
                schema.name
            ))),
        }
    }

    fn report(&self, set: ViolationSet, mode: EvaluationMode, collect: bool) -> Result<()> {
        let short_circuit = self.options.short_circuit.for_mode(mode);
        for violation in &set.violations {
            log_check!(
                self.options.log,
                reason = %violation.reason,
                columns = ?violation.columns,
                failing_rows = violation.failing_rows().len(),
                "Violation"
            );
        }

        if !collect {
            return Err(RuleError::Violations {
                schema: set.schema.clone(),
                records: violation_records(&set, short_circuit),
            });
        }

        let id = record_violations(&self.collector, &set, short_circuit);
        if self.options.log.log_reports {
            info!(
                report.id = id,
                report.name = %set.schema,
                mode = %mode,
                violations = set.len(),
                "Collected validation errors"
            );
        }
        Ok(())
    }

    fn handle_error(&self, err: RuleError, collect: bool) -> Result<()> {
        if collect {
            record_exception(&self.collector, &err, Severity::Critical);
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Builder for [`Validator`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use term_rules::collector::ErrorCollector;
/// use term_rules::validator::{Validator, ValidatorOptions, ValidatorState};
///
/// let validator = Validator::builder()
///     .collector(Arc::new(ErrorCollector::new()))
///     .options(ValidatorOptions::strict())
///     .build();
/// assert_eq!(validator.state(), ValidatorState::Uninitialized);
/// ```
pub struct ValidatorBuilder {
    options: ValidatorOptions,
    registry: Option<Arc<PredicateRegistry>>,
    custom: Vec<(String, Arc<dyn Predicate>)>,
    collector: Option<Arc<ErrorCollector>>,
    runtime: Option<Arc<dyn ValidationRuntime>>,
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorBuilder {
    pub fn new() -> Self {
        Self {
            options: ValidatorOptions::default(),
            registry: None,
            custom: Vec::new(),
            collector: None,
            runtime: None,
        }
    }

    pub fn options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves configuration commands through `registry` instead of the
    /// global one.
    pub fn registry(mut self, registry: Arc<PredicateRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Makes a configuration command resolve to a custom predicate.
    pub fn custom_predicate<P>(mut self, name: impl Into<String>, predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        self.custom.push((name.into(), Arc::new(predicate)));
        self
    }

    /// Records into `collector` instead of the global one.
    pub fn collector(mut self, collector: Arc<ErrorCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn ValidationRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds a validator with no schema.
    pub fn build(self) -> Validator {
        let registry = self.registry.unwrap_or_else(PredicateRegistry::global);
        let reader = self
            .custom
            .into_iter()
            .fold(ConfigReader::with_registry(registry), |reader, (name, predicate)| {
                reader.with_custom_arc(name, predicate)
            });

        Validator {
            state: ValidatorState::Uninitialized,
            schema: None,
            built: None,
            options: self.options,
            reader,
            collector: self.collector.unwrap_or_else(ErrorCollector::global),
            runtime: self
                .runtime
                .unwrap_or_else(|| Arc::new(SchemaRuntime::new())),
        }
    }

    /// Builds a validator and loads `config` into it.
    ///
    /// Returns an error only when exception collection is off.
    pub fn from_config(self, config: &Value) -> Result<Validator> {
        let mut validator = self.build();
        validator.load_config(config)?;
        Ok(validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn isolated() -> (Arc<ErrorCollector>, ValidatorBuilder) {
        let collector = Arc::new(ErrorCollector::new());
        let builder = Validator::builder().collector(Arc::clone(&collector));
        (collector, builder)
    }

    fn config() -> Value {
        json!({
            "name": "people",
            "columns": [{
                "id": "age",
                "data_type": "integer",
                "nullable": false,
                "unique": false,
                "required": true,
                "checks": [{"command": "is_greater_than", "arg_values": [0]}]
            }]
        })
    }

    fn rows(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_state_transitions() {
        let (collector, builder) = isolated();
        let mut validator = builder.build();
        assert_eq!(validator.state(), ValidatorState::Uninitialized);

        validator.load_config(&config()).unwrap();
        assert_eq!(validator.state(), ValidatorState::SchemaReady);

        validator.validate(rows(json!({"age": [1, 2]}))).unwrap();
        assert_eq!(validator.state(), ValidatorState::Complete);
        assert!(collector.snapshot().is_empty());

        validator.validate(rows(json!({"age": [1, -2]}))).unwrap();
        assert_eq!(validator.state(), ValidatorState::Complete);
        assert_eq!(collector.total_violations(), 1);
    }

    #[test]
    fn test_validate_without_schema_is_noop() {
        let (collector, builder) = isolated();
        let mut validator = builder.build();
        validator.validate(rows(json!({"age": [1]}))).unwrap();
        assert_eq!(validator.state(), ValidatorState::Uninitialized);
        assert!(collector.snapshot().is_empty());
    }

    #[test]
    fn test_config_error_is_recorded() {
        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&json!({"name": "t"})).unwrap();
        assert_eq!(validator.state(), ValidatorState::Error);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.exceptions.len(), 1);
        assert_eq!(snapshot.exceptions[0].kind, "missing-key");
        assert_eq!(snapshot.exceptions[0].severity, Severity::Critical);

        validator.validate(rows(json!({"age": [1]}))).unwrap();
        assert_eq!(collector.snapshot(), snapshot);
    }

    #[test]
    fn test_config_error_returned_when_not_collecting() {
        let (collector, builder) = isolated();
        let err = builder
            .options(ValidatorOptions::strict())
            .from_config(&json!({"name": "t"}))
            .unwrap_err();
        assert_eq!(err.kind(), "missing-key");
        assert!(collector.snapshot().is_empty());
    }

    #[test]
    fn test_cast_failure_aborts_the_call() {
        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&config()).unwrap();

        validator
            .validate(rows(json!({"age": ["one", "two"]})))
            .unwrap();
        assert_eq!(validator.state(), ValidatorState::Complete);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.exceptions[0].kind, "invalid-cast");
        assert_eq!(snapshot.exceptions[0].severity, Severity::Critical);
        assert!(snapshot.violation_reports.is_empty());
    }

    #[test]
    fn test_malformed_rows_are_recorded() {
        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&config()).unwrap();
        validator
            .validate(rows(json!({"age": [1, 2], "other": [1]})))
            .unwrap();
        assert_eq!(collector.snapshot().exceptions[0].kind, "table-construction");
    }

    #[test]
    fn test_bad_input_does_not_disable_validator() {
        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&config()).unwrap();

        validator
            .validate(rows(json!({"age": [1, 2], "x": [1]})))
            .unwrap();
        assert!(validator.state().can_validate());

        validator.validate(rows(json!({"age": [1, null]}))).unwrap();
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.exceptions.len(), 1);
        assert_eq!(snapshot.violation_reports.len(), 1);
        let violation = &snapshot.violation_reports[0].violations[0];
        assert_eq!(violation.reason, "series_contains_nulls");
        assert_eq!(violation.row_indices, vec![1]);
    }

    #[test]
    fn test_violations_returned_when_not_collecting() {
        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&config()).unwrap();

        let err = validator
            .validate_with(
                rows(json!({"age": [1, null, -1]})),
                ValidateOptions {
                    lazy: true,
                    collect_exceptions: false,
                },
            )
            .unwrap_err();
        match err {
            RuleError::Violations { schema, records } => {
                assert_eq!(schema, "people");
                assert_eq!(records.len(), 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(validator.state(), ValidatorState::Complete);
        assert!(collector.snapshot().is_empty());
    }

    #[test]
    fn test_record_batch_input() {
        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&config()).unwrap();
        let table = Table::from_rows(&rows(json!({"age": [5, 0]}))).unwrap();
        validator.validate(table.into_record_batch()).unwrap();
        assert_eq!(
            collector.snapshot().violation_reports[0].violations[0].row_indices,
            vec![1]
        );
    }

    #[test]
    fn test_short_circuit_policy() {
        let config = json!({
            "name": "t",
            "columns": [{
                "id": "a", "data_type": "integer",
                "nullable": true, "unique": false, "required": true,
                "checks": [
                    {"command": "is_less_than", "arg_values": [0], "error_level": "critical"},
                    {"command": "is_greater_than", "arg_values": [10]}
                ]
            }]
        });
        let data = json!({"a": [1, 2]});

        let (collector, builder) = isolated();
        let mut validator = builder.from_config(&config).unwrap();
        validator.validate(rows(data.clone())).unwrap();
        assert_eq!(collector.total_violations(), 1);

        let (collector, builder) = isolated();
        let mut validator = builder
            .options(ValidatorOptions::default().with_short_circuit(ShortCircuitPolicy::exhaustive()))
            .from_config(&config)
            .unwrap();
        validator.validate(rows(data)).unwrap();
        assert_eq!(collector.total_violations(), 2);
    }
}
