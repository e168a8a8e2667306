//! # Term Rules - Declarative Data Validation
//!
//! Term Rules validates tabular data against schemas described in JSON
//! configuration. A schema declares columns (type, nullability, uniqueness,
//! required-ness), a composite unique key, and checks built from a small
//! expression language over named predicates. Everything the validator
//! observes, from configuration mistakes to failing rows, is collected into
//! severity-tagged, row-indexed reports.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use term_rules::collector::ErrorCollector;
//! use term_rules::validator::Validator;
//!
//! let config = json!({
//!     "name": "people",
//!     "columns": [{
//!         "id": "age",
//!         "data_type": "integer",
//!         "nullable": false,
//!         "unique": false,
//!         "required": true,
//!         "checks": [{
//!             "check_case": "conjunction",
//!             "expressions": [
//!                 {"command": "is_greater_than_or_equal_to", "arg_values": [0]},
//!                 {"command": "is_less_than", "arg_values": [150]}
//!             ]
//!         }]
//!     }]
//! });
//!
//! let collector = Arc::new(ErrorCollector::new());
//! let mut validator = Validator::builder()
//!     .collector(Arc::clone(&collector))
//!     .from_config(&config)
//!     .unwrap();
//!
//! let data = json!({"age": [2, 30, null, -5, 150]});
//! validator.validate(data.as_object().unwrap().clone()).unwrap();
//!
//! let report = &collector.snapshot().violation_reports[0];
//! assert_eq!(report.violations[0].row_indices, vec![2]);
//! assert_eq!(report.violations[1].row_indices, vec![3, 4]);
//! ```
//!
//! ## Expressions
//!
//! A check is either a simple expression naming a predicate (`command`) with
//! optional `subject`, `arg_values` and `arg_columns`, or a composite
//! expression (`check_case`) joining exactly two expressions:
//!
//! - **conjunction**: both must hold
//! - **disjunction**: at least one must hold
//! - **condition**: when the first holds, the second must hold too
//!
//! Outcomes use three-valued logic; a row whose outcome is unknown (null) is
//! never reported as failing.
//!
//! ## Architecture
//!
//! - **`predicates`**: the predicate trait, built-ins and the registry
//! - **`core`**: expressions, compiled checks, schemas and result types
//! - **`config`**: JSON configuration reader
//! - **`table`**: Arrow-backed table engine evaluating DataFusion expressions
//! - **`runtime`**: lazy and eager schema evaluation
//! - **`collector`**: violation and exception aggregation
//! - **`validator`**: the orchestrating state machine
//! - **`formatters`**: JSON and human-readable output
//! - **`logging`**: tracing configuration

pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod predicates;
pub mod prelude;
pub mod runtime;
pub mod table;
pub mod validator;
