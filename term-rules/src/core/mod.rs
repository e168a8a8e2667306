//! Core types: severities, data types, check expressions, schemas and
//! results.

mod check;
mod data_type;
mod expression;
mod level;
mod result;
mod schema;

pub use check::{CheckMetadata, CheckOptions, CompiledCheck};
pub use data_type::DataKind;
pub use expression::{
    CheckExpression, CompiledExpr, CompositeCheck, Connective, PredicateRef, SimpleCheck,
};
pub use level::Severity;
pub use result::{CollectorSnapshot, ExceptionRecord, ViolationRecord, ViolationReport};
pub use schema::{BuiltColumn, BuiltSchema, ColumnSpec, TableSchema};
