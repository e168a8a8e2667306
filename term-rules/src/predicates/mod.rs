//! Predicate implementations and the predicate registry.
//!
//! A predicate is a named, parameterized boolean test over one or more
//! table columns. Evaluating a predicate yields one boolean outcome per row;
//! `false` marks a failing row and `null` an undecided one (which never
//! counts as a failure).
//!
//! ## Built-in predicates
//!
//! | Name | Arguments |
//! |------|-----------|
//! | `is_equal_to`, `is_not_equal_to` | one value or one column |
//! | `is_equal_to_or_both_missing` | one value or one column |
//! | `is_not_equal_to_and_not_both_missing` | one value or one column |
//! | `is_greater_than`, `is_greater_than_or_equal_to` | one value or one column |
//! | `is_less_than`, `is_less_than_or_equal_to` | one value or one column |
//! | `is_in` | list of values |
//! | `is_unique`, `is_duplicated` | none |
//! | `is_null`, `is_not_null` | none |
//!
//! Custom predicates implement [`Predicate`] directly, or wrap a closure
//! with [`FnPredicate`].

mod comparison;
mod custom;
mod duplication;
mod membership;
mod nullability;
mod registry;

pub use comparison::{ComparisonOperator, ComparisonPredicate};
pub use custom::FnPredicate;
pub use duplication::DuplicationPredicate;
pub use membership::MembershipPredicate;
pub use nullability::NullabilityPredicate;
pub use registry::PredicateRegistry;

use crate::prelude::*;
use crate::table::Table;
use arrow::array::BooleanArray;
use arrow::compute::kernels::boolean::and_kleene;
use serde_json::Value;
use std::fmt::{self, Debug};

/// The argument shape a predicate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No arguments at all.
    Nullary,
    /// Exactly one operand: a single value or a single column.
    Operand,
    /// A non-empty list of literal values.
    Values,
    /// Anything goes; the predicate validates its own arguments.
    Any,
}

impl Arity {
    /// Checks whether the arguments of a call fit this arity.
    ///
    /// Returns a human-readable reason when they do not.
    pub fn check(&self, call: &PredicateCall) -> std::result::Result<(), String> {
        let values = call.arg_values.len();
        let columns = call.arg_columns.len();
        match self {
            Arity::Nullary if values + columns > 0 => {
                Err("takes no arguments but arguments were given".to_string())
            }
            Arity::Operand if columns > 1 => Err(format!(
                "compares against a single column but {columns} were given"
            )),
            Arity::Operand if columns == 0 && values != 1 => Err(format!(
                "compares against a single value but {values} were given"
            )),
            Arity::Values if values == 0 => Err("requires at least one value".to_string()),
            Arity::Values if columns > 0 => {
                Err("takes values, column arguments are not supported".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Arity::Nullary => "no arguments",
            Arity::Operand => "one value or one column",
            Arity::Values => "a list of values",
            Arity::Any => "any arguments",
        };
        write!(f, "{text}")
    }
}

/// The bound arguments of one predicate invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateCall {
    /// Columns the predicate is applied to. Never empty once compiled.
    pub subject: Vec<String>,
    /// Literal arguments
    pub arg_values: Vec<Value>,
    /// Column arguments
    pub arg_columns: Vec<String>,
}

impl PredicateCall {
    /// Creates a call over the given subject columns with no arguments.
    pub fn on<I, S>(subject: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the literal arguments.
    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.arg_values = values;
        self
    }

    /// Sets the column arguments.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Every column this call reads, subject first.
    pub fn referenced_columns(&self) -> impl Iterator<Item = &str> {
        self.subject
            .iter()
            .chain(self.arg_columns.iter())
            .map(String::as_str)
    }
}

/// A row-level boolean test over table columns.
///
/// Implementations must be pure: the same table and call always produce the
/// same outcome.
pub trait Predicate: Debug + Send + Sync {
    /// The stable name of the predicate.
    fn name(&self) -> &str;

    /// The argument shape this predicate accepts.
    fn arity(&self) -> Arity {
        Arity::Any
    }

    /// Evaluates the predicate for every row of the table.
    fn evaluate(&self, table: &Table, call: &PredicateCall) -> Result<BooleanArray>;
}

/// Combines per-column outcomes row-wise: a row holds only if it holds for
/// every column.
pub fn all_of(masks: Vec<BooleanArray>) -> Result<BooleanArray> {
    let mut masks = masks.into_iter();
    let first = masks
        .next()
        .ok_or_else(|| RuleError::Internal("cannot combine zero outcomes".to_string()))?;
    masks.try_fold(first, |acc, mask| Ok(and_kleene(&acc, &mask)?))
}

/// Evaluates a per-column test for every subject column and combines the
/// outcomes with [`all_of`].
pub(crate) fn for_each_subject<F>(name: &str, call: &PredicateCall, mut f: F) -> Result<BooleanArray>
where
    F: FnMut(&str) -> Result<BooleanArray>,
{
    if call.subject.is_empty() {
        return Err(RuleError::predicate(name, "no subject column to apply to"));
    }
    let masks = call
        .subject
        .iter()
        .map(|column| f(column))
        .collect::<Result<Vec<_>>>()?;
    all_of(masks)
}
