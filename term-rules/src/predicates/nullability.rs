//! Null / not-null predicates.

use super::{for_each_subject, Arity, Predicate, PredicateCall};
use crate::prelude::*;
use crate::table::{column_expr, Table};
use arrow::array::BooleanArray;

/// Tests whether subject values are null (`is_null`) or present
/// (`is_not_null`).
#[derive(Debug, Clone)]
pub struct NullabilityPredicate {
    name: String,
    expect_null: bool,
}

impl NullabilityPredicate {
    /// Holds for null values.
    pub fn is_null(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expect_null: true,
        }
    }

    /// Holds for non-null values.
    pub fn is_not_null(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expect_null: false,
        }
    }
}

impl Predicate for NullabilityPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        Arity::Nullary
    }

    fn evaluate(&self, table: &Table, call: &PredicateCall) -> Result<BooleanArray> {
        for_each_subject(&self.name, call, |column| {
            let expr = if self.expect_null {
                column_expr(column).is_null()
            } else {
                column_expr(column).is_not_null()
            };
            table.evaluate(expr)
        })
    }
}
