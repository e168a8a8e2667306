//! Equality and ordering predicates.

use super::{for_each_subject, Arity, Predicate, PredicateCall};
use crate::prelude::*;
use crate::table::{column_expr, scalar_from_json, Table};
use arrow::array::BooleanArray;
use datafusion::logical_expr::{binary_expr, lit, Operator};
use datafusion::prelude::Expr;
use std::fmt;

/// The comparison applied between a subject column and its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    /// Equality where two nulls compare equal.
    EqualOrBothMissing,
    /// Inequality where two nulls compare equal.
    NotEqualAndNotBothMissing,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl ComparisonOperator {
    fn operator(&self) -> Operator {
        match self {
            ComparisonOperator::Equal => Operator::Eq,
            ComparisonOperator::NotEqual => Operator::NotEq,
            ComparisonOperator::EqualOrBothMissing => Operator::IsNotDistinctFrom,
            ComparisonOperator::NotEqualAndNotBothMissing => Operator::IsDistinctFrom,
            ComparisonOperator::GreaterThan => Operator::Gt,
            ComparisonOperator::GreaterThanOrEqual => Operator::GtEq,
            ComparisonOperator::LessThan => Operator::Lt,
            ComparisonOperator::LessThanOrEqual => Operator::LtEq,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator())
    }
}

/// Compares each subject column against a single value or column.
///
/// When both a value and a column are supplied, the column wins.
#[derive(Debug, Clone)]
pub struct ComparisonPredicate {
    name: String,
    op: ComparisonOperator,
}

impl ComparisonPredicate {
    pub fn new(name: impl Into<String>, op: ComparisonOperator) -> Self {
        Self {
            name: name.into(),
            op,
        }
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.op
    }

    fn operand(&self, call: &PredicateCall) -> Result<Expr> {
        if let Some(column) = call.arg_columns.first() {
            return Ok(column_expr(column));
        }
        let value = call
            .arg_values
            .first()
            .ok_or_else(|| RuleError::predicate(&self.name, "missing comparison operand"))?;
        Ok(lit(scalar_from_json(value)?))
    }
}

impl Predicate for ComparisonPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        Arity::Operand
    }

    fn evaluate(&self, table: &Table, call: &PredicateCall) -> Result<BooleanArray> {
        let operand = self.operand(call)?;
        for_each_subject(&self.name, call, |column| {
            table.evaluate(binary_expr(
                column_expr(column),
                self.op.operator(),
                operand.clone(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::false_positions;
    use serde_json::{json, Value};

    fn table(value: Value) -> Table {
        Table::from_rows(value.as_object().unwrap()).unwrap()
    }

    fn failing(op: ComparisonOperator, t: &Table, call: PredicateCall) -> Vec<usize> {
        let mask = ComparisonPredicate::new("test", op).evaluate(t, &call).unwrap();
        false_positions(&mask)
    }

    #[test]
    fn test_ordering_against_value() {
        let t = table(json!({"age": [2, 30, null, -5, 150]}));
        let call = PredicateCall::on(["age"]).with_values(vec![json!(0)]);
        assert_eq!(
            failing(ComparisonOperator::GreaterThanOrEqual, &t, call.clone()),
            vec![3]
        );
        assert_eq!(failing(ComparisonOperator::LessThan, &t, call), vec![0, 1, 4]);
    }

    #[test]
    fn test_equality_against_column() {
        let t = table(json!({"a": [1, 2, null, null], "b": [1, 3, null, 4]}));
        let call = PredicateCall::on(["a"]).with_columns(["b"]);

        assert_eq!(failing(ComparisonOperator::Equal, &t, call.clone()), vec![1]);
        assert_eq!(
            failing(ComparisonOperator::EqualOrBothMissing, &t, call.clone()),
            vec![1, 3]
        );
        assert_eq!(
            failing(ComparisonOperator::NotEqualAndNotBothMissing, &t, call),
            vec![0, 2]
        );
    }

    #[test]
    fn test_multiple_subjects_must_all_hold() {
        let t = table(json!({"a": [1, 5, 5], "b": [5, 1, 5]}));
        let call = PredicateCall::on(["a", "b"]).with_values(vec![json!(3)]);
        assert_eq!(failing(ComparisonOperator::GreaterThan, &t, call), vec![0, 1]);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let t = table(json!({"a": [1]}));
        let call = PredicateCall::on(["zzz"]).with_values(vec![json!(1)]);
        assert!(ComparisonPredicate::new("test", ComparisonOperator::Equal)
            .evaluate(&t, &call)
            .is_err());
    }
}
