//! Set membership predicate.

use super::{for_each_subject, Arity, Predicate, PredicateCall};
use crate::prelude::*;
use crate::table::{column_expr, scalar_from_json, Table};
use arrow::array::BooleanArray;
use datafusion::logical_expr::lit;

/// Holds when the subject value is one of the given literal values.
#[derive(Debug, Clone)]
pub struct MembershipPredicate {
    name: String,
}

impl MembershipPredicate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Predicate for MembershipPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        Arity::Values
    }

    fn evaluate(&self, table: &Table, call: &PredicateCall) -> Result<BooleanArray> {
        let list = call
            .arg_values
            .iter()
            .map(|value| scalar_from_json(value).map(lit))
            .collect::<Result<Vec<_>>>()?;

        for_each_subject(&self.name, call, |column| {
            table.evaluate(column_expr(column).in_list(list.clone(), false))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::false_positions;
    use arrow::array::Array;
    use serde_json::json;

    #[test]
    fn test_is_in() {
        let rows = json!({"code": ["a", "b", "c", null]});
        let t = Table::from_rows(rows.as_object().unwrap()).unwrap();
        let call = PredicateCall::on(["code"]).with_values(vec![json!("a"), json!("c")]);

        let mask = MembershipPredicate::new("is_in").evaluate(&t, &call).unwrap();
        assert_eq!(false_positions(&mask), vec![1]);
        assert!(mask.is_null(3));
    }

    #[test]
    fn test_is_in_numbers() {
        let rows = json!({"n": [0, 1, 2, 3]});
        let t = Table::from_rows(rows.as_object().unwrap()).unwrap();
        let call = PredicateCall::on(["n"]).with_values(vec![json!(1), json!(2)]);

        let mask = MembershipPredicate::new("is_in").evaluate(&t, &call).unwrap();
        assert_eq!(false_positions(&mask), vec![0, 3]);
    }
}
