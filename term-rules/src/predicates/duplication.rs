//! Uniqueness / duplication predicates.

use super::{for_each_subject, Arity, Predicate, PredicateCall};
use crate::prelude::*;
use crate::table::Table;
use arrow::array::BooleanArray;
use arrow::compute::kernels::boolean::not;

/// Tests each subject column for repeated values.
///
/// `is_unique` holds for values that occur exactly once in their column,
/// `is_duplicated` for values that occur more than once. Nulls are treated
/// as a regular value.
#[derive(Debug, Clone)]
pub struct DuplicationPredicate {
    name: String,
    expect_unique: bool,
}

impl DuplicationPredicate {
    pub fn is_unique(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expect_unique: true,
        }
    }

    pub fn is_duplicated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expect_unique: false,
        }
    }
}

impl Predicate for DuplicationPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        Arity::Nullary
    }

    fn evaluate(&self, table: &Table, call: &PredicateCall) -> Result<BooleanArray> {
        for_each_subject(&self.name, call, |column| {
            let duplicated = table.duplicated(&[column.to_string()])?;
            if self.expect_unique {
                Ok(not(&duplicated)?)
            } else {
                Ok(duplicated)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::false_positions;
    use serde_json::json;

    #[test]
    fn test_unique_and_duplicated() {
        let rows = json!({"id": [1, 2, 2, 3]});
        let t = Table::from_rows(rows.as_object().unwrap()).unwrap();
        let call = PredicateCall::on(["id"]);

        let unique = DuplicationPredicate::is_unique("is_unique")
            .evaluate(&t, &call)
            .unwrap();
        assert_eq!(false_positions(&unique), vec![1, 2]);

        let duplicated = DuplicationPredicate::is_duplicated("is_duplicated")
            .evaluate(&t, &call)
            .unwrap();
        assert_eq!(false_positions(&duplicated), vec![0, 3]);
    }
}
