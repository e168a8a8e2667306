//! Closure-backed predicates supplied by the caller.

use super::{Arity, Predicate, PredicateCall};
use crate::prelude::*;
use crate::table::Table;
use arrow::array::BooleanArray;
use std::fmt;
use std::sync::Arc;

type PredicateFn = dyn Fn(&Table, &PredicateCall) -> Result<BooleanArray> + Send + Sync;

/// A predicate backed by a user-supplied function.
///
/// Custom predicates bypass the registry and are used verbatim; they accept
/// any argument shape, so the function is responsible for checking its own
/// arguments.
///
/// # Examples
///
/// ```rust
/// use datafusion::prelude::lit;
/// use term_rules::predicates::FnPredicate;
/// use term_rules::table::column_expr;
///
/// // Holds for values in [low, high)
/// let is_between = FnPredicate::new("is_between", |table, call| {
///     let low = term_rules::table::scalar_from_json(&call.arg_values[0])?;
///     let high = term_rules::table::scalar_from_json(&call.arg_values[1])?;
///     let column = column_expr(&call.subject[0]);
///     table.evaluate(column.clone().gt_eq(lit(low)).and(column.lt(lit(high))))
/// });
/// ```
#[derive(Clone)]
pub struct FnPredicate {
    name: String,
    f: Arc<PredicateFn>,
}

impl FnPredicate {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Table, &PredicateCall) -> Result<BooleanArray> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for FnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Predicate for FnPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        Arity::Any
    }

    fn evaluate(&self, table: &Table, call: &PredicateCall) -> Result<BooleanArray> {
        (self.f)(table, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::false_positions;
    use arrow::array::Array;
    use serde_json::json;

    #[test]
    fn test_fn_predicate_receives_call() {
        let rows = json!({"a": [1, 2, 3]});
        let t = Table::from_rows(rows.as_object().unwrap()).unwrap();

        let odd = FnPredicate::new("is_odd", |table, call| {
            let column = table.column(&call.subject[0])?;
            let values = column
                .as_any()
                .downcast_ref::<arrow::array::Int64Array>()
                .ok_or_else(|| RuleError::predicate("is_odd", "expected integers"))?;
            Ok(values.iter().map(|v| v.map(|v| v % 2 != 0)).collect())
        });

        let mask = odd.evaluate(&t, &PredicateCall::on(["a"])).unwrap();
        assert_eq!(false_positions(&mask), vec![1]);
        assert_eq!(odd.name(), "is_odd");
        assert!(format!("{odd:?}").contains("is_odd"));
    }
}
