//! Columnar table engine.
//!
//! [`Table`] wraps an Arrow [`RecordBatch`] and provides the handful of
//! operations the rules engine needs: building a table from row data,
//! casting columns to their declared types, evaluating boolean DataFusion
//! expressions row by row, and locating duplicated rows.
//!
//! Expressions are evaluated synchronously: a logical [`Expr`] is coerced and
//! planned into a physical expression against the batch schema and then
//! evaluated directly on the batch, without building a query plan.
//!
//! # Examples
//!
//! ```rust
//! use datafusion::prelude::{col, lit};
//! use serde_json::json;
//! use term_rules::table::{false_positions, Table};
//!
//! let rows = json!({"age": [2, 30, -5]});
//! let table = Table::from_rows(rows.as_object().unwrap()).unwrap();
//! let mask = table.evaluate(col("age").gt_eq(lit(0i64))).unwrap();
//! assert_eq!(false_positions(&mask), vec![2]);
//! ```

use crate::core::DataKind;
use crate::prelude::*;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, NullArray, StringArray,
};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::row::{Row, RowConverter, SortField};
use datafusion::common::{Column, DFSchema, ScalarValue};
use datafusion::physical_expr::PhysicalExpr;
use datafusion::prelude::{Expr, SessionContext};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Session used to plan physical expressions. It holds no registered tables.
static EXPR_CONTEXT: Lazy<SessionContext> = Lazy::new(SessionContext::new);

/// An in-memory columnar table.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wraps an existing record batch.
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Creates a table with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    /// Builds a table from a mapping of column name to a sequence of values.
    ///
    /// Column types are inferred from the JSON values: integers become
    /// `Int64`, other numbers `Float64` (integers and floats may be mixed),
    /// strings `Utf8`, booleans `Boolean`, and an all-null column `Null`.
    /// Any other mix of value types is rejected.
    pub fn from_rows(rows: &Map<String, Value>) -> Result<Self> {
        let mut fields = Vec::with_capacity(rows.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(rows.len());
        let mut num_rows: Option<usize> = None;

        for (name, values) in rows {
            let values = values.as_array().ok_or_else(|| {
                RuleError::TableConstruction(format!(
                    "column '{name}' must be a sequence of values, found {}",
                    json_type_name(values)
                ))
            })?;

            match num_rows {
                Some(expected) if expected != values.len() => {
                    return Err(RuleError::TableConstruction(format!(
                        "column '{name}' has {} values, expected {expected}",
                        values.len()
                    )));
                }
                _ => num_rows = Some(values.len()),
            }

            let array = infer_array(name, values)?;
            fields.push(Field::new(name, array.data_type().clone(), true));
            columns.push(array);
        }

        let num_rows = num_rows.unwrap_or(0);
        debug!(
            table.columns = fields.len(),
            table.rows = num_rows,
            "Materialized table from row mapping"
        );
        Self::from_parts(fields, columns, num_rows)
    }

    /// Builds a table from row data and casts the listed columns to explicit
    /// types. Columns not listed keep their inferred type.
    pub fn from_rows_typed(rows: &Map<String, Value>, types: &[(String, DataKind)]) -> Result<Self> {
        Self::from_rows(rows)?.cast_columns(types)
    }

    fn from_parts(fields: Vec<Field>, columns: Vec<ArrayRef>, num_rows: usize) -> Result<Self> {
        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        let batch = RecordBatch::try_new_with_options(schema, columns, &options)?;
        Ok(Self { batch })
    }

    /// Returns the underlying record batch.
    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consumes the table and returns the underlying record batch.
    pub fn into_record_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Returns the column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    /// Returns true if the table has a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Returns the column with the given name.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| RuleError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    /// Returns the Arrow type of a column.
    pub fn data_type(&self, name: &str) -> Result<DataType> {
        Ok(self.column(name)?.data_type().clone())
    }

    /// Casts columns to the Arrow type of their declared [`DataKind`].
    ///
    /// Columns absent from the table are skipped. Casting is strict: a value
    /// that cannot be represented in the target type fails the whole cast
    /// with [`RuleError::InvalidCast`] instead of becoming null.
    pub fn cast_columns(&self, targets: &[(String, DataKind)]) -> Result<Self> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|field| field.as_ref().clone())
            .collect();
        let mut columns = self.batch.columns().to_vec();
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };

        for (name, kind) in targets {
            let Ok(index) = schema.index_of(name) else {
                continue;
            };
            let target = kind.arrow_type();
            if columns[index].data_type() == &target {
                continue;
            }

            let cast = cast_with_options(&columns[index], &target, &options).map_err(|source| {
                RuleError::InvalidCast {
                    column: name.clone(),
                    target: kind.to_string(),
                    source,
                }
            })?;
            debug!(column = %name, from = %columns[index].data_type(), to = %target, "Cast column");
            fields[index] = Field::new(name, target, true);
            columns[index] = cast;
        }

        Self::from_parts(fields, columns, self.batch.num_rows())
    }

    /// Returns a table restricted to the given columns.
    pub fn project(&self, columns: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let indices = columns
            .iter()
            .map(|name| {
                schema.index_of(name).map_err(|_| RuleError::ColumnNotFound {
                    column: (*name).to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            batch: self.batch.project(&indices)?,
        })
    }

    /// Evaluates a boolean expression for every row of the table.
    ///
    /// The expression is type-coerced against the table schema, so literals
    /// may be compared with columns of a compatible type (e.g. an integer
    /// literal with a `Float64` column or a date string with a `Date32`
    /// column).
    pub fn evaluate(&self, expr: Expr) -> Result<BooleanArray> {
        let df_schema = DFSchema::try_from(self.batch.schema().as_ref().clone())?;
        let physical: Arc<dyn PhysicalExpr> = EXPR_CONTEXT.create_physical_expr(expr, &df_schema)?;
        let array = physical
            .evaluate(&self.batch)?
            .into_array(self.batch.num_rows())?;

        array.as_boolean_opt().cloned().ok_or_else(|| {
            RuleError::Internal(format!(
                "expression evaluated to {} instead of Boolean",
                array.data_type()
            ))
        })
    }

    /// Marks rows whose combined values over `columns` occur more than once.
    ///
    /// Nulls compare equal to each other.
    pub fn duplicated(&self, columns: &[String]) -> Result<BooleanArray> {
        if columns.is_empty() {
            return Ok(BooleanArray::from(vec![false; self.num_rows()]));
        }

        let arrays = columns
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<Result<Vec<ArrayRef>>>()?;
        let fields = arrays
            .iter()
            .map(|array| SortField::new(array.data_type().clone()))
            .collect();
        let converter = RowConverter::new(fields)?;
        let rows = converter.convert_columns(&arrays)?;

        let mut counts: HashMap<Row<'_>, usize> = HashMap::with_capacity(rows.num_rows());
        for row in rows.iter() {
            *counts.entry(row).or_default() += 1;
        }

        let flags: Vec<bool> = rows.iter().map(|row| counts[&row] > 1).collect();
        Ok(BooleanArray::from(flags))
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<RecordBatch> for Table {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

/// Returns the zero-based positions where a boolean outcome is `false`.
///
/// Null outcomes are not failures.
pub fn false_positions(mask: &BooleanArray) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(index, value)| (value == Some(false)).then_some(index))
        .collect()
}

/// Builds a column reference without parsing the name, so names containing
/// dots or upper-case letters are taken literally.
pub fn column_expr(name: &str) -> Expr {
    Expr::Column(Column::from_name(name))
}

/// Converts a JSON literal into a scalar usable in expressions.
pub fn scalar_from_json(value: &Value) -> Result<ScalarValue> {
    match value {
        Value::Null => Ok(ScalarValue::Null),
        Value::Bool(b) => Ok(ScalarValue::Boolean(Some(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ScalarValue::Int64(Some(i)))
            } else if let Some(f) = n.as_f64() {
                Ok(ScalarValue::Float64(Some(f)))
            } else {
                Err(RuleError::Internal(format!("unrepresentable number {n}")))
            }
        }
        Value::String(s) => Ok(ScalarValue::Utf8(Some(s.clone()))),
        other => Err(RuleError::TableConstruction(format!(
            "{} values cannot be used as literals",
            json_type_name(other)
        ))),
    }
}

/// Returns the JSON type name of a value, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Null,
    Boolean,
    Integer,
    Decimal,
    Varchar,
}

fn infer_kind(name: &str, values: &[Value]) -> Result<Inferred> {
    let mut kind = Inferred::Null;
    for value in values {
        let next = match value {
            Value::Null => continue,
            Value::Bool(_) => Inferred::Boolean,
            Value::Number(n) if n.is_i64() => Inferred::Integer,
            Value::Number(_) => Inferred::Decimal,
            Value::String(_) => Inferred::Varchar,
            other => {
                return Err(RuleError::TableConstruction(format!(
                    "column '{name}' contains a nested {} value",
                    json_type_name(other)
                )))
            }
        };

        kind = match (kind, next) {
            (Inferred::Null, next) => next,
            (current, next) if current == next => current,
            (Inferred::Integer, Inferred::Decimal) | (Inferred::Decimal, Inferred::Integer) => {
                Inferred::Decimal
            }
            (current, next) => {
                return Err(RuleError::TableConstruction(format!(
                    "column '{name}' mixes {current:?} and {next:?} values"
                )))
            }
        };
    }
    Ok(kind)
}

fn infer_array(name: &str, values: &[Value]) -> Result<ArrayRef> {
    let array: ArrayRef = match infer_kind(name, values)? {
        Inferred::Null => Arc::new(NullArray::new(values.len())),
        Inferred::Boolean => Arc::new(BooleanArray::from(
            values.iter().map(Value::as_bool).collect::<Vec<_>>(),
        )),
        Inferred::Integer => Arc::new(Int64Array::from(
            values.iter().map(Value::as_i64).collect::<Vec<_>>(),
        )),
        Inferred::Decimal => Arc::new(Float64Array::from(
            values.iter().map(Value::as_f64).collect::<Vec<_>>(),
        )),
        Inferred::Varchar => Arc::new(StringArray::from(
            values.iter().map(Value::as_str).collect::<Vec<_>>(),
        )),
    };
    Ok(array)
}
