//! Semantic column types declared in rule configurations.

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The declared type of a column.
///
/// Each kind maps onto a concrete Arrow type that columns are cast to
/// before validation. `Categorical` is stored as `Utf8`: numeric columns
/// cannot be cast to a dictionary type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Date,
    Datetime,
    Boolean,
    Decimal,
    Integer,
    Varchar,
    Categorical,
}

impl DataKind {
    /// All kinds, in configuration order.
    pub const ALL: [DataKind; 7] = [
        DataKind::Date,
        DataKind::Datetime,
        DataKind::Boolean,
        DataKind::Decimal,
        DataKind::Integer,
        DataKind::Varchar,
        DataKind::Categorical,
    ];

    /// Returns the configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Date => "date",
            DataKind::Datetime => "datetime",
            DataKind::Boolean => "boolean",
            DataKind::Decimal => "decimal",
            DataKind::Integer => "integer",
            DataKind::Varchar => "varchar",
            DataKind::Categorical => "categorical",
        }
    }

    /// Returns the Arrow type columns of this kind are cast to.
    pub fn arrow_type(&self) -> DataType {
        match self {
            DataKind::Date => DataType::Date32,
            DataKind::Datetime => DataType::Timestamp(TimeUnit::Microsecond, None),
            DataKind::Boolean => DataType::Boolean,
            DataKind::Decimal => DataType::Float64,
            DataKind::Integer => DataType::Int64,
            DataKind::Varchar | DataKind::Categorical => DataType::Utf8,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let expected: Vec<&str> = DataKind::ALL.iter().map(DataKind::as_str).collect();
                format!(
                    "unknown data type '{s}', expected one of {}",
                    expected.join(", ")
                )
            })
    }
}
