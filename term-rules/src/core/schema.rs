//! Table schemas and their built, runtime-facing form.

use super::{CompiledCheck, DataKind};
use crate::prelude::*;
use arrow::datatypes::DataType;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Declaration of one column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub id: String,
    pub data_type: DataKind,
    pub nullable: bool,
    pub unique: bool,
    pub required: bool,
    pub checks: Vec<Arc<CompiledCheck>>,
}

impl ColumnSpec {
    /// A nullable, non-unique, required column with no checks.
    pub fn new(id: impl Into<String>, data_type: DataKind) -> Self {
        Self {
            id: id.into(),
            data_type,
            nullable: true,
            unique: false,
            required: true,
            checks: Vec::new(),
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_check(mut self, check: CompiledCheck) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn build(&self) -> BuiltColumn {
        BuiltColumn {
            name: self.id.clone(),
            kind: self.data_type,
            data_type: self.data_type.arrow_type(),
            nullable: self.nullable,
            unique: self.unique,
            required: self.required,
            checks: self.checks.clone(),
        }
    }
}

/// Declaration of a table: its columns, composite key and table checks.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnSpec>,
    unique_key: Vec<String>,
    metadata: Map<String, Value>,
    checks: Vec<Arc<CompiledCheck>>,
}

impl TableSchema {
    /// Creates a schema, rejecting duplicate column ids.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (index, column) in columns.iter().enumerate() {
            if !seen.insert(column.id.as_str()) {
                return Err(RuleError::invalid_schema(
                    format!("columns[{index}].id"),
                    format!("duplicate column id '{}'", column.id),
                ));
            }
        }

        Ok(Self {
            name: name.into(),
            columns,
            unique_key: Vec::new(),
            metadata: Map::new(),
            checks: Vec::new(),
        })
    }

    pub fn with_unique_key<I, S>(mut self, key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_key = key.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_check(mut self, check: CompiledCheck) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn unique_key(&self) -> &[String] {
        &self.unique_key
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn checks(&self) -> &[Arc<CompiledCheck>] {
        &self.checks
    }

    /// Translates the declaration into its runtime form.
    ///
    /// Building is pure; the compiled checks are shared, not copied.
    pub fn build(&self) -> BuiltSchema {
        BuiltSchema {
            name: self.name.clone(),
            columns: self.columns.iter().map(ColumnSpec::build).collect(),
            unique_key: self.unique_key.clone(),
            checks: self.checks.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A column as seen by the validation runtime.
#[derive(Debug, Clone)]
pub struct BuiltColumn {
    pub name: String,
    pub kind: DataKind,
    pub data_type: DataType,
    pub nullable: bool,
    pub unique: bool,
    pub required: bool,
    pub checks: Vec<Arc<CompiledCheck>>,
}

/// A schema as seen by the validation runtime.
#[derive(Debug, Clone)]
pub struct BuiltSchema {
    pub name: String,
    pub columns: Vec<BuiltColumn>,
    pub unique_key: Vec<String>,
    pub checks: Vec<Arc<CompiledCheck>>,
    pub metadata: Map<String, Value>,
}

impl BuiltSchema {
    /// Target types for every declared column, in declaration order.
    pub fn cast_targets(&self) -> Vec<(String, DataKind)> {
        self.columns
            .iter()
            .map(|column| (column.name.clone(), column.kind))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&BuiltColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Total number of compiled checks, column and table level.
    pub fn check_count(&self) -> usize {
        self.columns.iter().map(|c| c.checks.len()).sum::<usize>() + self.checks.len()
    }
}
