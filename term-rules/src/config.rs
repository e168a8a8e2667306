//! Reading table schemas from JSON configuration.
//!
//! A configuration is a JSON object with the following shape:
//!
//! ```json
//! {
//!   "name": "people",
//!   "columns": [
//!     {
//!       "id": "age",
//!       "data_type": "integer",
//!       "nullable": false,
//!       "unique": false,
//!       "required": true,
//!       "checks": [
//!         {
//!           "check_case": "conjunction",
//!           "expressions": [
//!             {"command": "is_greater_than_or_equal_to", "arg_values": [0]},
//!             {"command": "is_less_than", "arg_values": [150]}
//!           ]
//!         }
//!       ]
//!     }
//!   ],
//!   "ids": ["age"],
//!   "metadata": {"owner": "registry"},
//!   "checks": []
//! }
//! ```
//!
//! A check mapping containing `check_case` is a composite expression with
//! exactly two `expressions`; any other mapping is a simple expression and
//! must name a `command`. Top-level check entries (at the column or table
//! level) may also carry `name`, `error_level` and `error_msg`.
//!
//! Errors point at the offending location with a path such as
//! `columns[0].checks[1].expressions`.

use crate::core::{
    CheckExpression, CheckOptions, ColumnSpec, CompiledCheck, CompositeCheck, Connective,
    DataKind, PredicateRef, Severity, SimpleCheck, TableSchema,
};
use crate::predicates::{Predicate, PredicateRegistry};
use crate::prelude::*;
use crate::table::json_type_name;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Parses configuration into a [`TableSchema`].
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_rules::config::ConfigReader;
///
/// let schema = ConfigReader::new()
///     .parse(&json!({
///         "name": "t",
///         "columns": [{
///             "id": "a", "data_type": "integer",
///             "nullable": true, "unique": false, "required": true
///         }]
///     }))
///     .unwrap();
/// assert_eq!(schema.name(), "t");
/// ```
#[derive(Debug, Clone)]
pub struct ConfigReader {
    registry: Arc<PredicateRegistry>,
    custom: HashMap<String, Arc<dyn Predicate>>,
}

impl Default for ConfigReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigReader {
    /// A reader resolving commands through the global registry.
    pub fn new() -> Self {
        Self::with_registry(PredicateRegistry::global())
    }

    pub fn with_registry(registry: Arc<PredicateRegistry>) -> Self {
        Self {
            registry,
            custom: HashMap::new(),
        }
    }

    /// Makes `name` resolve to a caller-supplied predicate.
    ///
    /// Custom commands take precedence over registry names.
    pub fn with_custom<P>(self, name: impl Into<String>, predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        self.with_custom_arc(name, Arc::new(predicate))
    }

    /// Like [`ConfigReader::with_custom`], for an already shared predicate.
    pub fn with_custom_arc(mut self, name: impl Into<String>, predicate: Arc<dyn Predicate>) -> Self {
        self.custom.insert(name.into(), predicate);
        self
    }

    pub fn registry(&self) -> &Arc<PredicateRegistry> {
        &self.registry
    }

    pub fn from_json_str(&self, json: &str) -> Result<TableSchema> {
        let value: Value = serde_json::from_str(json)?;
        self.parse(&value)
    }

    pub fn from_path(&self, path: impl AsRef<Path>) -> Result<TableSchema> {
        let text = std::fs::read_to_string(path.as_ref())?;
        self.from_json_str(&text)
    }

    /// Parses and compiles a configuration value.
    #[instrument(skip(self, config))]
    pub fn parse(&self, config: &Value) -> Result<TableSchema> {
        let root = Node::root(config).object()?;

        let name = root.field("name")?.string()?;
        let columns = root
            .field("columns")?
            .array()?
            .iter()
            .map(|column| self.parse_column(column))
            .collect::<Result<Vec<_>>>()?;

        let mut schema = TableSchema::new(name, columns)?;

        if let Some(ids) = root.optional("ids") {
            let ids = ids.string_list()?;
            for (index, id) in ids.iter().enumerate() {
                if !schema.columns().iter().any(|column| &column.id == id) {
                    return Err(RuleError::invalid_schema(
                        format!("ids[{index}]"),
                        format!("unknown column '{id}' in unique key"),
                    ));
                }
            }
            schema = schema.with_unique_key(ids);
        }

        if let Some(metadata) = root.optional("metadata") {
            schema = schema.with_metadata(metadata.object()?.map.clone());
        }

        if let Some(checks) = root.optional("checks") {
            for check in checks.array()? {
                schema = schema.with_check(self.parse_check(&check, None)?);
            }
        }

        debug!(
            schema.name = %schema.name(),
            schema.columns = schema.columns().len(),
            schema.checks = schema.checks().len(),
            "Parsed schema configuration"
        );
        Ok(schema)
    }

    fn parse_column(&self, node: &Node<'_>) -> Result<ColumnSpec> {
        let column = node.object()?;
        let id = column.field("id")?.string()?;

        let data_type_node = column.field("data_type")?;
        let data_type: DataKind = data_type_node
            .string()?
            .parse()
            .map_err(|reason| RuleError::invalid_schema(&data_type_node.path, reason))?;

        let mut spec = ColumnSpec::new(&id, data_type)
            .nullable(column.field("nullable")?.boolean()?)
            .unique(column.field("unique")?.boolean()?)
            .required(column.field("required")?.boolean()?);

        if let Some(checks) = column.optional("checks") {
            for check in checks.array()? {
                spec = spec.with_check(self.parse_check(&check, Some(&id))?);
            }
        }
        Ok(spec)
    }

    fn parse_check(&self, node: &Node<'_>, key: Option<&str>) -> Result<CompiledCheck> {
        let entry = node.object()?;
        let expression = self.parse_expression(node)?;

        let mut options = CheckOptions::new();
        if let Some(name) = entry.optional("name") {
            options = options.with_name(name.string()?);
        }
        if let Some(level) = entry.optional("error_level") {
            let severity: Severity = level
                .string()?
                .parse()
                .map_err(|reason| RuleError::invalid_schema(&level.path, reason))?;
            options = options.with_severity(severity);
        }
        if let Some(message) = entry.optional("error_msg") {
            options = options.with_message(message.string()?);
        }

        CompiledCheck::new(&expression, options, &self.registry, key).map_err(|err| match err {
            RuleError::InvalidSchema { path, reason } => {
                RuleError::invalid_schema(&node.path, format!("{path}: {reason}"))
            }
            other => other,
        })
    }

    fn parse_expression(&self, node: &Node<'_>) -> Result<CheckExpression> {
        let entry = node.object()?;

        if let Some(case) = entry.optional("check_case") {
            let connective: Connective = case
                .string()?
                .parse()
                .map_err(|reason| RuleError::invalid_schema(&case.path, reason))?;

            let expressions = entry.field("expressions")?;
            let children = expressions
                .array()?
                .iter()
                .map(|child| self.parse_expression(child))
                .collect::<Result<Vec<_>>>()?;

            let composite = CompositeCheck::new(connective, children).map_err(|err| match err {
                RuleError::InvalidSchema { reason, .. } => {
                    RuleError::invalid_schema(&expressions.path, reason)
                }
                other => other,
            })?;
            return Ok(composite.into());
        }

        let command = entry.field("command")?.string()?;
        let predicate = match self.custom.get(&command) {
            Some(custom) => PredicateRef::Custom(Arc::clone(custom)),
            None => PredicateRef::Named(command),
        };

        let mut simple = SimpleCheck::new(predicate);
        if let Some(subject) = entry.optional("subject") {
            simple = simple.with_subject(subject.string_list()?);
        }
        if let Some(values) = entry.optional("arg_values") {
            simple = simple.with_values(values.array()?.iter().map(|v| v.value.clone()).collect());
        }
        if let Some(columns) = entry.optional("arg_columns") {
            simple = simple.with_columns(columns.string_list()?);
        }
        Ok(simple.into())
    }
}

/// A JSON value together with its location in the configuration.
struct Node<'a> {
    value: &'a Value,
    path: String,
}

/// A JSON object together with its location.
struct ObjectNode<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Node<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    fn mismatch(&self, expected: &str) -> RuleError {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        };
        RuleError::type_mismatch(path, expected, json_type_name(self.value))
    }

    fn object(&self) -> Result<ObjectNode<'a>> {
        self.value
            .as_object()
            .map(|map| ObjectNode {
                map,
                path: self.path.clone(),
            })
            .ok_or_else(|| self.mismatch("object"))
    }

    fn array(&self) -> Result<Vec<Node<'a>>> {
        let items = self.value.as_array().ok_or_else(|| self.mismatch("array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(index, value)| Node {
                value,
                path: format!("{}[{index}]", self.path),
            })
            .collect())
    }

    fn string(&self) -> Result<String> {
        self.value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch("string"))
    }

    fn boolean(&self) -> Result<bool> {
        self.value.as_bool().ok_or_else(|| self.mismatch("boolean"))
    }

    fn string_list(&self) -> Result<Vec<String>> {
        self.array()?.iter().map(Node::string).collect()
    }
}

impl<'a> ObjectNode<'a> {
    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn field(&self, key: &str) -> Result<Node<'a>> {
        self.optional(key)
            .ok_or_else(|| RuleError::missing_key(self.child_path(key)))
    }

    /// Absent keys and explicit `null` are both treated as missing.
    fn optional(&self, key: &str) -> Option<Node<'a>> {
        self.map
            .get(key)
            .filter(|value| !value.is_null())
            .map(|value| Node {
                value,
                path: self.child_path(key),
            })
    }
}
