//! Declarative check expressions and their compiled form.
//!
//! A [`CheckExpression`] is either a [`SimpleCheck`] naming a predicate and
//! its arguments, or a [`CompositeCheck`] combining exactly two
//! sub-expressions with a [`Connective`]. Expressions derive human-readable
//! titles and messages and compile into a [`CompiledExpr`] that evaluates to
//! one boolean outcome per row.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use term_rules::core::{CheckExpression, CompositeCheck, Connective, SimpleCheck};
//!
//! let in_range = CompositeCheck::new(
//!     Connective::Conjunction,
//!     vec![
//!         SimpleCheck::named("is_greater_than_or_equal_to").with_values(vec![json!(0)]).into(),
//!         SimpleCheck::named("is_less_than").with_values(vec![json!(150)]).into(),
//!     ],
//! )
//! .unwrap();
//!
//! let expr = CheckExpression::from(in_range);
//! assert_eq!(expr.title(), "Is greater than or equal to and Is less than");
//! ```

use crate::predicates::{Predicate, PredicateCall, PredicateRegistry};
use crate::prelude::*;
use crate::table::Table;
use arrow::array::BooleanArray;
use arrow::compute::kernels::boolean::{and_kleene, not, or_kleene};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The boolean connective of a composite expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connective {
    /// If the first child holds, the second must hold too.
    Condition,
    /// Both children must hold.
    Conjunction,
    /// At least one child must hold.
    Disjunction,
}

impl Connective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connective::Condition => "condition",
            Connective::Conjunction => "conjunction",
            Connective::Disjunction => "disjunction",
        }
    }

    /// Combines two row outcomes.
    ///
    /// Uses three-valued logic, so a null outcome on one side only decides
    /// the row when the other side already does. `Condition` is material
    /// implication: `NOT first OR second`.
    pub fn apply(&self, first: &BooleanArray, second: &BooleanArray) -> Result<BooleanArray> {
        let combined = match self {
            Connective::Condition => or_kleene(&not(first)?, second)?,
            Connective::Conjunction => and_kleene(first, second)?,
            Connective::Disjunction => or_kleene(first, second)?,
        };
        Ok(combined)
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Connective {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "condition" => Ok(Connective::Condition),
            "conjunction" => Ok(Connective::Conjunction),
            "disjunction" => Ok(Connective::Disjunction),
            other => Err(format!(
                "unknown check_case '{other}', expected one of condition, conjunction, disjunction"
            )),
        }
    }
}

/// Reference to the predicate a simple check runs.
#[derive(Debug, Clone)]
pub enum PredicateRef {
    /// Resolved through the registry when compiled.
    Named(String),
    /// Used verbatim.
    Custom(Arc<dyn Predicate>),
}

impl PredicateRef {
    /// The predicate name used to derive titles.
    pub fn name(&self) -> &str {
        match self {
            PredicateRef::Named(name) => name,
            PredicateRef::Custom(predicate) => predicate.name(),
        }
    }

    /// Returns the implementation, consulting the registry for named
    /// references.
    pub fn resolve(&self, registry: &PredicateRegistry) -> Result<Arc<dyn Predicate>> {
        match self {
            PredicateRef::Named(name) => registry.resolve(name),
            PredicateRef::Custom(predicate) => Ok(Arc::clone(predicate)),
        }
    }
}

impl From<&str> for PredicateRef {
    fn from(name: &str) -> Self {
        PredicateRef::Named(name.to_string())
    }
}

impl From<String> for PredicateRef {
    fn from(name: String) -> Self {
        PredicateRef::Named(name)
    }
}

/// A leaf expression: one predicate applied to subject columns.
#[derive(Debug, Clone)]
pub struct SimpleCheck {
    pub predicate: PredicateRef,
    /// Columns to test; defaults to the column the check is attached to.
    pub subject: Option<Vec<String>>,
    pub arg_values: Option<Vec<Value>>,
    pub arg_columns: Option<Vec<String>>,
}

impl SimpleCheck {
    pub fn new(predicate: PredicateRef) -> Self {
        Self {
            predicate,
            subject: None,
            arg_values: None,
            arg_columns: None,
        }
    }

    /// A check on a registry predicate.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(PredicateRef::Named(name.into()))
    }

    /// A check on a caller-supplied predicate.
    pub fn custom<P>(predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        Self::new(PredicateRef::Custom(Arc::new(predicate)))
    }

    pub fn with_subject<I, S>(mut self, subject: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject = Some(subject.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.arg_values = Some(values);
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// `"is_greater_than"` becomes `"Is greater than"`.
    pub fn title(&self) -> String {
        humanize(self.predicate.name())
    }

    pub fn message(&self) -> String {
        let mut message = match non_empty(&self.subject) {
            Some(subject) => format!(
                "Column(s) {} {}",
                args_text(subject.iter().map(|s| ArgText::Str(s))),
                self.title().to_lowercase()
            ),
            None => format!(
                "The column under validation {}",
                self.title().to_lowercase()
            ),
        };

        if let Some(values) = non_empty(&self.arg_values) {
            message.push(' ');
            message.push_str(&args_text(values.iter().map(ArgText::Json)));
        } else if let Some(columns) = non_empty(&self.arg_columns) {
            message.push(' ');
            message.push_str(&args_text(columns.iter().map(|c| ArgText::Str(c))));
        }
        message
    }

    /// The present arguments as a JSON object.
    pub fn args_summary(&self) -> Value {
        let mut args = Map::new();
        if let Some(subject) = non_empty(&self.subject) {
            args.insert("subject".to_string(), json!(subject));
        }
        if let Some(values) = non_empty(&self.arg_values) {
            args.insert("arg_values".to_string(), Value::Array(values.clone()));
        }
        if let Some(columns) = non_empty(&self.arg_columns) {
            args.insert("arg_columns".to_string(), json!(columns));
        }
        Value::Object(args)
    }

    fn compile(&self, registry: &PredicateRegistry, key: Option<&str>) -> Result<CompiledExpr> {
        let predicate = self.predicate.resolve(registry)?;

        let subject = match (non_empty(&self.subject), key) {
            (Some(subject), _) => subject.clone(),
            (None, Some(key)) => vec![key.to_string()],
            (None, None) => {
                return Err(RuleError::invalid_schema(
                    self.predicate.name(),
                    "a table-level check needs a subject column",
                ))
            }
        };

        let call = PredicateCall {
            subject,
            arg_values: self.arg_values.clone().unwrap_or_default(),
            arg_columns: self.arg_columns.clone().unwrap_or_default(),
        };

        predicate.arity().check(&call).map_err(|reason| {
            RuleError::invalid_schema(
                self.predicate.name(),
                format!("predicate expects {}: {reason}", predicate.arity()),
            )
        })?;

        Ok(CompiledExpr::Leaf { predicate, call })
    }
}

/// A composite expression over exactly two sub-expressions.
#[derive(Debug, Clone)]
pub struct CompositeCheck {
    connective: Connective,
    children: Box<[CheckExpression; 2]>,
}

impl CompositeCheck {
    /// Creates a composite expression.
    ///
    /// Fails with a configuration error unless exactly two children are
    /// given.
    pub fn new(connective: Connective, children: Vec<CheckExpression>) -> Result<Self> {
        let children: [CheckExpression; 2] = children.try_into().map_err(|rest: Vec<_>| {
            RuleError::invalid_schema(
                "expressions",
                format!(
                    "a {connective} takes exactly 2 expressions, got {}",
                    rest.len()
                ),
            )
        })?;
        Ok(Self {
            connective,
            children: Box::new(children),
        })
    }

    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn children(&self) -> &[CheckExpression; 2] {
        &self.children
    }

    pub fn title(&self) -> String {
        let [first, second] = self.children.as_ref();
        match self.connective {
            Connective::Condition => format!("When {}, Then {}", first.title(), second.title()),
            Connective::Conjunction => format!("{} and {}", first.title(), second.title()),
            Connective::Disjunction => format!("{} or {}", first.title(), second.title()),
        }
    }

    pub fn message(&self) -> String {
        let [first, second] = self.children.as_ref();
        match self.connective {
            Connective::Condition => {
                format!("When {} Then {}", first.message(), second.message())
            }
            Connective::Conjunction => format!("{} and {}", first.message(), second.message()),
            Connective::Disjunction => format!("{} or {}", first.message(), second.message()),
        }
    }
}

/// A check expression: a leaf or a composite of two expressions.
#[derive(Debug, Clone)]
pub enum CheckExpression {
    Simple(SimpleCheck),
    Composite(CompositeCheck),
}

impl CheckExpression {
    /// The human-readable title.
    pub fn title(&self) -> String {
        match self {
            CheckExpression::Simple(simple) => simple.title(),
            CheckExpression::Composite(composite) => composite.title(),
        }
    }

    /// The human-readable description of what must hold.
    pub fn message(&self) -> String {
        match self {
            CheckExpression::Simple(simple) => simple.message(),
            CheckExpression::Composite(composite) => composite.message(),
        }
    }

    /// The arguments of the expression: an object for a leaf, an array of
    /// the children's summaries for a composite.
    pub fn args_summary(&self) -> Value {
        match self {
            CheckExpression::Simple(simple) => simple.args_summary(),
            CheckExpression::Composite(composite) => Value::Array(
                composite
                    .children
                    .iter()
                    .map(CheckExpression::args_summary)
                    .collect(),
            ),
        }
    }

    /// Compiles the expression.
    ///
    /// Every named predicate is resolved through `registry` and its
    /// arguments are checked against the predicate's arity. Leaves without
    /// an explicit subject are bound to `key`, the column the check is
    /// attached to; table-level checks pass `None`.
    pub fn compile(&self, registry: &PredicateRegistry, key: Option<&str>) -> Result<CompiledExpr> {
        match self {
            CheckExpression::Simple(simple) => simple.compile(registry, key),
            CheckExpression::Composite(composite) => {
                let [first, second] = composite.children.as_ref();
                Ok(CompiledExpr::Node {
                    connective: composite.connective,
                    children: Box::new([
                        first.compile(registry, key)?,
                        second.compile(registry, key)?,
                    ]),
                })
            }
        }
    }
}

impl From<SimpleCheck> for CheckExpression {
    fn from(simple: SimpleCheck) -> Self {
        CheckExpression::Simple(simple)
    }
}

impl From<CompositeCheck> for CheckExpression {
    fn from(composite: CompositeCheck) -> Self {
        CheckExpression::Composite(composite)
    }
}

/// An executable expression tree.
#[derive(Debug, Clone)]
pub enum CompiledExpr {
    Leaf {
        predicate: Arc<dyn Predicate>,
        call: PredicateCall,
    },
    Node {
        connective: Connective,
        children: Box<[CompiledExpr; 2]>,
    },
}

impl CompiledExpr {
    /// Evaluates the expression for every row of the table.
    pub fn evaluate(&self, table: &Table) -> Result<BooleanArray> {
        match self {
            CompiledExpr::Leaf { predicate, call } => predicate.evaluate(table, call),
            CompiledExpr::Node {
                connective,
                children,
            } => {
                let [first, second] = children.as_ref();
                let first = first.evaluate(table)?;
                let second = second.evaluate(table)?;
                connective.apply(&first, &second)
            }
        }
    }

    /// Every column the expression reads.
    pub fn referenced_columns(&self) -> BTreeSet<String> {
        let mut columns = BTreeSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    /// Subject columns of all leaves, in first-seen order.
    pub fn subject_columns(&self) -> Vec<String> {
        let mut subjects = Vec::new();
        self.collect_subjects(&mut subjects);
        subjects
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            CompiledExpr::Leaf { call, .. } => {
                out.extend(call.referenced_columns().map(str::to_string));
            }
            CompiledExpr::Node { children, .. } => {
                children.iter().for_each(|child| child.collect_columns(out));
            }
        }
    }

    fn collect_subjects(&self, out: &mut Vec<String>) {
        match self {
            CompiledExpr::Leaf { call, .. } => {
                for column in &call.subject {
                    if !out.contains(column) {
                        out.push(column.clone());
                    }
                }
            }
            CompiledExpr::Node { children, .. } => {
                children.iter().for_each(|child| child.collect_subjects(out));
            }
        }
    }
}

fn non_empty<T>(items: &Option<Vec<T>>) -> Option<&Vec<T>> {
    items.as_ref().filter(|items| !items.is_empty())
}

fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

enum ArgText<'a> {
    Str(&'a str),
    Json(&'a Value),
}

impl ArgText<'_> {
    /// The bare text, used when a single argument is quoted.
    fn bare(&self) -> String {
        match self {
            ArgText::Str(s) => (*s).to_string(),
            ArgText::Json(Value::String(s)) => s.clone(),
            ArgText::Json(other) => other.to_string(),
        }
    }

    /// The list-literal form: strings single-quoted, other values as-is.
    fn literal(&self) -> String {
        match self {
            ArgText::Str(s) => format!("'{s}'"),
            ArgText::Json(Value::String(s)) => format!("'{s}'"),
            ArgText::Json(other) => other.to_string(),
        }
    }
}

/// A single argument is quoted (`"v"`), several render as a list literal
/// (`['a', 'b']`, `[1, 2]`).
fn args_text<'a, I>(args: I) -> String
where
    I: IntoIterator<Item = ArgText<'a>>,
{
    let args: Vec<ArgText<'a>> = args.into_iter().collect();
    match args.as_slice() {
        [single] => format!("\"{}\"", single.bare()),
        many => format!(
            "[{}]",
            many.iter()
                .map(ArgText::literal)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::false_positions;
    use serde_json::json;

    fn simple(name: &str) -> SimpleCheck {
        SimpleCheck::named(name)
    }

    fn table(value: Value) -> Table {
        Table::from_rows(value.as_object().unwrap()).unwrap()
    }

    #[test]
    fn test_simple_title() {
        assert_eq!(simple("test_command").title(), "Test command");
        assert_eq!(simple("is_greater_than").title(), "Is greater than");
    }

    #[test]
    fn test_simple_message_with_single_subject() {
        let check = simple("is_not_null").with_subject(["c"]);
        assert_eq!(check.message(), "Column(s) \"c\" is not null");
    }

    #[test]
    fn test_simple_message_with_many_subjects() {
        let check = simple("test_command").with_subject(["column1", "column2"]);
        assert_eq!(
            check.message(),
            "Column(s) ['column1', 'column2'] test command"
        );
    }

    #[test]
    fn test_simple_message_with_values() {
        let check = simple("test_command").with_values(vec![json!(1), json!(2), json!(3)]);
        assert_eq!(
            check.message(),
            "The column under validation test command [1, 2, 3]"
        );

        let single = simple("is_less_than").with_values(vec![json!(150)]);
        assert_eq!(
            single.message(),
            "The column under validation is less than \"150\""
        );
    }

    #[test]
    fn test_simple_message_with_columns() {
        let check = simple("test_command").with_columns(["col1", "col2"]);
        assert_eq!(
            check.message(),
            "The column under validation test command ['col1', 'col2']"
        );
    }

    #[test]
    fn test_args_summary() {
        let check = simple("test_command")
            .with_subject(["column1"])
            .with_values(vec![json!(1), json!(2)])
            .with_columns(["col1"]);
        assert_eq!(
            check.args_summary(),
            json!({"subject": ["column1"], "arg_values": [1, 2], "arg_columns": ["col1"]})
        );

        let composite = CompositeCheck::new(
            Connective::Conjunction,
            vec![
                simple("a").with_values(vec![json!(1)]).into(),
                simple("b").into(),
            ],
        )
        .unwrap();
        assert_eq!(
            CheckExpression::from(composite).args_summary(),
            json!([{"arg_values": [1]}, {}])
        );
    }

    #[test]
    fn test_composite_titles_and_messages() {
        let child = || CheckExpression::from(simple("test_command").with_subject(["column1"]));

        let conjunction =
            CompositeCheck::new(Connective::Conjunction, vec![child(), child()]).unwrap();
        assert_eq!(conjunction.title(), "Test command and Test command");
        assert_eq!(
            conjunction.message(),
            "Column(s) \"column1\" test command and Column(s) \"column1\" test command"
        );

        let disjunction =
            CompositeCheck::new(Connective::Disjunction, vec![child(), child()]).unwrap();
        assert_eq!(disjunction.title(), "Test command or Test command");

        let condition = CompositeCheck::new(Connective::Condition, vec![child(), child()]).unwrap();
        assert_eq!(condition.title(), "When Test command, Then Test command");
        assert_eq!(
            condition.message(),
            "When Column(s) \"column1\" test command Then Column(s) \"column1\" test command"
        );
    }

    #[test]
    fn test_composite_arity() {
        for connective in [
            Connective::Condition,
            Connective::Conjunction,
            Connective::Disjunction,
        ] {
            for count in [0, 1, 3] {
                let children = (0..count)
                    .map(|_| CheckExpression::from(simple("is_null")))
                    .collect();
                let err = CompositeCheck::new(connective, children).unwrap_err();
                assert!(err.is_config_error());
                assert_eq!(err.kind(), "schema-validation");
            }
        }
    }

    #[test]
    fn test_compile_unknown_predicate() {
        let expr = CheckExpression::from(simple("is_fancy"));
        let err = expr
            .compile(&PredicateRegistry::builtin(), Some("a"))
            .unwrap_err();
        assert!(matches!(err, RuleError::UnknownPredicate { .. }));
    }

    #[test]
    fn test_compile_checks_arity() {
        let expr = CheckExpression::from(simple("is_null").with_values(vec![json!(1)]));
        let err = expr
            .compile(&PredicateRegistry::builtin(), Some("a"))
            .unwrap_err();
        assert_eq!(err.kind(), "schema-validation");
    }

    #[test]
    fn test_compile_table_level_needs_subject() {
        let expr = CheckExpression::from(simple("is_null"));
        assert!(expr.compile(&PredicateRegistry::builtin(), None).is_err());
        assert!(expr.compile(&PredicateRegistry::builtin(), Some("a")).is_ok());
    }

    #[test]
    fn test_condition_is_material_implication() {
        let t = table(json!({"kind": ["a", "a", "b", "b"], "value": [1, 2, 1, 2]}));
        let condition = CompositeCheck::new(
            Connective::Condition,
            vec![
                simple("is_equal_to")
                    .with_subject(["kind"])
                    .with_values(vec![json!("a")])
                    .into(),
                simple("is_equal_to")
                    .with_subject(["value"])
                    .with_values(vec![json!(1)])
                    .into(),
            ],
        )
        .unwrap();

        let compiled = CheckExpression::from(condition)
            .compile(&PredicateRegistry::builtin(), None)
            .unwrap();
        let mask = compiled.evaluate(&t).unwrap();
        assert_eq!(false_positions(&mask), vec![1]);
        assert_eq!(
            compiled.referenced_columns().into_iter().collect::<Vec<_>>(),
            vec!["kind", "value"]
        );
        assert_eq!(compiled.subject_columns(), vec!["kind", "value"]);
    }

    #[test]
    fn test_nested_composite_evaluation() {
        let t = table(json!({"age": [2, 30, null, -5, 150, 45, 50]}));
        let range = CompositeCheck::new(
            Connective::Conjunction,
            vec![
                simple("is_greater_than_or_equal_to")
                    .with_values(vec![json!(0)])
                    .into(),
                simple("is_less_than").with_values(vec![json!(150)]).into(),
            ],
        )
        .unwrap();
        let allow_fifty = CompositeCheck::new(
            Connective::Disjunction,
            vec![
                range.into(),
                simple("is_equal_to").with_values(vec![json!(150)]).into(),
            ],
        )
        .unwrap();

        let compiled = CheckExpression::from(allow_fifty)
            .compile(&PredicateRegistry::builtin(), Some("age"))
            .unwrap();
        assert_eq!(false_positions(&compiled.evaluate(&t).unwrap()), vec![3]);
    }

    #[test]
    fn test_custom_predicate_bypasses_registry() {
        let t = table(json!({"a": [1, 2]}));
        let always_false = crate::predicates::FnPredicate::new("never", |table, _| {
            Ok(BooleanArray::from(vec![false; table.num_rows()]))
        });
        let expr = CheckExpression::from(SimpleCheck::custom(always_false));
        assert_eq!(expr.title(), "Never");

        let compiled = expr.compile(&PredicateRegistry::empty(), Some("a")).unwrap();
        assert_eq!(false_positions(&compiled.evaluate(&t).unwrap()), vec![0, 1]);
    }

    #[test]
    fn test_connective_parse() {
        assert_eq!(
            "condition".parse::<Connective>().unwrap(),
            Connective::Condition
        );
        assert!("implication".parse::<Connective>().is_err());
    }
}
