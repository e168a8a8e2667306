//! Name → predicate lookup.

use super::{
    ComparisonOperator, ComparisonPredicate, DuplicationPredicate, MembershipPredicate,
    NullabilityPredicate, Predicate,
};
use crate::prelude::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

static GLOBAL_REGISTRY: Lazy<Arc<PredicateRegistry>> =
    Lazy::new(|| Arc::new(PredicateRegistry::builtin()));

/// Maps stable predicate names to their implementations.
///
/// The registry is populated when it is constructed and is read-only once
/// shared.
///
/// # Examples
///
/// ```rust
/// use term_rules::predicates::PredicateRegistry;
///
/// let registry = PredicateRegistry::builtin();
/// assert!(registry.resolve("is_greater_than").is_ok());
/// assert!(registry.resolve("is_fancy").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    /// Creates a registry with no predicates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in predicate.
    pub fn builtin() -> Self {
        use ComparisonOperator::*;

        let comparisons = [
            ("is_equal_to", Equal),
            ("is_not_equal_to", NotEqual),
            ("is_equal_to_or_both_missing", EqualOrBothMissing),
            (
                "is_not_equal_to_and_not_both_missing",
                NotEqualAndNotBothMissing,
            ),
            ("is_greater_than", GreaterThan),
            ("is_greater_than_or_equal_to", GreaterThanOrEqual),
            ("is_less_than", LessThan),
            ("is_less_than_or_equal_to", LessThanOrEqual),
        ];

        let mut registry = comparisons
            .into_iter()
            .fold(Self::empty(), |registry, (name, op)| {
                registry.with_predicate(ComparisonPredicate::new(name, op))
            });

        registry = registry
            .with_predicate(MembershipPredicate::new("is_in"))
            .with_predicate(DuplicationPredicate::is_unique("is_unique"))
            .with_predicate(DuplicationPredicate::is_duplicated("is_duplicated"))
            .with_predicate(NullabilityPredicate::is_null("is_null"))
            .with_predicate(NullabilityPredicate::is_not_null("is_not_null"));
        registry
    }

    /// Returns the process-wide registry of built-in predicates.
    pub fn global() -> Arc<PredicateRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Adds a predicate under its own name, replacing any previous entry.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        self.predicates
            .insert(predicate.name().to_string(), Arc::new(predicate));
        self
    }

    /// Looks up a predicate by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Predicate>> {
        self.predicates
            .get(name)
            .cloned()
            .ok_or_else(|| RuleError::UnknownPredicate {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
