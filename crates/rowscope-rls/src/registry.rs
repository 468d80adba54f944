//! Scope registry and per-call activation.
//!
//! The registry maps scope keys to rule implementations. It is populated
//! once at process start and only read afterwards. [`ScopeRegistry::activate`]
//! snapshots an ordered rule list into a [`ScopeActivation`] which exactly
//! one rewrite call then consumes by value; because the activation moves
//! into that call, a scope selection can never leak into a later, unrelated
//! statement on a reused execution context.

use std::collections::HashMap;
use std::sync::Arc;

use crate::rules::ScopeRule;

/// Key-indexed collection of registered scope rules.
#[derive(Default, Clone)]
pub struct ScopeRegistry {
    rules: HashMap<String, Arc<dyn ScopeRule>>,
}

impl ScopeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule under its key.
    ///
    /// A later registration with the same key replaces the earlier one.
    pub fn register(&mut self, rule: Arc<dyn ScopeRule>) {
        let key = rule.key().to_string();
        if self.rules.insert(key.clone(), rule).is_some() {
            tracing::debug!(key, "scope rule replaced");
        }
    }

    /// Look up a rule by key.
    pub fn get(&self, key: &str) -> Option<Arc<dyn ScopeRule>> {
        self.rules.get(key).cloned()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Snapshot the rules for `keys`, preserving order.
    ///
    /// Keys without a registered rule are skipped.
    pub fn activate<I, K>(&self, keys: I) -> ScopeActivation
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut rules = Vec::new();
        for key in keys {
            let key = key.as_ref();
            match self.rules.get(key) {
                Some(rule) => rules.push(Arc::clone(rule)),
                None => tracing::debug!(key, "unknown scope key ignored"),
            }
        }
        ScopeActivation { rules }
    }
}

/// The ordered scope selection for one rewrite call.
///
/// Consumed by value by the injection entry point, so that rewriting and
/// clearing the selection are a single step: after the call the selection is
/// gone, and a subsequent statement on the same execution context runs
/// unfiltered unless explicitly activated again.
#[derive(Default)]
pub struct ScopeActivation {
    rules: Vec<Arc<dyn ScopeRule>>,
}

impl ScopeActivation {
    /// Build an activation directly from rules, bypassing the registry.
    pub fn from_rules(rules: Vec<Arc<dyn ScopeRule>>) -> Self {
        Self { rules }
    }

    /// Whether no rule is active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn into_rules(self) -> Vec<Arc<dyn ScopeRule>> {
        self.rules
    }
}
