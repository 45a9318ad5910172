//! Read-only environment table exposed to scripts through `env(name)`.
//!
//! Distinct from native globals: environment entries are never installed as
//! script globals, they are only reachable through the bridge dispatcher.

use std::collections::HashMap;

use serde_json::Value;

/// String-keyed table of JSON-like values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) an entry.  Only used while building the table;
    /// contexts hold environments behind an `Arc` and never mutate them.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builder form of [`Environment::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Look up an entry the way the `env` bridge operation does: an empty
    /// name or an empty table yields `None` without probing.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if name.is_empty() || self.vars.is_empty() {
            return None;
        }
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Merge `other` into `self`; entries in `other` win.
    pub fn extend(&mut self, other: Environment) {
        self.vars.extend(other.vars);
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
