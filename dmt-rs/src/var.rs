//! Name → value store.
//!
//! Backs every scope's variable map and the root's constants table.  Lookup
//! order between stores is the scope chain's business; this type is a plain
//! map.

use std::collections::HashMap;

use crate::template::value::Value;

/// Key/value variable store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarStore {
    vars: HashMap<String, Value>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Returns `true` if the variable is set, even to `Null`.
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
}

impl FromIterator<(String, Value)> for VarStore {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { vars: iter.into_iter().collect() }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
