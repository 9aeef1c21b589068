//! Deduplicated rule collection and its persisted form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{MAX_RULE_DEPTH, Rule};
use crate::error::{Error, Result};

/// Rules keyed by content hash, in insertion order.
///
/// Inserting a rule whose hash is already present does nothing, which is
/// how candidates found through different examples collapse into one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleStore {
    rules: IndexMap<String, Rule>,
}

#[derive(Serialize, Deserialize)]
struct Blob {
    rules: Vec<Rule>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule. Returns `false` if an identical rule was already stored.
    pub fn insert(&mut self, rule: Rule) -> bool {
        if self.rules.contains_key(rule.hash()) {
            return false;
        }
        self.rules.insert(rule.hash().to_string(), rule);
        true
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Serialize to the persisted JSON form.
    ///
    /// Hashes are not written; they are recomputed by [`RuleStore::load`].
    pub fn dump(&self) -> Result<String> {
        let blob = Blob {
            rules: self.rules.values().cloned().collect(),
        };
        Ok(serde_json::to_string(&blob)?)
    }

    /// Parse the persisted JSON form.
    pub fn load(blob: &str) -> Result<Self> {
        let blob: Blob = serde_json::from_str(blob)?;
        let mut store = RuleStore::new();
        for rule in blob.rules {
            if rule.is_empty() {
                return Err(Error::InvalidRule("rule has no frames".to_string()));
            }
            if rule.len() > MAX_RULE_DEPTH {
                return Err(Error::InvalidRule(format!(
                    "rule {} is {} frames deep (limit {MAX_RULE_DEPTH})",
                    rule.id(),
                    rule.len()
                )));
            }
            store.insert(rule);
        }
        Ok(store)
    }
}

impl FromIterator<Rule> for RuleStore {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut store = RuleStore::new();
        for rule in iter {
            store.insert(rule);
        }
        store
    }
}
