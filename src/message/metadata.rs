//! Copy-on-write metadata carried alongside a message payload
//!
//! Cloning a [`Metadata`] shares the underlying map; a write through any
//! handle detaches that handle first, so no holder ever observes another
//! holder's mutation. [`Metadata::branch`] produces an explicitly
//! independent copy for fan-out isolation.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Reserved key under which the router records the chain of visited nodes
pub const HISTORY_KEY: &str = "trellis.history";

/// String-keyed metadata map with copy-on-write sharing
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: Arc<HashMap<String, Value>>,
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Insert a value, detaching from any shared storage first
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        Arc::make_mut(&mut self.entries).insert(key.into(), value);
    }

    /// Remove a value, detaching from any shared storage first
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        Arc::make_mut(&mut self.entries).remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Branch-local overlay: a copy with equal content but independent storage
    pub fn branch(&self) -> Metadata {
        Metadata {
            entries: Arc::new((*self.entries).clone()),
        }
    }

    /// Whether two handles are views of the same underlying map
    pub fn shares_storage(&self, other: &Metadata) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Append a node identifier to the routing history list
    pub fn push_history(&mut self, node_id: &str) {
        let entries = Arc::make_mut(&mut self.entries);
        let history = entries
            .entry(HISTORY_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = history {
            items.push(Value::String(node_id.to_string()));
        }
    }

    /// The routing history recorded so far, oldest first
    pub fn history(&self) -> Vec<String> {
        match self.entries.get(HISTORY_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<HashMap<String, Value>> for Metadata {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: Arc::new(iter.into_iter().collect()),
        }
    }
}
