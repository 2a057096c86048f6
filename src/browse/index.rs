//! Path-labelled indexes of directories and variables

use crate::types::PathEntry;
use std::collections::HashMap;

/// Ordered `path label -> node id` index with last-write-wins semantics
///
/// Entries keep the position of their first insertion; inserting an existing
/// label again only replaces the node id.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    entries: Vec<PathEntry>,
    by_label: HashMap<String, usize>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `path_label`. Returns the previous node id.
    pub fn insert(&mut self, path_label: &str, node_id: &str) -> Option<String> {
        match self.by_label.get(path_label) {
            Some(&i) => {
                let previous = std::mem::replace(&mut self.entries[i].node_id, node_id.to_string());
                Some(previous)
            }
            None => {
                self.by_label.insert(path_label.to_string(), self.entries.len());
                self.entries.push(PathEntry::new(path_label, node_id));
                None
            }
        }
    }

    /// Node id stored under `path_label`
    pub fn get(&self, path_label: &str) -> Option<&str> {
        self.by_label
            .get(path_label)
            .map(|&i| self.entries[i].node_id.as_str())
    }

    pub fn contains(&self, path_label: &str) -> bool {
        self.by_label.contains_key(path_label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.iter()
    }

    /// Labels in insertion order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path_label.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_label.clear();
    }

    /// Entries sorted by path label, for stable listings
    pub fn sorted(&self) -> Vec<PathEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.path_label.cmp(&b.path_label));
        entries
    }
}

impl FromIterator<PathEntry> for PathIndex {
    fn from_iter<I: IntoIterator<Item = PathEntry>>(iter: I) -> Self {
        let mut index = PathIndex::new();
        for entry in iter {
            index.insert(&entry.path_label, &entry.node_id);
        }
        index
    }
}
