//! Root detection
//!
//! Decides whether a freshly added node is, or contains, the content root.

use dom::{DomArena, MutationRecord, NodeId};

use crate::config::DEFAULT_ROOT_CLASS_NAMES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDetector {
    class_names: Vec<String>,
}

impl RootDetector {
    pub fn new<I, S>(class_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            class_names: class_names
                .into_iter()
                .map(|name| name.as_ref().to_string())
                .collect(),
        }
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Root element in the inclusive subtree of `node`.
    ///
    /// Classes are tried in configured order; the first class present
    /// anywhere in the subtree decides, and its first element in tree
    /// order is returned. Missing ids and non-element nodes give `None`.
    pub fn find_root(&self, arena: &DomArena, node: Option<NodeId>) -> Option<NodeId> {
        let node_id = node?;
        if !arena.get(node_id).ok()?.is_element() {
            return None;
        }
        arena.find_in_subtree_by_classes(node_id, &self.class_names)
    }

    /// Only `added_nodes[0]` is inspected; later siblings in the same
    /// record are never looked at.
    pub fn detect(&self, arena: &DomArena, record: &MutationRecord) -> Option<NodeId> {
        self.find_root(arena, record.first_added())
    }
}

impl Default for RootDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_CLASS_NAMES)
    }
}
