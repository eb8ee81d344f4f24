//! Arena-based DOM tree storage
//!
//! All nodes live in one `Vec`, addressed by [`NodeId`]. Detached nodes stay
//! in the arena (like DOM nodes that are no longer connected) and can be
//! re-inserted later. Node 0 is always the document node.
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [#document][html][body]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```
//!
//! The arena knows nothing about observers; [`Document`](crate::Document)
//! wraps it and turns structural edits into mutation records.

use crate::error::{DomError, Result};
use crate::selector::SelectorList;
use crate::style;
use crate::types::{DomNode, NodeId, NodeType};

#[derive(Debug, Clone)]
pub struct DomArena {
    nodes: Vec<DomNode>,
}

impl DomArena {
    /// Create an arena holding only the document node
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(DomNode::new(0, NodeType::Document, "#document"));
        Self { nodes }
    }

    /// The document node
    pub fn root_id(&self) -> NodeId {
        0
    }

    /// Add a detached node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        node.parent_id = None;
        node.children_ids.clear();
        self.nodes.push(node);
        node_id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.add_node(DomNode::new(0, NodeType::Element, tag))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        let mut node = DomNode::new(0, NodeType::Text, "#text");
        node.node_value = text.to_string();
        self.add_node(node)
    }

    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Raw mutable access. Edits made here are invisible to observers.
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        (node_id as usize) < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Only the document node is present
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, node_id: NodeId) -> Result<Vec<&DomNode>> {
        let node = self.get(node_id)?;
        node.children_ids
            .iter()
            .map(|&child_id| self.get(child_id))
            .collect()
    }

    /// `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).ok().and_then(|n| n.parent_id);
        }
        false
    }

    /// Reachable from the document node
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.contains(node_id) && self.is_inclusive_ancestor(self.root_id(), node_id)
    }

    pub(crate) fn ensure_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.get(parent)?;
        let child_node = self.get(child)?;

        if !matches!(
            parent_node.node_type,
            NodeType::Element | NodeType::Document | NodeType::DocumentFragment
        ) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} ({}) cannot have children",
                parent, parent_node.node_name
            )));
        }
        if child_node.node_type == NodeType::Document {
            return Err(DomError::HierarchyRequest(
                "the document node cannot be inserted".to_string(),
            ));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(format!(
                "inserting node {} under {} would create a cycle",
                child, parent
            )));
        }
        Ok(())
    }

    /// Remove `child` from its current parent, returning that parent
    pub fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>> {
        let old_parent = self.get(child)?.parent_id;
        if let Some(parent) = old_parent {
            self.get_mut(parent)?.children_ids.retain(|id| *id != child);
            self.get_mut(child)?.parent_id = None;
        }
        Ok(old_parent)
    }

    /// Insert `child` under `parent` before `reference` (or at the end).
    ///
    /// The child is detached from any previous parent first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.ensure_insertable(parent, child)?;
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if self.get(reference)?.parent_id != Some(parent) {
                return Err(DomError::HierarchyRequest(format!(
                    "node {} is not a child of {}",
                    reference, parent
                )));
            }
        }

        self.detach(child)?;
        let parent_node = self.get_mut(parent)?;
        let index = reference
            .and_then(|r| parent_node.children_ids.iter().position(|id| *id == r))
            .unwrap_or(parent_node.children_ids.len());
        parent_node.children_ids.insert(index, child);
        self.get_mut(child)?.parent_id = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.get(child)?.parent_id != Some(parent) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is not a child of {}",
                child, parent
            )));
        }
        self.detach(child)?;
        Ok(())
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute(
        &mut self,
        node_id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let node = self.get_mut(node_id)?;
        if !node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: "Element".to_string(),
                actual: format!("{:?}", node.node_type),
            });
        }
        Ok(node.attributes.insert(name.to_string(), value.to_string()))
    }

    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.get_mut(node_id)?.attributes.remove(name))
    }

    /// Set one inline style property, returning the previous `style` attribute
    pub fn set_style_property(
        &mut self,
        node_id: NodeId,
        property: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let current = self.get(node_id)?.attr("style").unwrap_or("").to_string();
        let updated = style::set_property(&current, property, value);
        self.set_attribute(node_id, "style", &updated)
    }

    /// Traverse tree depth-first (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Inclusive subtree of `start_id` in tree order
    pub fn subtree(&self, start_id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        // A missing start node yields an empty subtree
        let _ = self.traverse_df(start_id, |node| {
            ids.push(node.node_id);
            Ok(())
        });
        ids
    }

    /// First element in the inclusive subtree of `start_id` carrying `class_name`
    pub fn find_in_subtree_by_class(&self, start_id: NodeId, class_name: &str) -> Option<NodeId> {
        self.find_in_subtree_by_classes(start_id, &[class_name])
    }

    /// First element carrying the earliest of `class_names` present in the
    /// inclusive subtree of `start_id`.
    ///
    /// One depth-first walk records the first hit per class and stops as
    /// soon as the first class is found, since nothing can beat it.
    pub fn find_in_subtree_by_classes<S>(&self, start_id: NodeId, class_names: &[S]) -> Option<NodeId>
    where
        S: AsRef<str>,
    {
        let mut hits: Vec<Option<NodeId>> = vec![None; class_names.len()];
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let Ok(node) = self.get(node_id) else {
                continue;
            };
            if node.is_element() {
                for (hit, class_name) in hits.iter_mut().zip(class_names) {
                    if hit.is_none() && node.has_class(class_name.as_ref()) {
                        *hit = Some(node_id);
                    }
                }
                if hits.first().is_some_and(Option::is_some) {
                    break;
                }
            }
            stack.extend(node.children_ids.iter().rev().copied());
        }

        hits.into_iter().flatten().next()
    }

    /// Connected elements matching `selectors`, in document order, no duplicates
    pub fn query_selector_all(&self, selectors: &SelectorList) -> Vec<NodeId> {
        if selectors.is_empty() {
            return Vec::new();
        }
        self.subtree(self.root_id())
            .into_iter()
            .filter(|&id| selectors.matches(self, id))
            .collect()
    }

    /// Find nodes matching predicate, connected or not
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.nodes
            .iter()
            .filter(|node| predicate(node))
            .map(|node| node.node_id)
            .collect()
    }

    /// Find all elements by tag name
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.find(|node| node.is_element() && node.node_name.eq_ignore_ascii_case(tag))
    }

    /// Concatenated text of all descendant text nodes, trimmed
    pub fn text_content(&self, node_id: NodeId) -> Result<String> {
        let mut text = String::new();
        self.traverse_df(node_id, |node| {
            if node.is_text() {
                text.push_str(&node.node_value);
            }
            Ok(())
        })?;
        Ok(text.trim().to_string())
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_starts_with_document() {
        let arena = DomArena::new();
        assert!(arena.is_empty());
        assert_eq!(arena.get(arena.root_id()).unwrap().node_type, NodeType::Document);
    }

    #[test]
    fn test_append_and_reparent() {
        let mut arena = DomArena::new();
        let root = arena.root_id();
        let a = arena.create_element("div");
        let b = arena.create_element("div");
        let c = arena.create_element("span");

        arena.append_child(root, a).unwrap();
        arena.append_child(root, b).unwrap();
        arena.append_child(a, c).unwrap();
        assert_eq!(arena.get(c).unwrap().parent_id, Some(a));

        // Moving c under b removes it from a
        arena.append_child(b, c).unwrap();
        assert!(arena.get(a).unwrap().children_ids.is_empty());
        assert_eq!(arena.get(b).unwrap().children_ids.as_slice(), &[c]);
    }

    #[test]
    fn test_insert_before() {
        let mut arena = DomArena::new();
        let root = arena.root_id();
        let a = arena.create_element("a");
        let b = arena.create_element("b");
        let c = arena.create_element("c");
        arena.append_child(root, a).unwrap();
        arena.append_child(root, c).unwrap();
        arena.insert_before(root, b, Some(c)).unwrap();

        let names: Vec<_> = arena
            .children(root)
            .unwrap()
            .iter()
            .map(|n| n.node_name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycles_rejected() {
        let mut arena = DomArena::new();
        let a = arena.create_element("div");
        let b = arena.create_element("div");
        arena.append_child(a, b).unwrap();

        assert!(matches!(
            arena.append_child(b, a),
            Err(DomError::HierarchyRequest(_))
        ));
        assert!(matches!(
            arena.append_child(a, a),
            Err(DomError::HierarchyRequest(_))
        ));
    }

    #[test]
    fn test_text_nodes_cannot_have_children() {
        let mut arena = DomArena::new();
        let text = arena.create_text("hello");
        let div = arena.create_element("div");
        assert!(arena.append_child(text, div).is_err());
        assert!(arena.set_attribute(text, "dir", "auto").is_err());
    }

    #[test]
    fn test_find_in_subtree_by_class_is_inclusive() {
        let mut arena = DomArena::new();
        let outer = arena.create_element("div");
        arena.set_attribute(outer, "class", "frame notion-page-content").unwrap();
        let inner = arena.create_element("div");
        arena.set_attribute(inner, "class", "notion-page-content").unwrap();
        arena.append_child(outer, inner).unwrap();

        assert_eq!(arena.find_in_subtree_by_class(outer, "notion-page-content"), Some(outer));
        assert_eq!(arena.find_in_subtree_by_class(inner, "notion-page-content"), Some(inner));
        assert_eq!(arena.find_in_subtree_by_class(outer, "frame"), Some(outer));
        assert_eq!(arena.find_in_subtree_by_class(inner, "frame"), None);
    }

    #[test]
    fn test_find_in_subtree_by_classes_prefers_earlier_class() {
        let mut arena = DomArena::new();
        let frame = arena.create_element("div");
        let board = arena.create_element("div");
        arena.set_attribute(board, "class", "board").unwrap();
        let table = arena.create_element("div");
        arena.set_attribute(table, "class", "table").unwrap();
        let second_table = arena.create_element("div");
        arena.set_attribute(second_table, "class", "table board").unwrap();
        arena.append_child(frame, board).unwrap();
        arena.append_child(frame, table).unwrap();
        arena.append_child(frame, second_table).unwrap();

        assert_eq!(arena.find_in_subtree_by_classes(frame, &["table", "board"]), Some(table));
        assert_eq!(arena.find_in_subtree_by_classes(frame, &["missing", "board"]), Some(board));
        assert_eq!(arena.find_in_subtree_by_classes(frame, &["missing"]), None);
        assert_eq!(arena.find_in_subtree_by_classes::<&str>(frame, &[]), None);
    }

    #[test]
    fn test_query_selector_all_skips_detached() {
        let mut arena = DomArena::new();
        let root = arena.root_id();
        let attached = arena.create_element("h1");
        let detached = arena.create_element("h1");
        arena.append_child(root, attached).unwrap();

        let list = SelectorList::parse("h1").unwrap();
        assert_eq!(arena.query_selector_all(&list), vec![attached]);
        assert!(!arena.is_connected(detached));
    }

    #[test]
    fn test_traverse_df_order() {
        let mut arena = DomArena::new();
        let root = arena.root_id();
        let div = arena.create_element("div");
        let first = arena.create_element("span");
        let second = arena.create_element("p");
        arena.append_child(root, div).unwrap();
        arena.append_child(div, first).unwrap();
        arena.append_child(div, second).unwrap();

        let mut visited = Vec::new();
        arena
            .traverse_df(div, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["div", "span", "p"]);
    }

    #[test]
    fn test_style_property_roundtrip_through_attribute() {
        let mut arena = DomArena::new();
        let div = arena.create_element("div");
        arena.set_attribute(div, "style", "color: red").unwrap();
        arena.set_style_property(div, "text-align", "start").unwrap();

        let node = arena.get(div).unwrap();
        assert_eq!(node.style_property("text-align").as_deref(), Some("start"));
        assert_eq!(node.style_property("color").as_deref(), Some("red"));
    }

    #[test]
    fn test_text_content() {
        let mut arena = DomArena::new();
        let p = arena.create_element("p");
        let a = arena.create_text("  שלום ");
        let b = arena.create_text("world ");
        arena.append_child(p, a).unwrap();
        arena.append_child(p, b).unwrap();
        assert_eq!(arena.text_content(p).unwrap(), "שלום world");
    }
}
