//! Document - the live, observable DOM
//!
//! A cheap, clonable handle over an arena and its observer registry, shared
//! on a single thread. Every edit goes through here so observers see it.
//!
//! Borrow discipline: no `RefCell` borrow is held while a handler runs, so
//! handlers are free to edit the document, observe, or disconnect.

use serde_json::Value;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::arena::DomArena;
use crate::error::Result;
use crate::observer::{MutationHandler, MutationRecord, ObserveOptions, ObserverId, ObserverRegistry};
use crate::selector::SelectorList;
use crate::serializer::DomSerializer;
use crate::snapshot;
use crate::types::{DomNode, NodeId};

/// Upper bound on batches handed out by one flush. Handlers that keep
/// producing records for each other would otherwise never let it return.
const MAX_DELIVERIES_PER_FLUSH: usize = 10_000;

struct DocumentInner {
    arena: RefCell<DomArena>,
    observers: RefCell<ObserverRegistry>,
}

#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

/// Non-owning handle, for handlers stored inside the document itself
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocumentInner>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Document {
    pub fn new() -> Self {
        Self::from_arena(DomArena::new())
    }

    pub fn from_arena(arena: DomArena) -> Self {
        Self {
            inner: Rc::new(DocumentInner {
                arena: RefCell::new(arena),
                observers: RefCell::new(ObserverRegistry::default()),
            }),
        }
    }

    /// Build from a CDP `DOM.getDocument` response
    pub fn from_cdp(response: &Value) -> Result<Self> {
        Ok(Self::from_arena(snapshot::parse_cdp_document(response)?))
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Read access to the underlying arena.
    ///
    /// Drop the guard before editing the document.
    pub fn arena(&self) -> Ref<'_, DomArena> {
        self.inner.arena.borrow()
    }

    pub fn root_id(&self) -> NodeId {
        self.arena().root_id()
    }

    /// Clone of a node, or `None` if the id is unknown
    pub fn node(&self, node_id: NodeId) -> Option<DomNode> {
        self.arena().get(node_id).ok().cloned()
    }

    pub fn attribute(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.arena()
            .get(node_id)
            .ok()
            .and_then(|node| node.attr(name).map(String::from))
    }

    pub fn style_property(&self, node_id: NodeId, property: &str) -> Option<String> {
        self.arena()
            .get(node_id)
            .ok()
            .and_then(|node| node.style_property(property))
    }

    fn queue(&self, record: MutationRecord) {
        let arena = self.inner.arena.borrow();
        self.inner.observers.borrow_mut().queue_record(&arena, record);
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.arena.borrow_mut().create_element(tag)
    }

    /// Create a detached element with attributes already set
    pub fn create_element_with(&self, tag: &str, attributes: &[(&str, &str)]) -> Result<NodeId> {
        let mut arena = self.inner.arena.borrow_mut();
        let node_id = arena.create_element(tag);
        for (name, value) in attributes {
            arena.set_attribute(node_id, name, value)?;
        }
        Ok(node_id)
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.arena.borrow_mut().create_text(text)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<()> {
        let old_parent = {
            let mut arena = self.inner.arena.borrow_mut();
            let old_parent = arena.get(child)?.parent_id;
            arena.insert_before(parent, child, reference)?;
            old_parent
        };

        if let Some(old_parent) = old_parent {
            self.queue(MutationRecord::child_list(old_parent, &[], &[child]));
        }
        self.queue(MutationRecord::child_list(parent, &[child], &[]));
        Ok(())
    }

    /// Append several nodes in one insertion, like inserting a fragment.
    ///
    /// Observers of `parent` receive a single record listing every node.
    pub fn append_children(&self, parent: NodeId, children: &[NodeId]) -> Result<()> {
        if children.is_empty() {
            return Ok(());
        }

        let mut removals = Vec::new();
        {
            let mut arena = self.inner.arena.borrow_mut();
            for &child in children {
                arena.ensure_insertable(parent, child)?;
            }
            for &child in children {
                if let Some(old_parent) = arena.get(child)?.parent_id {
                    removals.push((old_parent, child));
                }
                arena.append_child(parent, child)?;
            }
        }

        for (old_parent, child) in removals {
            self.queue(MutationRecord::child_list(old_parent, &[], &[child]));
        }
        self.queue(MutationRecord::child_list(parent, children, &[]));
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.inner.arena.borrow_mut().remove_child(parent, child)?;
        self.queue(MutationRecord::child_list(parent, &[], &[child]));
        Ok(())
    }

    pub fn set_attribute(&self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let old_value = self.inner.arena.borrow_mut().set_attribute(node_id, name, value)?;
        self.queue(MutationRecord::attribute(node_id, name, old_value));
        Ok(())
    }

    pub fn remove_attribute(&self, node_id: NodeId, name: &str) -> Result<()> {
        let old_value = self.inner.arena.borrow_mut().remove_attribute(node_id, name)?;
        if old_value.is_some() {
            self.queue(MutationRecord::attribute(node_id, name, old_value));
        }
        Ok(())
    }

    /// Write one inline style property (an edit of the `style` attribute)
    pub fn set_style_property(&self, node_id: NodeId, property: &str, value: &str) -> Result<()> {
        let old_value = self
            .inner
            .arena
            .borrow_mut()
            .set_style_property(node_id, property, value)?;
        self.queue(MutationRecord::attribute(node_id, "style", old_value));
        Ok(())
    }

    pub fn query_selector_all(&self, selectors: &SelectorList) -> Vec<NodeId> {
        self.arena().query_selector_all(selectors)
    }

    pub fn observe(&self, target: NodeId, options: ObserveOptions, handler: MutationHandler) -> ObserverId {
        self.inner
            .observers
            .borrow_mut()
            .observe(target, options, handler)
    }

    /// Stop a registration and drop its queued records. Idempotent.
    pub fn disconnect(&self, observer: ObserverId) -> bool {
        self.inner.observers.borrow_mut().disconnect(observer)
    }

    /// Target of a live registration
    pub fn observed_target(&self, observer: ObserverId) -> Option<NodeId> {
        self.inner.observers.borrow().target_of(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Records queued but not yet delivered, summed over registrations
    pub fn pending_mutations(&self) -> usize {
        self.inner.observers.borrow().pending_records()
    }

    /// Deliver queued records, one batch per registration, until none remain.
    ///
    /// Records produced by handlers during the flush are delivered in the
    /// same flush. Returns the number of batches delivered.
    pub fn flush_mutations(&self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_DELIVERIES_PER_FLUSH {
            let next = self.inner.observers.borrow_mut().take_next_batch();
            let Some((handler, records)) = next else {
                return delivered;
            };
            handler(&records);
            delivered += 1;
        }

        tracing::warn!(
            "Mutation flush stopped after {} deliveries, {} records still pending",
            delivered,
            self.pending_mutations()
        );
        delivered
    }

    /// Indented markup of a subtree
    pub fn to_markup(&self, node_id: NodeId) -> Result<String> {
        DomSerializer::new().serialize(&self.arena(), node_id)
    }

    pub fn node_path(&self, node_id: NodeId) -> Result<String> {
        DomSerializer::new().node_path(&self.arena(), node_id)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.arena().len())
            .field("observers", &*self.inner.observers.borrow())
            .finish()
    }
}
