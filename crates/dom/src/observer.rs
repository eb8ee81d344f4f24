//! Mutation observation
//!
//! Each registration owns a record queue. Edits made through
//! [`Document`](crate::Document) append records to every interested queue;
//! [`Document::flush_mutations`](crate::Document::flush_mutations) later hands
//! each queue to its handler as one batch, the way a browser delivers
//! `MutationObserver` callbacks at a microtask checkpoint.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

use crate::arena::DomArena;
use crate::types::NodeId;

pub type ObserverId = u64;

/// Callback receiving one delivered batch
pub type MutationHandler = Rc<dyn Fn(&[MutationRecord])>;

/// Which changes a registration wants to hear about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
}

impl ObserveOptions {
    /// Structural changes anywhere below the target
    pub fn wide() -> Self {
        Self {
            child_list: true,
            attributes: false,
            subtree: true,
        }
    }

    /// Structural changes to the target's direct children only
    pub fn narrow() -> Self {
        Self {
            child_list: true,
            attributes: false,
            subtree: false,
        }
    }

    pub fn with_attributes(mut self) -> Self {
        self.attributes = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    ChildList,
    Attributes,
}

/// One observed change. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added_nodes: SmallVec<[NodeId; 4]>,
    pub removed_nodes: SmallVec<[NodeId; 4]>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    pub fn child_list(target: NodeId, added: &[NodeId], removed: &[NodeId]) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes: SmallVec::from_slice(added),
            removed_nodes: SmallVec::from_slice(removed),
            attribute_name: None,
            old_value: None,
        }
    }

    pub fn attribute(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            added_nodes: SmallVec::new(),
            removed_nodes: SmallVec::new(),
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }

    /// First added node, the only one root detection ever looks at
    pub fn first_added(&self) -> Option<NodeId> {
        self.added_nodes.first().copied()
    }
}

struct Registration {
    id: ObserverId,
    target: NodeId,
    options: ObserveOptions,
    handler: MutationHandler,
    queue: Vec<MutationRecord>,
}

impl Registration {
    fn wants(&self, arena: &DomArena, record: &MutationRecord) -> bool {
        let kind_ok = match record.kind {
            MutationKind::ChildList => self.options.child_list,
            MutationKind::Attributes => self.options.attributes,
        };
        if !kind_ok {
            return false;
        }
        record.target == self.target
            || (self.options.subtree && arena.is_inclusive_ancestor(self.target, record.target))
    }
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: ObserverId,
    registrations: Vec<Registration>,
}

impl ObserverRegistry {
    pub(crate) fn observe(
        &mut self,
        target: NodeId,
        options: ObserveOptions,
        handler: MutationHandler,
    ) -> ObserverId {
        self.next_id += 1;
        let id = self.next_id;
        self.registrations.push(Registration {
            id,
            target,
            options,
            handler,
            queue: Vec::new(),
        });
        id
    }

    /// Drop a registration and its queued records. Unknown ids are ignored.
    pub(crate) fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        before != self.registrations.len()
    }

    pub(crate) fn target_of(&self, id: ObserverId) -> Option<NodeId> {
        self.registrations
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.target)
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    pub(crate) fn queue_record(&mut self, arena: &DomArena, record: MutationRecord) {
        for registration in &mut self.registrations {
            if registration.wants(arena, &record) {
                registration.queue.push(record.clone());
            }
        }
    }

    pub(crate) fn pending_records(&self) -> usize {
        self.registrations.iter().map(|r| r.queue.len()).sum()
    }

    /// Oldest registration with queued records, emptied
    pub(crate) fn take_next_batch(&mut self) -> Option<(MutationHandler, Vec<MutationRecord>)> {
        self.registrations
            .iter_mut()
            .find(|r| !r.queue.is_empty())
            .map(|r| (r.handler.clone(), std::mem::take(&mut r.queue)))
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("registrations", &self.registrations.len())
            .field("pending_records", &self.pending_records())
            .finish()
    }
}
