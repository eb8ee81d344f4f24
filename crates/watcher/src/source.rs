//! Subscription seam between the watcher and whatever delivers mutations

use dom::{Document, MutationHandler, NodeId, ObserveOptions, ObserverId};

/// Delivers batches of mutation records for a subtree to a handler
pub trait MutationSource {
    fn observe(&self, target: NodeId, options: ObserveOptions, handler: MutationHandler) -> ObserverId;

    /// Unknown or already disconnected ids are ignored
    fn disconnect(&self, observer: ObserverId);
}

impl MutationSource for Document {
    fn observe(&self, target: NodeId, options: ObserveOptions, handler: MutationHandler) -> ObserverId {
        Document::observe(self, target, options, handler)
    }

    fn disconnect(&self, observer: ObserverId) {
        Document::disconnect(self, observer);
    }
}
