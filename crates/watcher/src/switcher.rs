//! Scope switching for the narrow observer
//!
//! Once a root is known, the watcher stops caring about the whole document
//! and listens only to direct-child changes of that root. The narrow
//! registration is torn down and recreated every time a root is (re)found.

use dom::{MutationHandler, NodeId, ObserveOptions, ObserverId};
use std::cell::Cell;

use crate::source::MutationSource;

pub struct ScopeSwitcher<S: MutationSource> {
    source: S,
    handler: MutationHandler,
    narrow: Cell<Option<ObserverId>>,
    root: Cell<Option<NodeId>>,
    reattachments: Cell<usize>,
}

impl<S: MutationSource> ScopeSwitcher<S> {
    /// `handler` runs on every narrow delivery, for every root
    pub fn new(source: S, handler: MutationHandler) -> Self {
        Self {
            source,
            handler,
            narrow: Cell::new(None),
            root: Cell::new(None),
            reattachments: Cell::new(0),
        }
    }

    /// Move the narrow observer onto `root`
    pub fn reattach(&self, root: NodeId) -> ObserverId {
        self.disconnect();

        let observer = self
            .source
            .observe(root, ObserveOptions::narrow(), self.handler.clone());
        self.narrow.set(Some(observer));
        self.root.set(Some(root));
        self.reattachments.set(self.reattachments.get() + 1);

        tracing::debug!("Narrow observer {} attached to node {}", observer, root);
        observer
    }

    /// Drop the narrow observer, if any. Safe to call repeatedly.
    pub fn disconnect(&self) {
        if let Some(observer) = self.narrow.take() {
            self.source.disconnect(observer);
            tracing::trace!("Narrow observer {} disconnected", observer);
        }
        self.root.set(None);
    }

    pub fn current_root(&self) -> Option<NodeId> {
        self.root.get()
    }

    pub fn narrow_observer(&self) -> Option<ObserverId> {
        self.narrow.get()
    }

    pub fn reattachments(&self) -> usize {
        self.reattachments.get()
    }
}
