//! Event Bus - lifecycle notifications from the watcher
//!
//! Purely observational: nothing in the pipeline waits on a subscriber,
//! and publishing with no subscribers is fine.

use dom::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::normalizer::NormalizeReport;

/// What caused a normalization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeTrigger {
    /// Root found during an idle drain
    Drain,
    /// Structural change directly under the bound root
    NarrowObserver,
    /// Explicit call from the embedder
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WatcherEvent {
    DrainCompleted { inspected: usize, matched: usize },
    RootBound { root: NodeId, path: String, rebind: bool },
    Normalized { trigger: NormalizeTrigger, report: NormalizeReport },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<WatcherEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn publish(&self, event: WatcherEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
