//! Watcher - composition root
//!
//! Wires the pipeline together and owns the wide subscription:
//!
//! ```text
//! document ──wide (childList, subtree)──→ IdleBatcher ──idle drain──→ RootDetector
//!                                                                        │ match
//!                                                    Normalizer ←────────┤
//!                                                        ↑               ↓
//!  root ──narrow (childList)─────────────────────────────┘        ScopeSwitcher
//! ```
//!
//! States: `WaitingForRoot` until the first match, then `Bound` for good;
//! a later match rebinds to the new root. The wide observer is never
//! disconnected.

use dom::{Document, MutationHandler, MutationRecord, NodeId, ObserveOptions, ObserverId};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tokio::sync::broadcast;

use crate::batcher::IdleBatcher;
use crate::config::{Rules, WatcherConfig};
use crate::detector::RootDetector;
use crate::error::Result;
use crate::events::{EventBus, NormalizeTrigger, WatcherEvent};
use crate::normalizer::{NormalizeReport, Normalizer};
use crate::scheduler::IdleScheduler;
use crate::source::MutationSource;
use crate::switcher::ScopeSwitcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherState {
    WaitingForRoot,
    Bound { root: NodeId },
}

struct WatcherCore {
    document: Document,
    detector: RootDetector,
    normalizer: Normalizer,
    switcher: ScopeSwitcher<Document>,
    state: Cell<WatcherState>,
    normalize_runs: Cell<usize>,
    events: EventBus,
}

impl WatcherCore {
    fn run_normalize(&self, trigger: NormalizeTrigger) -> NormalizeReport {
        let report = self.normalizer.normalize(&self.document);
        self.normalize_runs.set(self.normalize_runs.get() + 1);
        tracing::trace!("Normalized ({:?}): {:?}", trigger, report);
        self.events.publish(WatcherEvent::Normalized { trigger, report });
        report
    }

    /// Idle drain body. Records arrive in queue order.
    fn process_batch(&self, records: &[MutationRecord]) {
        let mut matched = 0;

        for record in records {
            // Release the arena before normalizing, it needs to write
            let root = {
                let arena = self.document.arena();
                self.detector.detect(&arena, record)
            };
            let Some(root) = root else {
                continue;
            };

            matched += 1;
            self.run_normalize(NormalizeTrigger::Drain);
            self.bind(root);
        }

        tracing::debug!(
            "Drain inspected {} records, {} root matches",
            records.len(),
            matched
        );
        self.events.publish(WatcherEvent::DrainCompleted {
            inspected: records.len(),
            matched,
        });
    }

    fn bind(&self, root: NodeId) {
        self.switcher.reattach(root);
        let previous = self.state.replace(WatcherState::Bound { root });
        let rebind = previous != WatcherState::WaitingForRoot;

        let path = self
            .document
            .node_path(root)
            .unwrap_or_else(|_| format!("#{}", root));
        if rebind {
            tracing::debug!("Rebound to content root {}", path);
        } else {
            tracing::info!("Content root found at {}", path);
        }
        self.events
            .publish(WatcherEvent::RootBound { root, path, rebind });
    }
}

pub struct Watcher {
    core: Rc<WatcherCore>,
    batcher: Rc<IdleBatcher<MutationRecord>>,
    wide: ObserverId,
}

impl Watcher {
    /// Compile `config` and start watching `document`
    pub fn start(
        document: &Document,
        config: &WatcherConfig,
        scheduler: Rc<dyn IdleScheduler>,
    ) -> Result<Self> {
        Ok(Self::with_rules(document, config.compile()?, scheduler))
    }

    pub fn with_rules(document: &Document, rules: Rules, scheduler: Rc<dyn IdleScheduler>) -> Self {
        let Rules {
            detector,
            normalizer,
        } = rules;

        let core = Rc::new_cyclic(|core: &Weak<WatcherCore>| {
            let core = core.clone();
            let narrow: MutationHandler = Rc::new(move |records: &[MutationRecord]| {
                if let Some(core) = core.upgrade() {
                    tracing::trace!("Narrow observer fired with {} records", records.len());
                    core.run_normalize(NormalizeTrigger::NarrowObserver);
                }
            });

            WatcherCore {
                document: document.clone(),
                detector,
                normalizer,
                switcher: ScopeSwitcher::new(document.clone(), narrow),
                state: Cell::new(WatcherState::WaitingForRoot),
                normalize_runs: Cell::new(0),
                events: EventBus::new(),
            }
        });

        let drain_core = Rc::downgrade(&core);
        let batcher = IdleBatcher::new(scheduler, move |records: &[MutationRecord]| {
            if let Some(core) = drain_core.upgrade() {
                core.process_batch(records);
            }
        });

        let wide_batcher = Rc::downgrade(&batcher);
        let wide_handler: MutationHandler = Rc::new(move |records: &[MutationRecord]| {
            if let Some(batcher) = wide_batcher.upgrade() {
                batcher.enqueue_all(records.iter().cloned());
            }
        });
        let wide = MutationSource::observe(
            document,
            document.root_id(),
            ObserveOptions::wide(),
            wide_handler,
        );

        tracing::debug!("Watching document with wide observer {}", wide);
        Self {
            core,
            batcher,
            wide,
        }
    }

    pub fn document(&self) -> &Document {
        &self.core.document
    }

    pub fn state(&self) -> WatcherState {
        self.core.state.get()
    }

    pub fn root(&self) -> Option<NodeId> {
        match self.state() {
            WatcherState::Bound { root } => Some(root),
            WatcherState::WaitingForRoot => None,
        }
    }

    pub fn wide_observer(&self) -> ObserverId {
        self.wide
    }

    pub fn narrow_observer(&self) -> Option<ObserverId> {
        self.core.switcher.narrow_observer()
    }

    /// Records waiting for the next idle drain
    pub fn pending_len(&self) -> usize {
        self.batcher.len()
    }

    pub fn drain_pending(&self) -> bool {
        self.batcher.drain_pending()
    }

    pub fn drains_run(&self) -> usize {
        self.batcher.drains_run()
    }

    pub fn normalize_runs(&self) -> usize {
        self.core.normalize_runs.get()
    }

    /// Run a normalization pass right now, outside the pipeline
    pub fn normalize_now(&self) -> NormalizeReport {
        self.core.run_normalize(NormalizeTrigger::Manual)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.core.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ImmediateScheduler, ManualScheduler, TokioIdleScheduler};

    fn start(doc: &Document) -> (Watcher, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let watcher = Watcher::start(doc, &WatcherConfig::default(), Rc::new(scheduler.clone())).unwrap();
        (watcher, scheduler)
    }

    fn div(doc: &Document, attributes: &[(&str, &str)]) -> NodeId {
        doc.create_element_with("div", attributes).unwrap()
    }

    fn body(doc: &Document) -> NodeId {
        let body = doc.create_element("body");
        doc.append_child(doc.root_id(), body).unwrap();
        doc.flush_mutations();
        body
    }

    #[test]
    fn test_end_to_end_root_in_third_record() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);
        let mut events = watcher.subscribe();

        let page = div(&doc, &[("class", "notion-page-content")]);
        let first = div(&doc, &[("data-block-id", "1")]);
        let second = div(&doc, &[("data-block-id", "2")]);
        doc.append_child(page, first).unwrap();
        doc.append_child(page, second).unwrap();

        for i in 0..5 {
            let node = if i == 2 { page } else { div(&doc, &[("class", "sidebar-item")]) };
            doc.append_child(body, node).unwrap();
        }

        doc.flush_mutations();
        assert_eq!(watcher.pending_len(), 5);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(watcher.state(), WatcherState::WaitingForRoot);

        scheduler.run_pending();

        assert_eq!(doc.attribute(first, "dir").as_deref(), Some("auto"));
        assert_eq!(doc.attribute(second, "dir").as_deref(), Some("auto"));
        assert_eq!(watcher.pending_len(), 0);
        assert_eq!(watcher.state(), WatcherState::Bound { root: page });
        let narrow = watcher.narrow_observer().unwrap();
        assert_eq!(doc.observed_target(narrow), Some(page));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(
            seen[0],
            WatcherEvent::Normalized {
                trigger: NormalizeTrigger::Drain,
                ..
            }
        ));
        assert!(matches!(seen[1], WatcherEvent::RootBound { root, rebind: false, .. } if root == page));
        assert_eq!(
            seen[2],
            WatcherEvent::DrainCompleted {
                inspected: 5,
                matched: 1
            }
        );
    }

    #[test]
    fn test_root_past_first_added_node_is_missed() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);

        let header = div(&doc, &[("class", "notion-topbar")]);
        let page = div(&doc, &[("class", "notion-page-content")]);
        doc.append_children(body, &[header, page]).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();

        assert_eq!(watcher.state(), WatcherState::WaitingForRoot);
        assert_eq!(watcher.narrow_observer(), None);
        assert_eq!(watcher.normalize_runs(), 0);

        // Dropped for good: later unrelated drains do not revisit it
        let footer = div(&doc, &[]);
        doc.append_child(body, footer).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();
        assert_eq!(watcher.state(), WatcherState::WaitingForRoot);
    }

    #[test]
    fn test_drain_clears_queue_without_match() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);

        for _ in 0..10 {
            let node = div(&doc, &[]);
            doc.append_child(body, node).unwrap();
        }
        doc.flush_mutations();
        assert_eq!(watcher.pending_len(), 10);
        assert!(watcher.drain_pending());

        scheduler.run_pending();
        assert_eq!(watcher.pending_len(), 0);
        assert!(!watcher.drain_pending());
        assert_eq!(watcher.drains_run(), 1);
    }

    #[test]
    fn test_at_most_one_drain_pending_across_flushes() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);

        for _ in 0..3 {
            let node = div(&doc, &[]);
            doc.append_child(body, node).unwrap();
            doc.flush_mutations();
            assert_eq!(scheduler.pending(), 1);
        }
        assert_eq!(watcher.pending_len(), 3);
    }

    #[test]
    fn test_narrow_observer_normalizes_each_change_synchronously() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);

        let page = div(&doc, &[("class", "notion-page-content")]);
        doc.append_child(body, page).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();
        assert_eq!(watcher.normalize_runs(), 1);

        for i in 0..3 {
            let id = format!("late-{}", i);
            let block = div(&doc, &[("data-block-id", id.as_str())]);
            doc.append_child(page, block).unwrap();
            doc.flush_mutations();

            assert_eq!(watcher.normalize_runs(), 2 + i);
            assert_eq!(doc.attribute(block, "dir").as_deref(), Some("auto"));
        }

        // Deeper changes are outside the narrow scope
        let block = doc.node(page).unwrap().children_ids[0];
        let nested = doc.create_element("span");
        doc.append_child(block, nested).unwrap();
        doc.flush_mutations();
        assert_eq!(watcher.normalize_runs(), 4);

        // The wide observer still queued all of those for an idle drain
        assert_eq!(watcher.pending_len(), 4);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_rediscovery_rebinds_without_returning_to_waiting() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);
        let mut events = watcher.subscribe();

        let old_page = div(&doc, &[("class", "notion-page-content")]);
        doc.append_child(body, old_page).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();
        let old_observer = watcher.narrow_observer().unwrap();

        // In-app navigation: the old page goes away, a table view arrives
        doc.remove_child(body, old_page).unwrap();
        let frame = div(&doc, &[("class", "notion-frame")]);
        let table = div(&doc, &[("class", "notion-table-view")]);
        doc.append_child(frame, table).unwrap();
        doc.append_child(body, frame).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();

        assert_eq!(watcher.state(), WatcherState::Bound { root: table });
        assert_eq!(doc.observed_target(old_observer), None);
        assert_eq!(doc.observer_count(), 2);
        assert_eq!(doc.attribute(table, "dir").as_deref(), Some("auto"));

        let rebinds: Vec<bool> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                WatcherEvent::RootBound { rebind, .. } => Some(rebind),
                _ => None,
            })
            .collect();
        assert_eq!(rebinds, vec![false, true]);

        // Changes under the old root no longer trigger anything
        let runs = watcher.normalize_runs();
        let stray = div(&doc, &[]);
        doc.append_child(old_page, stray).unwrap();
        doc.flush_mutations();
        assert_eq!(watcher.normalize_runs(), runs);
    }

    #[test]
    fn test_immediate_scheduler_binds_during_flush() {
        let doc = Document::new();
        let body = body(&doc);
        let watcher =
            Watcher::start(&doc, &WatcherConfig::default(), Rc::new(ImmediateScheduler)).unwrap();

        let page = div(&doc, &[("class", "notion-page-content")]);
        let item = doc
            .create_element_with("div", &[("placeholder", "To-do")])
            .unwrap();
        doc.append_child(page, item).unwrap();
        doc.append_child(body, page).unwrap();
        doc.flush_mutations();

        assert_eq!(watcher.root(), Some(page));
        assert_eq!(watcher.pending_len(), 0);
        assert_eq!(doc.style_property(item, "text-align").as_deref(), Some("start"));
    }

    #[test]
    fn test_page_loaded_from_snapshot() {
        let doc = Document::from_cdp(&serde_json::json!({
            "root": {
                "nodeType": 9,
                "nodeName": "#document",
                "children": [{
                    "nodeType": 1,
                    "nodeName": "HTML",
                    "children": [{ "nodeType": 1, "nodeName": "BODY", "attributes": ["id", "notion-app"] }]
                }]
            }
        }))
        .unwrap();
        let body = doc.arena().find_by_tag("body")[0];
        let (watcher, scheduler) = start(&doc);

        let page = div(&doc, &[("class", "notion-page-content")]);
        doc.append_child(body, page).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();

        assert_eq!(watcher.root(), Some(page));
        assert_eq!(doc.node_path(page).unwrap(), "/html[1]/body[1]/div[1]");
    }

    #[test]
    fn test_normalize_now_is_idempotent() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, _) = start(&doc);

        let title = doc
            .create_element_with("h1", &[("placeholder", "New page")])
            .unwrap();
        doc.append_child(body, title).unwrap();

        assert_eq!(watcher.normalize_now().directions_assigned, 1);
        assert!(watcher.normalize_now().is_noop());
    }

    #[test]
    fn test_dropping_watcher_silences_pipeline() {
        let doc = Document::new();
        let body = body(&doc);
        let (watcher, scheduler) = start(&doc);
        drop(watcher);

        let page = div(&doc, &[("class", "notion-page-content")]);
        let block = div(&doc, &[("data-block-id", "x")]);
        doc.append_child(page, block).unwrap();
        doc.append_child(body, page).unwrap();
        doc.flush_mutations();
        scheduler.run_pending();

        assert_eq!(doc.attribute(block, "dir"), None);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_binds_after_yield() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let doc = Document::new();
                let body = body(&doc);
                let watcher =
                    Watcher::start(&doc, &WatcherConfig::default(), Rc::new(TokioIdleScheduler)).unwrap();

                let page = div(&doc, &[("class", "notion-page-content")]);
                let block = div(&doc, &[("data-block-id", "1")]);
                doc.append_child(page, block).unwrap();
                doc.append_child(body, page).unwrap();
                doc.flush_mutations();

                // The drain is deferred to the runtime, not run inside the flush
                assert!(watcher.drain_pending());
                assert_eq!(watcher.state(), WatcherState::WaitingForRoot);

                for _ in 0..32 {
                    if !watcher.drain_pending() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }

                assert_eq!(watcher.drains_run(), 1);
                assert_eq!(watcher.pending_len(), 0);
                assert_eq!(watcher.state(), WatcherState::Bound { root: page });
                assert_eq!(doc.attribute(block, "dir").as_deref(), Some("auto"));
            })
            .await;
    }
}
