//! Direction and alignment normalization
//!
//! Two independent, idempotent passes over the whole document:
//!
//! 1. content blocks without a `dir` attribute get one (an existing `dir`
//!    is never overwritten),
//! 2. list items get inline `text-align` forced to the configured value
//!    (skipped when already equal, so a second run writes nothing).

use dom::{Document, NodeId, SelectorList};
use serde::{Deserialize, Serialize};

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub blocks_matched: usize,
    pub directions_assigned: usize,
    pub items_matched: usize,
    pub alignments_written: usize,
}

impl NormalizeReport {
    /// No attribute or style was written
    pub fn is_noop(&self) -> bool {
        self.directions_assigned == 0 && self.alignments_written == 0
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    content_blocks: SelectorList,
    list_items: SelectorList,
    direction: String,
    text_align: String,
}

impl Normalizer {
    pub fn new(content_blocks: SelectorList, list_items: SelectorList) -> Self {
        Self {
            content_blocks,
            list_items,
            direction: "auto".to_string(),
            text_align: "start".to_string(),
        }
    }

    pub fn with_values(mut self, direction: &str, text_align: &str) -> Self {
        self.direction = direction.to_string();
        self.text_align = text_align.to_string();
        self
    }

    pub fn normalize(&self, document: &Document) -> NormalizeReport {
        let mut report = NormalizeReport::default();
        self.assign_directions(document, &mut report);
        self.align_list_items(document, &mut report);
        report
    }

    fn assign_directions(&self, document: &Document, report: &mut NormalizeReport) {
        let blocks = document.query_selector_all(&self.content_blocks);
        report.blocks_matched = blocks.len();

        for block in blocks {
            if document.attribute(block, "dir").is_some() {
                continue;
            }
            match document.set_attribute(block, "dir", &self.direction) {
                Ok(()) => report.directions_assigned += 1,
                Err(e) => tracing::warn!("Skipping direction for node {}: {}", block, e),
            }
        }
    }

    fn align_list_items(&self, document: &Document, report: &mut NormalizeReport) {
        let items = document.query_selector_all(&self.list_items);
        report.items_matched = items.len();

        for item in items {
            if self.is_aligned(document, item) {
                continue;
            }
            match document.set_style_property(item, "text-align", &self.text_align) {
                Ok(()) => report.alignments_written += 1,
                Err(e) => tracing::warn!("Skipping alignment for node {}: {}", item, e),
            }
        }
    }

    fn is_aligned(&self, document: &Document, item: NodeId) -> bool {
        document
            .style_property(item, "text-align")
            .is_some_and(|value| value.eq_ignore_ascii_case(&self.text_align))
    }
}
