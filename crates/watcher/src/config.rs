//! Watcher configuration
//!
//! Which classes mark a loaded content root and which elements get their
//! direction or alignment normalized. Defaults target Notion pages.
//!
//! ```toml
//! root_class_names = ["notion-page-content"]
//! list_item_selectors = ['div[placeholder="List"]']
//! direction = "auto"
//! ```

use dom::SelectorList;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::detector::RootDetector;
use crate::error::{Result, WatcherError};
use crate::normalizer::Normalizer;

/// Root marker classes, in lookup order: page, table, board, gallery view
pub const DEFAULT_ROOT_CLASS_NAMES: &[&str] = &[
    "notion-page-content",
    "notion-table-view",
    "notion-board-view",
    "notion-gallery-view",
];

pub const DEFAULT_CONTENT_BLOCK_SELECTORS: &[&str] = &[
    ".notion-page-content > div[data-block-id]:not([dir]):not(.notion-column_list-block):not(.notion-collection_view_page-block)",
    "[placeholder=\"Untitled\"]:not([dir])",
    ".notion-column-block > div[data-block-id]:not([dir])",
    "notion-collection_view-block:not([dir])",
    ".notion-table-view:not([dir])",
    ".notion-board-view:not([dir])",
    ".notion-gallery-view:not([dir])",
    "h1[placeholder=\"New page\"]:not([dir])",
];

/// List, to-do and toggle items
pub const DEFAULT_LIST_ITEM_SELECTORS: &[&str] = &[
    "div[placeholder=\"List\"]",
    "div[placeholder=\"To-do\"]",
    "div[placeholder=\"Toggle\"]",
];

const DIRECTIONS: &[&str] = &["auto", "ltr", "rtl"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Ordered; the first class found in a subtree wins
    pub root_class_names: Vec<String>,
    /// Elements that receive a `dir` attribute when they have none
    pub content_block_selectors: Vec<String>,
    /// Elements whose inline `text-align` is forced
    pub list_item_selectors: Vec<String>,
    /// Value written to `dir`: `auto`, `ltr` or `rtl`
    pub direction: String,
    /// Value forced into `text-align`
    pub text_align: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            root_class_names: to_strings(DEFAULT_ROOT_CLASS_NAMES),
            content_block_selectors: to_strings(DEFAULT_CONTENT_BLOCK_SELECTORS),
            list_item_selectors: to_strings(DEFAULT_LIST_ITEM_SELECTORS),
            direction: "auto".to_string(),
            text_align: "start".to_string(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Compiled form of a [`WatcherConfig`]
#[derive(Debug, Clone)]
pub struct Rules {
    pub detector: RootDetector,
    pub normalizer: Normalizer,
}

impl WatcherConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("Loaded watcher config from {}", path.display());
        Ok(config)
    }

    /// Validate and parse selectors once, up front
    pub fn compile(&self) -> Result<Rules> {
        if !DIRECTIONS.contains(&self.direction.as_str()) {
            return Err(WatcherError::InvalidConfig(format!(
                "direction must be one of {:?}, got {:?}",
                DIRECTIONS, self.direction
            )));
        }
        if self.text_align.trim().is_empty() {
            return Err(WatcherError::InvalidConfig(
                "text_align must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .root_class_names
            .iter()
            .find(|name| name.is_empty() || name.contains(char::is_whitespace))
        {
            return Err(WatcherError::InvalidConfig(format!(
                "root class name {:?} must be a single non-empty class",
                bad
            )));
        }

        let content_blocks = SelectorList::parse_many(&self.content_block_selectors)?;
        let list_items = SelectorList::parse_many(&self.list_item_selectors)?;

        Ok(Rules {
            detector: RootDetector::new(&self.root_class_names),
            normalizer: Normalizer::new(content_blocks, list_items)
                .with_values(&self.direction, self.text_align.trim()),
        })
    }
}
