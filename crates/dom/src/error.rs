//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. Only setup paths return these; the
//! mutation pipeline itself degrades instead of failing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("Invalid selector {selector:?} at {line}:{column}: {reason}")]
    SelectorParse {
        selector: String,
        line: u32,
        column: u32,
        reason: String,
    },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
