//! Observable in-memory DOM
//!
//! A single-threaded document model with just enough of the platform to
//! host mutation-driven page scripts: an arena tree, CSS selector matching,
//! inline styles, and `MutationObserver`-style batched delivery.
//!
//! ## Core Design
//!
//! ```text
//! CDP JSON ─┐
//!           ├→ DomArena (Vec<DomNode>, NodeId = u32) ←─ SelectorList queries
//! builders ─┘        ↑
//!                Document (Rc handle) ── edits ──→ ObserverRegistry queues
//!                                                        ↓ flush_mutations()
//!                                                  MutationHandler batches
//! ```

pub mod arena;
pub mod document;
pub mod error;
pub mod observer;
pub mod selector;
pub mod serializer;
pub mod snapshot;
pub mod style;
pub mod types;

pub use arena::DomArena;
pub use document::{Document, WeakDocument};
pub use error::{DomError, Result};
pub use observer::{MutationHandler, MutationKind, MutationRecord, ObserveOptions, ObserverId};
pub use selector::SelectorList;
pub use serializer::DomSerializer;
pub use types::*;
