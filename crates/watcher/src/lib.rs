//! Direction Watcher
//!
//! Watches a live document until a content root shows up, then keeps the
//! text direction and alignment of its blocks normalized, without ever
//! doing that work inside the host's mutation callbacks.
//!
//! # Architecture
//!
//! 1. **Two tiers**: a wide observer over the whole document only *looks*
//!    for the root; a narrow observer on the root does the steady-state work
//! 2. **Never block the host**: wide notifications are queued and handled in
//!    an idle slot, one drain per burst
//! 3. **Idempotent edits**: running the normalizer again changes nothing
//! 4. **Single thread**: `Rc`/`Cell` everywhere, ordering comes from the host
//!
//! ```text
//! Document ─→ wide observer ─→ IdleBatcher ─→ RootDetector ─→ ScopeSwitcher
//!                                                  │                │
//!                                                  └──→ Normalizer ←┘ narrow observer
//! ```

pub mod batcher;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod normalizer;
pub mod scheduler;
pub mod source;
pub mod switcher;
pub mod watcher;

pub use batcher::IdleBatcher;
pub use config::{Rules, WatcherConfig};
pub use detector::RootDetector;
pub use error::{Result, WatcherError};
pub use events::{EventBus, NormalizeTrigger, WatcherEvent};
pub use normalizer::{NormalizeReport, Normalizer};
pub use scheduler::{IdleScheduler, IdleTask, ImmediateScheduler, ManualScheduler, TokioIdleScheduler};
pub use source::MutationSource;
pub use switcher::ScopeSwitcher;
pub use watcher::{Watcher, WatcherState};
