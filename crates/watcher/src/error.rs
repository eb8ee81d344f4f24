//! Error types for watcher setup
//!
//! Only construction can fail. Once running, every failure degrades to
//! "normalization skipped this cycle" and is logged instead.

use dom::DomError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatcherError>;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}
