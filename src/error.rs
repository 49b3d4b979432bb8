//! Error taxonomy shared by every component.
//!
//! Kinds mirror the propagation rules of the pipeline: `Fetch`/`Analysis`
//! are caught per-source/per-item and logged, `Duplicate` is swallowed
//! silently, `Io`/`LockHeld`/`Config` are fatal at their respective
//! boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrismisError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to fetch {source_url}: {cause}")]
    Fetch { source_url: String, cause: String },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("duplicate item")]
    Duplicate,

    #[error("invalid source type: {0}")]
    InvalidType(String),

    #[error("storage error: {0}")]
    Io(#[from] rusqlite::Error),

    #[error("Daemon already running")]
    LockHeld,
}

pub type Result<T> = std::result::Result<T, PrismisError>;

impl PrismisError {
    pub fn fetch(source_url: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        PrismisError::Fetch {
            source_url: source_url.into(),
            cause: cause.to_string(),
        }
    }
}
