use thiserror::Error;

use crate::suggestion::SuggestionType;

/// Input rejected before any store or cache I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("suggestion text is too short")]
    TooShort,

    #[error("{kind} names are limited to {max} characters (got {len})")]
    TooLong {
        kind: SuggestionType,
        max: usize,
        len: usize,
    },

    #[error("suggestion text was rejected by the content filter")]
    Rejected,

    #[error("missing required scope field: {field}")]
    MissingScope { field: &'static str },

    #[error("unit suggestions require a faction")]
    MissingFaction,

    #[error("{path} already holds a suggestion from another scope")]
    ScopeCollision { path: String },
}

/// Failure talking to the suggestion store.
///
/// Callers on the suggestion and recording paths degrade to "no suggestions"
/// or log-and-drop; only admin mutations surface these to a person.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("transaction conflict")]
    Conflict,

    #[error("transaction gave up after {attempts} conflicting attempts")]
    TooManyConflicts { attempts: u32 },

    #[error("store request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Local cache failure. Handled inside the cache, never returned past it.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("cache payload of {bytes} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { bytes: usize, limit: usize },

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("cache version mismatch (found {found}, expected {expected})")]
    VersionMismatch { found: String, expected: String },

    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a promote/block/report/delete action.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("suggestion not found: {path}")]
    NotFound { path: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level error for the `muster` binary.
#[derive(Debug, Error)]
pub enum MusterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Admin(#[from] AdminError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
