//! Error taxonomy shared across the store, search engine, and transports.
//!
//! Every kind survives to the transport boundary: the HTTP server maps kinds
//! to status codes and the tool layer to tool errors, so nothing here should
//! be collapsed into a stringly-typed error before it reaches a caller.

use crate::format::ParseError;

pub type Result<T> = std::result::Result<T, RecallError>;

#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    /// Missing required field or malformed request payload.
    #[error("invalid input: {0}")]
    Input(String),

    /// Unknown collection, chunk id, or source file.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A `.aif-bin` file could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Vector length differs from what the collection stores.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch { expected: usize, actual: usize },

    /// Creating a collection whose name already exists.
    #[error("collection already exists: {0}")]
    Duplicate(String),

    /// Disk I/O or constraint violation inside the storage engine.
    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model load or inference failure in the embedder.
    #[error("embedder error: {0}")]
    Embedder(String),

    /// Broken internal invariant (poisoned lock, join failure). Never caused
    /// by user input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Short machine-readable kind label, used by transports for envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::NotFound { .. } => "not_found",
            Self::Parse(_) => "parse",
            Self::DimMismatch { .. } => "dim_mismatch",
            Self::Duplicate(_) => "duplicate",
            Self::Store(_) => "store",
            Self::Io(_) => "io",
            Self::Embedder(_) => "embedder",
            Self::Internal(_) => "internal",
        }
    }
}
