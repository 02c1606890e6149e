//! Error taxonomy shared by every stage of the pipeline.

use thiserror::Error;

/// Top-level error for corpus streaming, indexing, matching and export.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Bad paths or missing/contradictory options. Raised before any I/O happens.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A single envelope or input line could not be decoded.
    #[error("decode error: {reason}")]
    Decode { reason: String },

    /// The index store failed to write, commit or read.
    #[error("index store error: {reason}")]
    StoreIo { reason: String },

    /// The index store was already closed when an operation was attempted.
    #[error("index store is closed")]
    StoreClosed,

    /// Closing a resource during shutdown failed.
    #[error("failed to close {resource}: {reason}")]
    ResourceCleanup { resource: String, reason: String },

    /// A field name that is not part of the record catalog.
    #[error("unknown record field '{name}'")]
    UnknownField { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tantivy(#[from] tantivy::TantivyError),
}

impl CorpusError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub(crate) fn store(reason: impl Into<String>) -> Self {
        Self::StoreIo {
            reason: reason.into(),
        }
    }

    /// Whether the error must abort the current run.
    ///
    /// Decode failures are recovered locally; everything touching configuration or
    /// the store is fatal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode { .. } | Self::Json(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CorpusError>;
