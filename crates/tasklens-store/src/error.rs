//! Store error types.

use thiserror::Error;

/// Errors raised by document stores and embedders.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service could not be reached or refused the call
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A document was rejected on insert
    #[error("Document rejected: {id}: {reason}")]
    Rejected { id: String, reason: String },

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Dimension mismatch between query and stored vectors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
