//! Error types for query processing.

use thiserror::Error;

/// Errors raised while interpreting and answering a query.
///
/// Only the caller-input variants are ever returned from
/// `QueryPipeline::query`; the pipeline recovers from the others.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Query text is empty after trimming
    #[error("Query is empty")]
    EmptyQuery,

    /// Query uses both "and" and "or" as connectives
    #[error("Query mixes 'and' and 'or'; use only one connective")]
    MixedOperators,

    /// Vocabulary could not be built from the corpus
    #[error("Vocabulary build failed: {0}")]
    VocabularyBuild(String),

    /// Text correction could not be applied
    #[error("Text correction failed: {0}")]
    Correction(String),

    /// Model output did not conform to the criteria shape
    #[error("Criteria parse failed: {0}")]
    CriteriaParse(String),

    /// Document store failed or timed out
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// A record could not be converted to output
    #[error("Record {id} could not be aggregated: {reason}")]
    Aggregation { id: String, reason: String },

    /// The store rejected a corpus mutation
    #[error("Corpus update failed: {0}")]
    Ingest(String),
}

impl QueryError {
    /// True for errors caused by the request itself.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, QueryError::EmptyQuery | QueryError::MixedOperators)
    }
}
