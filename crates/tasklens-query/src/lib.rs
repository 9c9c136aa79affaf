//! # tasklens-query
//!
//! Query interpretation and retrieval filtering for tasklens.
//!
//! Turns a free-text question plus optional sprint/project filters into a
//! normalized query, a fast/slow path decision, structured criteria, a
//! candidate set from the document store, and a filtered, aggregated result.
//!
//! ## Core Concepts
//!
//! - **Vocabulary**: known values per category, rebuilt from the corpus and
//!   swapped atomically through `VocabularyStore`
//! - **Normalizer**: cleans text and corrects typos toward the vocabulary
//! - **Extractors**: deterministic rules, or a generative model with a
//!   deterministic fallback
//! - **Classifier**: decides whether the generative model is worth calling
//! - **Strategy**: targeted scan, hybrid search or semantic search, keyed on
//!   which structural filters are set
//! - **FilterPredicate**: the one predicate interpreter every path uses; the
//!   project filter is always applied last
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tasklens_query::{PipelineConfig, QueryPipeline, QueryRequest};
//! use tasklens_store::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::with_records(records)?);
//! let pipeline = QueryPipeline::new(store, PipelineConfig::default());
//! pipeline.refresh_vocabulary().await;
//!
//! let request = QueryRequest::new("high priority bugs")
//!     .with_sprint("Sprint-1")
//!     .with_project("Alpha");
//! let response = pipeline.query(&request).await?;
//! ```
//!
//! ## Modules
//!
//! - [`vocabulary`]: vocabulary snapshots and the snapshot holder
//! - [`normalizer`]: text cleaning and fuzzy correction
//! - [`similarity`]: pluggable similarity scoring
//! - [`extractor`]: criteria extraction
//! - [`classifier`]: complexity classification
//! - [`strategy`]: retrieval strategy selection and execution
//! - [`filter`]: filter predicates and evaluation
//! - [`aggregate`]: output records and statistics
//! - [`pipeline`]: orchestration and fallback policy

pub mod aggregate;
pub mod classifier;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod normalizer;
pub mod pipeline;
pub mod similarity;
pub mod strategy;
pub mod vocabulary;

pub use aggregate::{aggregate, AggregatedResult, PortfolioStats, ProjectSummary, TaskView};
pub use classifier::{ClassifierConfig, ComplexityAssessment, ComplexityClassifier, ComplexityReason};
pub use error::QueryError;
pub use extractor::{
    parse_model_criteria, validate_query, CriteriaExtractor, DeterministicExtractor, LlmExtractor,
};
pub use filter::{apply_filters, FilterPredicate, MatchOp};
pub use normalizer::{Normalizer, NormalizerConfig};
pub use pipeline::{
    context_query_text, fallback_answer, PipelineConfig, QueryPipeline, QueryRequest,
    QueryResponse, ResponsePath,
};
pub use similarity::{
    cascade_match, default_scorer, JaroWinkler, NormalizedLevenshtein, SimilarityScorer,
    DEFAULT_THRESHOLDS,
};
pub use strategy::{RetrievalStrategy, StrategyKind};
pub use vocabulary::{Vocabulary, VocabularyStore};
