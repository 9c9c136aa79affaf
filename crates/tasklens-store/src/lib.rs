//! # tasklens-store
//!
//! The document store and embedding collaborators the query engine reads
//! from, plus everything needed to fill and inspect a store.
//!
//! ## Contents
//! - `DocumentStore` / `Embedder` traits
//! - `InMemoryStore`: brute-force cosine search with failure injection
//! - `HashingEmbedder`: model-free feature hashing embedder
//! - Ingestion of tracker exports with batch retry
//! - Collection statistics and paginated listing

pub mod embedding;
pub mod error;
pub mod ingest;
pub mod inspect;
pub mod memory;
pub mod traits;

pub use embedding::{cosine_similarity, HashingEmbedder, DEFAULT_DIMENSION};
pub use error::StoreError;
pub use ingest::{clean_text, ingest_items, parse_export, IngestReport, RawTaskItem};
pub use inspect::{list_records, CorpusStats, RecordFilter, RecordPage};
pub use memory::InMemoryStore;
pub use traits::{DocumentStore, Embedder};
