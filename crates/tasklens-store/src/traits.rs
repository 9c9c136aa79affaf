//! Collaborator interfaces consumed by the query engine.

use async_trait::async_trait;

use tasklens_types::{RetrievalResult, TaskRecord};

use crate::error::StoreError;

/// Document store with vector similarity search.
///
/// Implementations must be thread-safe; the engine shares one store across
/// concurrent queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every record in the collection, in insertion order.
    async fn get_all(&self) -> Result<Vec<TaskRecord>, StoreError>;

    /// The `k` records most similar to `text`, best first.
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, StoreError>;

    /// Add (or replace, by id) records. Returns how many were stored.
    async fn add_documents(&self, records: &[TaskRecord]) -> Result<usize, StoreError>;

    /// Drop the whole collection. Returns how many records were removed.
    async fn delete_collection(&self) -> Result<usize, StoreError>;

    /// Number of records in the collection.
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.get_all().await?.len())
    }
}

/// Text embedding function.
pub trait Embedder: Send + Sync {
    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;

    /// Embed several texts. Default implementation calls `embed` for each.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
