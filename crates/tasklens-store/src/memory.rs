//! In-memory document store with brute-force cosine search.
//!
//! Good enough for corpora of a few thousand tasks, and the store used by the
//! CLI and every test. Failure and latency can be injected to exercise the
//! degraded paths of the query pipeline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use tasklens_types::{RetrievalResult, TaskRecord};

use crate::embedding::{cosine_similarity, HashingEmbedder};
use crate::error::StoreError;
use crate::traits::{DocumentStore, Embedder};

#[derive(Debug, Clone)]
struct StoredDocument {
    record: TaskRecord,
    embedding: Vec<f32>,
}

/// Document store backed by a `Vec` behind a lock.
pub struct InMemoryStore {
    documents: RwLock<Vec<StoredDocument>>,
    embedder: Arc<dyn Embedder>,
    search_failure: Option<String>,
    search_delay: Option<Duration>,
    get_all_failure: Option<String>,
    write_delay: Option<Duration>,
    max_batch_size: Option<usize>,
    rejected_ids: HashSet<String>,
    search_calls: AtomicUsize,
}

impl InMemoryStore {
    /// Create an empty store using the hashing embedder.
    pub fn new() -> Self {
        Self::with_embedder(Arc::new(HashingEmbedder::default()))
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            embedder,
            search_failure: None,
            search_delay: None,
            get_all_failure: None,
            write_delay: None,
            max_batch_size: None,
            rejected_ids: HashSet::new(),
            search_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with records.
    pub fn with_records(records: Vec<TaskRecord>) -> Result<Self, StoreError> {
        let store = Self::new();
        store.insert(&records)?;
        Ok(store)
    }

    /// Make every similarity search fail with `Unavailable`.
    pub fn with_search_failure(mut self, message: impl Into<String>) -> Self {
        self.search_failure = Some(message.into());
        self
    }

    /// Delay every similarity search.
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    /// Make every full corpus read fail with `Unavailable`.
    pub fn with_get_all_failure(mut self, message: impl Into<String>) -> Self {
        self.get_all_failure = Some(message.into());
        self
    }

    /// Delay every `add_documents` and `delete_collection` call.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Reject `add_documents` calls carrying more than `max` records.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    /// Reject any record with this id on insert.
    pub fn with_rejected_id(mut self, id: impl Into<String>) -> Self {
        self.rejected_ids.insert(id.into());
        self
    }

    /// Number of similarity searches served (including failed ones).
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn read_documents(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<StoredDocument>>, StoreError> {
        self.documents
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write_documents(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<StoredDocument>>, StoreError> {
        self.documents
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn insert(&self, records: &[TaskRecord]) -> Result<usize, StoreError> {
        if let Some(max) = self.max_batch_size {
            if records.len() > max {
                return Err(StoreError::Unavailable(format!(
                    "batch of {} exceeds limit of {}",
                    records.len(),
                    max
                )));
            }
        }
        if let Some(rejected) = records.iter().find(|r| self.rejected_ids.contains(&r.id)) {
            return Err(StoreError::Rejected {
                id: rejected.id.clone(),
                reason: "rejected by store".to_string(),
            });
        }

        // Embed outside the lock, then upsert by id
        let texts: Vec<String> = records.iter().map(TaskRecord::document_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&text_refs)?;

        let mut documents = self.write_documents()?;
        for (record, embedding) in records.iter().zip(embeddings) {
            let document = StoredDocument {
                record: record.clone(),
                embedding,
            };
            match documents.iter_mut().find(|d| d.record.id == record.id) {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
        }
        Ok(records.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
        if let Some(message) = &self.get_all_failure {
            warn!(error = %message, "Injected get_all failure");
            return Err(StoreError::Unavailable(message.clone()));
        }
        let documents = self.read_documents()?;
        Ok(documents.iter().map(|d| d.record.clone()).collect())
    }

    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.search_failure {
            warn!(error = %message, "Injected search failure");
            return Err(StoreError::Unavailable(message.clone()));
        }

        let query = self.embedder.embed(text)?;
        let documents = self.read_documents()?;

        let mut scored = Vec::with_capacity(documents.len());
        for document in documents.iter() {
            let score = cosine_similarity(&query, &document.embedding)?.max(0.0);
            scored.push(RetrievalResult::new(document.record.clone(), score));
        }

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        scored.truncate(k);

        debug!(k, returned = scored.len(), "Similarity search complete");
        Ok(scored)
    }

    async fn add_documents(&self, records: &[TaskRecord]) -> Result<usize, StoreError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.insert(records)
    }

    async fn delete_collection(&self) -> Result<usize, StoreError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        let mut documents = self.write_documents()?;
        let removed = documents.len();
        documents.clear();
        debug!(removed, "Collection deleted");
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read_documents()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TaskRecord> {
        vec![
            TaskRecord::new("A-1").with_title("Login page crashes on submit"),
            TaskRecord::new("A-2").with_title("Quarterly invoice export"),
            TaskRecord::new("A-3").with_title("Login timeout after idle"),
        ]
    }

    #[tokio::test]
    async fn test_add_and_get_all_preserves_order() {
        let store = InMemoryStore::new();
        assert_eq!(store.add_documents(&sample()).await.unwrap(), 3);

        let ids: Vec<String> = store.get_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["A-1", "A-2", "A-3"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_upserts_by_id() {
        let store = InMemoryStore::with_records(sample()).unwrap();
        store
            .add_documents(&[TaskRecord::new("A-2").with_title("Renamed")])
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].title.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn test_similarity_search_ranks_and_truncates() {
        let store = InMemoryStore::with_records(sample()).unwrap();
        let results = store.similarity_search("login page crashes on submit", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "A-1");
        assert!(results[0].relevance_score >= results[1].relevance_score);
        assert_eq!(store.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_search_failure() {
        let store = InMemoryStore::with_records(sample())
            .unwrap()
            .with_search_failure("connection refused");
        let err = store.similarity_search("login", 5).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_get_all_failure_leaves_search_working() {
        let store = InMemoryStore::with_records(sample())
            .unwrap()
            .with_get_all_failure("scan disabled");
        let err = store.get_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(ref m) if m == "scan disabled"));
        assert_eq!(store.similarity_search("login", 5).await.unwrap().len(), 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_delay_applies_to_writes() {
        let store = InMemoryStore::new().with_write_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        store.add_documents(&sample()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(store.delete_collection().await.unwrap(), 3);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_batch_limit_and_rejected_ids() {
        let store = InMemoryStore::new().with_max_batch_size(2);
        assert!(store.add_documents(&sample()).await.is_err());
        assert_eq!(store.add_documents(&sample()[..2]).await.unwrap(), 2);

        let store = InMemoryStore::new().with_rejected_id("A-3");
        let err = store.add_documents(&sample()).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { ref id, .. } if id == "A-3"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let store = InMemoryStore::with_records(sample()).unwrap();
        assert_eq!(store.delete_collection().await.unwrap(), 3);
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
