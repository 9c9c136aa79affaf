//! End-to-end test infrastructure for tasklens.
//!
//! Provides a shared TestHarness and corpus fixtures for tests covering the
//! full query path: normalization, classification, extraction, retrieval,
//! filtering and aggregation.

use std::sync::Arc;

use tasklens_llm::GenerativeModel;
use tasklens_query::{PipelineConfig, QueryPipeline, QueryResponse};
use tasklens_store::{DocumentStore, InMemoryStore};
use tasklens_types::TaskRecord;

/// Shared test harness for E2E tests.
///
/// Keeps a typed handle on the store so tests can inspect it (search call
/// counts, contents) while the pipeline holds it as a trait object.
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub pipeline: QueryPipeline,
}

impl TestHarness {
    /// Harness over `records` with default configuration and no model.
    pub async fn new(records: Vec<TaskRecord>) -> Self {
        let store = InMemoryStore::with_records(records).expect("Failed to populate store");
        Self::build(store, PipelineConfig::default(), None).await
    }

    /// Harness over a preconfigured store (failure or delay injection).
    pub async fn with_store(store: InMemoryStore, config: PipelineConfig) -> Self {
        Self::build(store, config, None).await
    }

    /// Harness with a generative model attached.
    pub async fn with_model(records: Vec<TaskRecord>, model: Arc<dyn GenerativeModel>) -> Self {
        let store = InMemoryStore::with_records(records).expect("Failed to populate store");
        Self::build(store, PipelineConfig::default(), Some(model)).await
    }

    async fn build(
        store: InMemoryStore,
        config: PipelineConfig,
        model: Option<Arc<dyn GenerativeModel>>,
    ) -> Self {
        let store = Arc::new(store);
        let shared: Arc<dyn DocumentStore> = store.clone();
        let mut pipeline = QueryPipeline::new(shared, config);
        if let Some(model) = model {
            pipeline = pipeline.with_model(model);
        }
        pipeline.refresh_vocabulary().await;
        Self { store, pipeline }
    }
}

/// The three-task corpus used by the scenario tests.
///
/// - T1: Alpha / Sprint-1, high priority bug, done
/// - T2: Alpha / Sprint-1, low priority story, in progress
/// - T3: Beta / Sprint-2, high priority bug, done
pub fn scenario_corpus() -> Vec<TaskRecord> {
    vec![
        TaskRecord::new("T1")
            .with_title("Login page crashes on submit")
            .with_priority("High")
            .with_issue_type("Bug")
            .with_status("Done")
            .with_assignee("Alice Smith")
            .with_project("Alpha")
            .with_sprint("Sprint-1"),
        TaskRecord::new("T2")
            .with_title("Add dark mode to settings")
            .with_priority("Low")
            .with_issue_type("Story")
            .with_status("In Progress")
            .with_assignee("Bob Jones")
            .with_project("Alpha")
            .with_sprint("Sprint-1"),
        TaskRecord::new("T3")
            .with_title("Payment timeout on mobile")
            .with_priority("High")
            .with_issue_type("Bug")
            .with_status("Done")
            .with_assignee("Carol White")
            .with_project("Beta")
            .with_sprint("Sprint-2"),
    ]
}

/// A broader corpus with missing fields and more variety.
pub fn mixed_corpus() -> Vec<TaskRecord> {
    let mut records = scenario_corpus();
    records.extend([
        TaskRecord::new("T4")
            .with_title("Upgrade database driver")
            .with_priority("Medium")
            .with_issue_type("Task")
            .with_status("To Do")
            .with_project("Beta")
            .with_sprint("Sprint-2"),
        TaskRecord::new("T5")
            .with_title("Crash when exporting reports")
            .with_priority("Critical")
            .with_issue_type("Bug")
            .with_status("In Progress")
            .with_assignee("Alice Smith")
            .with_project("Gamma"),
        TaskRecord::new("T6").with_title("Untriaged report"),
    ]);
    records
}

/// Sorted task ids of a response.
pub fn task_ids(response: &QueryResponse) -> Vec<String> {
    let mut ids: Vec<String> = response
        .result
        .tasks
        .iter()
        .map(|task| task.id.clone())
        .collect();
    ids.sort();
    ids
}
