//! Degradation and concurrency E2E tests for tasklens.
//!
//! Collaborator failures (vector store down or slow, model failing or
//! returning garbage) must never abort a query; the pipeline returns a
//! possibly empty result marked degraded. Concurrent queries share one
//! pipeline and one vocabulary snapshot holder.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;

use e2e_tests::{mixed_corpus, scenario_corpus, task_ids, TestHarness};
use tasklens_llm::MockModel;
use tasklens_query::{PipelineConfig, QueryRequest, ResponsePath, StrategyKind, Vocabulary};
use tasklens_store::InMemoryStore;
use tasklens_types::{FieldValue, RetrievalSettings};

#[tokio::test]
async fn test_search_failure_returns_degraded_empty_result() {
    let store = InMemoryStore::with_records(scenario_corpus())
        .unwrap()
        .with_search_failure("connection refused");
    let harness = TestHarness::with_store(store, PipelineConfig::default()).await;

    let response = harness
        .pipeline
        .query(&QueryRequest::new("high priority bugs").with_project("Alpha"))
        .await
        .unwrap();

    assert!(response.degraded);
    assert!(response.result.tasks.is_empty());
    assert_eq!(response.result.statistics.total, 0);
    assert_eq!(harness.store.search_calls(), 1);
}

#[tokio::test]
async fn test_targeted_queries_survive_search_outage() {
    let store = InMemoryStore::with_records(scenario_corpus())
        .unwrap()
        .with_search_failure("connection refused");
    let harness = TestHarness::with_store(store, PipelineConfig::default()).await;

    let request = QueryRequest::new("high priority bugs")
        .with_sprint("Sprint-1")
        .with_project("Alpha");
    let response = harness.pipeline.query(&request).await.unwrap();

    assert!(!response.degraded);
    assert_eq!(task_ids(&response), vec!["T1"]);
}

#[tokio::test]
async fn test_unreadable_corpus_falls_back_to_seed_vocabulary() {
    let store = InMemoryStore::with_records(scenario_corpus())
        .unwrap()
        .with_get_all_failure("scan disabled");
    let harness = TestHarness::with_store(store, PipelineConfig::default()).await;

    assert!(harness.pipeline.vocabulary().is_seed_only());
    let refreshed = harness.pipeline.refresh_vocabulary().await;
    assert_eq!(*refreshed, Vocabulary::seed());

    // Search does not depend on the full scan
    let response = harness
        .pipeline
        .query(&QueryRequest::new("show all tasks").with_sprint("Sprint-1"))
        .await
        .unwrap();
    assert!(!response.degraded);
    assert_eq!(task_ids(&response), vec!["T1", "T2"]);
}

#[tokio::test]
async fn test_targeted_query_degrades_when_corpus_is_unreadable() {
    let store = InMemoryStore::with_records(scenario_corpus())
        .unwrap()
        .with_get_all_failure("scan disabled");
    let harness = TestHarness::with_store(store, PipelineConfig::default()).await;

    let request = QueryRequest::new("high priority bugs")
        .with_sprint("Sprint-1")
        .with_project("Alpha");
    let response = harness.pipeline.query(&request).await.unwrap();

    assert_eq!(response.strategy, StrategyKind::Targeted);
    assert!(response.degraded);
    assert!(response.result.tasks.is_empty());
    assert_eq!(harness.store.search_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let store = InMemoryStore::with_records(scenario_corpus())
        .unwrap()
        .with_search_delay(Duration::from_secs(60));
    let config = PipelineConfig {
        retrieval: RetrievalSettings {
            store_timeout_ms: 100,
            ..RetrievalSettings::default()
        },
        ..PipelineConfig::default()
    };
    let harness = TestHarness::with_store(store, config).await;

    let response = harness
        .pipeline
        .query(&QueryRequest::new("login crash"))
        .await
        .unwrap();

    assert!(response.degraded);
    assert!(response.result.tasks.is_empty());
}

#[tokio::test]
async fn test_garbage_model_output_falls_back_to_deterministic_criteria() {
    let model = Arc::new(
        MockModel::new("The answer is: several bugs.")
            .then_respond("I think you mean high priority bugs")
            .then_respond("T1 is the only high priority bug in Alpha."),
    );
    let harness = TestHarness::with_model(scenario_corpus(), model.clone()).await;

    let request = QueryRequest::new("which high priority bugs")
        .with_sprint("Sprint-1")
        .with_project("Alpha");
    let response = harness.pipeline.query(&request).await.unwrap();

    assert_eq!(response.path, ResponsePath::Slow);
    assert_eq!(response.criteria.criteria[0].priority, Some(FieldValue::from("high")));
    assert_eq!(response.criteria.criteria[0].issue_type, Some(FieldValue::from("bug")));
    assert_eq!(task_ids(&response), vec!["T1"]);
    assert_eq!(
        response.answer.as_deref(),
        Some("T1 is the only high priority bug in Alpha.")
    );
    assert!(!response.degraded);
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn test_failing_model_gives_fallback_answer() {
    let harness = TestHarness::with_model(scenario_corpus(), Arc::new(MockModel::failing())).await;

    let request = QueryRequest::new("which bugs are done").with_project("Beta");
    let response = harness.pipeline.query(&request).await.unwrap();

    assert_eq!(response.path, ResponsePath::Slow);
    assert!(response.degraded);
    assert_eq!(task_ids(&response), vec!["T3"]);
    let answer = response.answer.unwrap();
    assert!(answer.starts_with("Found 1 matching task(s):"));
    assert!(answer.contains("T3: Payment timeout on mobile"));
}

#[tokio::test]
async fn test_model_never_widens_project_scope() {
    // The model asks for every bug; the project filter still applies.
    let model = Arc::new(MockModel::new(r#"{"issue_type": "bug"}"#));
    let harness = TestHarness::with_model(scenario_corpus(), model).await;

    let response = harness
        .pipeline
        .query(&QueryRequest::new("which bugs are open").with_project("Beta"))
        .await
        .unwrap();
    assert_eq!(task_ids(&response), vec!["T3"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_queries_share_one_pipeline() {
    let harness = Arc::new(TestHarness::new(mixed_corpus()).await);

    let requests: Vec<(QueryRequest, Vec<&str>)> = vec![
        (
            QueryRequest::new("high priority bugs")
                .with_sprint("Sprint-1")
                .with_project("Alpha"),
            vec!["T1"],
        ),
        (
            QueryRequest::new("show all tasks").with_sprint("Sprint-1"),
            vec!["T1", "T2"],
        ),
        (
            QueryRequest::new("to do").with_sprint("Sprint-2").with_project("Beta"),
            vec!["T4"],
        ),
        (
            QueryRequest::new("bugs with alice").with_project("Gamma"),
            vec!["T5"],
        ),
    ];

    let tasks = (0..8).flat_map(|_| requests.iter()).map(|(request, expected)| {
        let harness = Arc::clone(&harness);
        let request = request.clone();
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        tokio::spawn(async move {
            let response = harness.pipeline.query(&request).await.unwrap();
            assert_eq!(task_ids(&response), expected, "{}", request.query);
        })
    });

    // Swap vocabulary snapshots while queries are in flight
    let refresher = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move {
            for _ in 0..10 {
                harness.pipeline.refresh_vocabulary().await;
                tokio::task::yield_now().await;
            }
        })
    };

    for result in join_all(tasks).await {
        result.unwrap();
    }
    refresher.await.unwrap();
}
