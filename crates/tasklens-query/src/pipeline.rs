//! Query pipeline: normalize, classify, extract, retrieve, filter, aggregate.
//!
//! `QueryPipeline` is the only place that decides how component failures are
//! recovered. Components return `Result<_, QueryError>`; the pipeline maps
//! each error kind to its fallback:
//!
//! - vocabulary build failure: seed vocabulary
//! - correction failure: the original text
//! - criteria parse failure: handled inside `LlmExtractor` (deterministic fallback)
//! - retrieval failure: empty candidate set, response marked degraded
//! - aggregation failure: record skipped
//!
//! Only `EmptyQuery` and `MixedOperators` reach the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tasklens_llm::GenerativeModel;
use tasklens_store::{
    ingest_items, list_records, CorpusStats, DocumentStore, IngestReport, RawTaskItem,
    RecordFilter, RecordPage,
};
use tasklens_types::{
    ClassifierSettings, CriteriaGroup, QueryContext, RetrievalResult, RetrievalSettings, Settings,
};

use crate::aggregate::{aggregate, AggregatedResult};
use crate::classifier::{ComplexityAssessment, ComplexityClassifier};
use crate::error::QueryError;
use crate::extractor::{validate_query, CriteriaExtractor, DeterministicExtractor, LlmExtractor};
use crate::filter::apply_filters;
use crate::normalizer::Normalizer;
use crate::similarity::SimilarityScorer;
use crate::strategy::{RetrievalStrategy, StrategyKind};
use crate::vocabulary::{Vocabulary, VocabularyStore};

/// Incoming query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,

    #[serde(default)]
    pub sprint_filter: Option<String>,

    #[serde(default)]
    pub project_filter: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_sprint(mut self, sprint: impl Into<String>) -> Self {
        self.sprint_filter = Some(sprint.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project_filter = Some(project.into());
        self
    }

    /// Structural context, with blank filters dropped.
    pub fn context(&self) -> QueryContext {
        QueryContext::from_filters(self.sprint_filter.clone(), self.project_filter.clone())
    }
}

/// Which extractor and response path handled a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePath {
    /// Deterministic extraction, structured result only
    Fast,
    /// Model-assisted extraction plus a prose answer
    Slow,
}

/// Everything the pipeline produced for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub query: String,
    pub normalized_query: String,
    pub path: ResponsePath,
    pub complexity: ComplexityAssessment,
    pub strategy: StrategyKind,
    pub criteria: CriteriaGroup,
    pub result: AggregatedResult,

    /// Prose answer, slow path only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// True when a collaborator failed and the result may be incomplete
    pub degraded: bool,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub retrieval: RetrievalSettings,
    pub classifier: ClassifierSettings,
    /// Upper bound for one generative model call
    pub model_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalSettings::default(),
            classifier: ClassifierSettings::default(),
            model_timeout: Duration::from_secs(20),
        }
    }
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            retrieval: settings.retrieval.clone(),
            classifier: settings.classifier.clone(),
            model_timeout: settings.model.timeout(),
        }
    }
}

/// The query engine.
///
/// Holds no per-query state, so one instance serves any number of
/// concurrent queries. The vocabulary starts as the seed snapshot; call
/// `refresh_vocabulary` once the store holds the corpus.
pub struct QueryPipeline {
    store: Arc<dyn DocumentStore>,
    model: Option<Arc<dyn GenerativeModel>>,
    vocabulary: Arc<VocabularyStore>,
    normalizer: Normalizer,
    classifier: ComplexityClassifier,
    fast: DeterministicExtractor,
    llm: Option<LlmExtractor>,
    config: PipelineConfig,
}

impl QueryPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            model: None,
            vocabulary: Arc::new(VocabularyStore::default()),
            normalizer: Normalizer::new(),
            classifier: ComplexityClassifier::from_settings(config.classifier.clone()),
            fast: DeterministicExtractor::new(),
            llm: None,
            config,
        }
    }

    /// Enable the slow path.
    pub fn with_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.llm = Some(LlmExtractor::new(Arc::clone(&model), self.config.model_timeout));
        self.model = Some(model);
        self
    }

    /// Use a different similarity algorithm for correction.
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.normalizer = self.normalizer.with_scorer(scorer);
        debug!(scorer = self.normalizer.scorer_name(), "Similarity scorer selected");
        self
    }

    /// Share a vocabulary holder with other components.
    pub fn with_vocabulary_store(mut self, vocabulary: Arc<VocabularyStore>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// The vocabulary snapshot currently in effect.
    pub fn vocabulary(&self) -> Arc<Vocabulary> {
        self.vocabulary.current()
    }

    /// Rebuild the vocabulary from the store. Falls back to the seed
    /// vocabulary when the corpus cannot be read.
    pub async fn refresh_vocabulary(&self) -> Arc<Vocabulary> {
        let load = tokio::time::timeout(
            self.config.retrieval.store_timeout(),
            self.vocabulary.refresh(self.store.as_ref()),
        )
        .await
        .unwrap_or_else(|_| Err(QueryError::VocabularyBuild("store timed out".to_string())));

        match load {
            Ok(vocabulary) => vocabulary,
            Err(e) => {
                warn!(error = %e, "Vocabulary build failed, using seed vocabulary");
                self.vocabulary.replace(Vocabulary::seed())
            }
        }
    }

    /// Normalize text against the current vocabulary. On correction failure
    /// the original text is returned unchanged.
    pub fn normalize(&self, text: &str) -> String {
        self.normalize_with(text, &self.vocabulary.current())
    }

    fn normalize_with(&self, text: &str, vocabulary: &Vocabulary) -> String {
        match self.normalizer.normalize(text, vocabulary) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(
                    error = %e,
                    scorer = self.normalizer.scorer_name(),
                    "Normalization failed, using original text"
                );
                text.trim().to_string()
            }
        }
    }

    /// Answer a query.
    ///
    /// Errors only for invalid input; collaborator failures produce a
    /// (possibly empty) degraded response instead.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
        let started = Instant::now();
        if request.query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let context = request.context();
        // One snapshot for the whole query
        let vocabulary = self.vocabulary.current();

        let normalized = self.normalize_with(&request.query, &vocabulary);
        validate_query(&normalized)?;

        let complexity = self.classifier.assess(&normalized, &vocabulary);
        let slow = match (&self.llm, complexity.requires_model) {
            (Some(llm), true) => Some(llm),
            _ => None,
        };
        let path = if slow.is_some() {
            ResponsePath::Slow
        } else {
            ResponsePath::Fast
        };

        let criteria = match slow {
            Some(llm) => llm.extract(&normalized, &context, &vocabulary).await?,
            None => self.fast.extract(&normalized, &context, &vocabulary).await?,
        };
        debug!(criteria = ?criteria, path = ?path, "Criteria extracted");

        let strategy = RetrievalStrategy::select(&context, &self.config.retrieval);
        let query_text = context_query_text(&normalized, &context);
        let mut degraded = false;
        let candidates = match strategy
            .retrieve(
                self.store.as_ref(),
                &query_text,
                self.config.retrieval.store_timeout(),
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, strategy = strategy.kind().as_str(), "Retrieval failed, continuing with no candidates");
                degraded = true;
                Vec::new()
            }
        };

        let filtered = apply_filters(candidates, &criteria, &context);
        let answer = match (path, &self.model) {
            (ResponsePath::Slow, Some(model)) => {
                let (answer, answer_degraded) =
                    self.synthesize(model.as_ref(), &query_text, &filtered).await;
                degraded |= answer_degraded;
                Some(answer)
            }
            _ => None,
        };
        let result = aggregate(&filtered);

        info!(
            query = %request.query,
            normalized = %normalized,
            path = ?path,
            strategy = strategy.kind().as_str(),
            tasks = result.tasks.len(),
            degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(QueryResponse {
            query: request.query.clone(),
            normalized_query: normalized,
            path,
            complexity,
            strategy: strategy.kind(),
            criteria,
            result,
            answer,
            degraded,
        })
    }

    /// Ask the model for prose over the filtered records. Returns the answer
    /// and whether the deterministic fallback had to be used.
    async fn synthesize(
        &self,
        model: &dyn GenerativeModel,
        query_text: &str,
        results: &[RetrievalResult],
    ) -> (String, bool) {
        let prompt = answer_prompt(query_text, results);
        match tokio::time::timeout(self.config.model_timeout, model.invoke(&prompt)).await {
            Ok(Ok(answer)) if !answer.trim().is_empty() => (answer.trim().to_string(), false),
            Ok(Ok(_)) => {
                warn!("Model returned an empty answer, using fallback");
                (fallback_answer(results), true)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Answer synthesis failed, using fallback");
                (fallback_answer(results), true)
            }
            Err(_) => {
                warn!(timeout_ms = self.config.model_timeout.as_millis() as u64, "Answer synthesis timed out, using fallback");
                (fallback_answer(results), true)
            }
        }
    }

    /// Add raw tracker items to the store, then rebuild the vocabulary.
    pub async fn ingest(&self, items: Vec<RawTaskItem>) -> Result<IngestReport, QueryError> {
        let timeout = self.config.retrieval.store_timeout();
        let ingest = ingest_items(
            self.store.as_ref(),
            items,
            self.config.retrieval.ingest_batch_size,
        );
        let report = match tokio::time::timeout(timeout, ingest).await {
            Ok(result) => result.map_err(|e| QueryError::Ingest(e.to_string()))?,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Ingest timed out");
                return Err(QueryError::Ingest("store timed out".to_string()));
            }
        };

        self.refresh_vocabulary().await;
        Ok(report)
    }

    /// Drop the collection, then rebuild the vocabulary (back to seeds).
    pub async fn clear(&self) -> Result<usize, QueryError> {
        let timeout = self.config.retrieval.store_timeout();
        let removed = match tokio::time::timeout(timeout, self.store.delete_collection()).await {
            Ok(result) => result.map_err(|e| QueryError::Ingest(e.to_string()))?,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Clearing the collection timed out");
                return Err(QueryError::Ingest("store timed out".to_string()));
            }
        };
        info!(removed, "Collection cleared");

        self.refresh_vocabulary().await;
        Ok(removed)
    }

    pub async fn corpus_stats(&self) -> Result<CorpusStats, QueryError> {
        let records = self.all_records().await?;
        Ok(CorpusStats::from_records(&records))
    }

    pub async fn list_records(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<RecordPage, QueryError> {
        let records = self.all_records().await?;
        Ok(list_records(&records, filter, offset, limit))
    }

    async fn all_records(&self) -> Result<Vec<tasklens_types::TaskRecord>, QueryError> {
        let timeout = self.config.retrieval.store_timeout();
        match tokio::time::timeout(timeout, self.store.get_all()).await {
            Ok(result) => result.map_err(|e| QueryError::Retrieval(e.to_string())),
            Err(_) => Err(QueryError::Retrieval("store timed out".to_string())),
        }
    }
}

/// Text sent to vector search and the model: `project: P | sprint: S | query: Q`.
pub fn context_query_text(query: &str, context: &QueryContext) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(project) = &context.project_filter {
        parts.push(format!("project: {}", project));
    }
    if let Some(sprint) = &context.sprint_filter {
        parts.push(format!("sprint: {}", sprint));
    }
    if parts.is_empty() {
        return query.to_string();
    }
    parts.push(format!("query: {}", query));
    parts.join(" | ")
}

fn answer_prompt(query_text: &str, results: &[RetrievalResult]) -> String {
    let context = results
        .iter()
        .map(|r| r.record.document_text())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Context:\n{}\n\nQuery: {}\nAnswer in a concise manner:",
        context, query_text
    )
}

/// Deterministic answer listing the matched tasks.
pub fn fallback_answer(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return "No tasks matched the query.".to_string();
    }

    let field = |value: &Option<String>, default: &'static str| -> String {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let mut lines = vec![format!("Found {} matching task(s):", results.len())];
    for result in results {
        let record = &result.record;
        lines.push(format!(
            "- {}: {} [{}, {}, {} priority, {}]",
            record.id,
            field(&record.title, "Unknown Title"),
            field(&record.issue_type, "Task"),
            field(&record.status, "Unknown"),
            field(&record.priority, "Medium"),
            field(&record.assignee, "Unassigned"),
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklens_llm::MockModel;
    use tasklens_store::InMemoryStore;
    use tasklens_types::TaskRecord;

    fn corpus() -> Vec<TaskRecord> {
        vec![
            TaskRecord::new("T1")
                .with_title("Login crash")
                .with_priority("High")
                .with_status("Done")
                .with_issue_type("Bug")
                .with_assignee("Alice")
                .with_project("Alpha")
                .with_sprint("Sprint-1"),
            TaskRecord::new("T2")
                .with_title("Dark mode")
                .with_priority("Low")
                .with_status("In Progress")
                .with_issue_type("Story")
                .with_project("Alpha")
                .with_sprint("Sprint-1"),
        ]
    }

    async fn pipeline_with(store: InMemoryStore) -> QueryPipeline {
        let pipeline = QueryPipeline::new(Arc::new(store), PipelineConfig::default());
        pipeline.refresh_vocabulary().await;
        pipeline
    }

    async fn pipeline() -> QueryPipeline {
        pipeline_with(InMemoryStore::with_records(corpus()).unwrap()).await
    }

    fn ids(response: &QueryResponse) -> Vec<&str> {
        response.result.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_context_query_text() {
        let both = QueryContext::new().with_project("Alpha").with_sprint("Sprint-1");
        assert_eq!(
            context_query_text("bugs", &both),
            "project: Alpha | sprint: Sprint-1 | query: bugs"
        );
        assert_eq!(context_query_text("bugs", &QueryContext::new()), "bugs");
    }

    #[test]
    fn test_fallback_answer() {
        assert_eq!(fallback_answer(&[]), "No tasks matched the query.");
        let results = vec![RetrievalResult::new(corpus().remove(0), 1.0)];
        assert_eq!(
            fallback_answer(&results),
            "Found 1 matching task(s):\n- T1: Login crash [Bug, Done, High priority, Alice]"
        );
    }

    #[tokio::test]
    async fn test_fast_path_targeted() {
        let pipeline = pipeline().await;
        let request = QueryRequest::new("hgh priorty bugs")
            .with_sprint("Sprint-1")
            .with_project("Alpha");

        let response = pipeline.query(&request).await.unwrap();
        assert_eq!(response.normalized_query, "high priority bugs");
        assert_eq!(response.path, ResponsePath::Fast);
        assert_eq!(response.strategy, StrategyKind::Targeted);
        assert_eq!(ids(&response), vec!["T1"]);
        assert!(response.answer.is_none());
        assert!(!response.degraded);
    }

    #[tokio::test]
    async fn test_caller_errors_surface() {
        let pipeline = pipeline().await;
        assert_eq!(
            pipeline.query(&QueryRequest::new("  ")).await.unwrap_err(),
            QueryError::EmptyQuery
        );
        assert_eq!(
            pipeline
                .query(&QueryRequest::new("bugs and stories or done"))
                .await
                .unwrap_err(),
            QueryError::MixedOperators
        );
    }

    #[tokio::test]
    async fn test_slow_path_uses_model() {
        let model = Arc::new(
            MockModel::new("unused")
                .then_respond(r#"{"issue_type": "story"}"#)
                .then_respond("One story is in progress."),
        );
        let pipeline = QueryPipeline::new(
            Arc::new(InMemoryStore::with_records(corpus()).unwrap()),
            PipelineConfig::default(),
        )
        .with_model(model.clone());
        pipeline.refresh_vocabulary().await;

        let request = QueryRequest::new("which stories are moving").with_project("Alpha");
        let response = pipeline.query(&request).await.unwrap();

        assert_eq!(response.path, ResponsePath::Slow);
        assert_eq!(ids(&response), vec!["T2"]);
        assert_eq!(response.answer.as_deref(), Some("One story is in progress."));
        assert!(!response.degraded);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("Context:\nTask ID: T2"));
        assert!(prompts[1].ends_with("Query: project: Alpha | query: which stories are moving\nAnswer in a concise manner:"));
    }

    #[tokio::test]
    async fn test_model_failure_degrades_answer() {
        let pipeline = QueryPipeline::new(
            Arc::new(InMemoryStore::with_records(corpus()).unwrap()),
            PipelineConfig::default(),
        )
        .with_model(Arc::new(MockModel::failing()));
        pipeline.refresh_vocabulary().await;

        let request = QueryRequest::new("which bugs are done")
            .with_sprint("Sprint-1")
            .with_project("Alpha");
        let response = pipeline.query(&request).await.unwrap();

        assert_eq!(response.path, ResponsePath::Slow);
        assert_eq!(ids(&response), vec!["T1"]);
        assert!(response.degraded);
        assert!(response.answer.unwrap().starts_with("Found 1 matching task(s):"));
    }

    #[tokio::test]
    async fn test_without_model_complex_queries_stay_fast() {
        let pipeline = pipeline().await;
        let response = pipeline.query(&QueryRequest::new("hi")).await.unwrap();
        assert!(response.complexity.requires_model);
        assert_eq!(response.path, ResponsePath::Fast);
        assert!(response.answer.is_none());
    }

    #[tokio::test]
    async fn test_retrieval_failure_degrades() {
        let store = InMemoryStore::with_records(corpus())
            .unwrap()
            .with_search_failure("vector store down");
        let pipeline = pipeline_with(store).await;

        let response = pipeline.query(&QueryRequest::new("bugs")).await.unwrap();
        assert!(response.degraded);
        assert!(response.result.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_and_clear_refresh_vocabulary() {
        let pipeline = pipeline_with(InMemoryStore::new()).await;
        assert!(pipeline.vocabulary().is_seed_only());

        let items: Vec<RawTaskItem> = serde_json::from_str(
            r#"[{"issueKey": "G-1", "summary": "Gamma crash", "projectId": "Gamma", "priority": "Blocker"},
                {"issueKey": "G-2", "description": "   "}]"#,
        )
        .unwrap();
        let report = pipeline.ingest(items).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 1);
        assert!(pipeline
            .vocabulary()
            .contains_value(tasklens_types::TaskField::Project, "gamma"));

        let stats = pipeline.corpus_stats().await.unwrap();
        assert_eq!(stats.projects, vec!["Gamma".to_string()]);

        assert_eq!(pipeline.clear().await.unwrap(), 1);
        assert!(pipeline.vocabulary().is_seed_only());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_writes_time_out_as_ingest_errors() {
        let store = InMemoryStore::with_records(corpus())
            .unwrap()
            .with_write_delay(Duration::from_secs(60));
        let config = PipelineConfig {
            retrieval: tasklens_types::RetrievalSettings {
                store_timeout_ms: 100,
                ..Default::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = QueryPipeline::new(Arc::new(store), config);
        pipeline.refresh_vocabulary().await;

        let items: Vec<RawTaskItem> =
            serde_json::from_str(r#"[{"issueKey": "G-1", "summary": "Gamma crash"}]"#).unwrap();
        let err = pipeline.ingest(items).await.unwrap_err();
        assert!(matches!(err, QueryError::Ingest(_)));

        let err = pipeline.clear().await.unwrap_err();
        assert!(matches!(err, QueryError::Ingest(_)));
        assert_eq!(pipeline.corpus_stats().await.unwrap().total_documents, 2);
    }

    #[tokio::test]
    async fn test_list_records() {
        let pipeline = pipeline().await;
        let filter = RecordFilter {
            status: Some("done".to_string()),
            ..RecordFilter::default()
        };
        let page = pipeline.list_records(&filter, 0, 10).await.unwrap();
        assert_eq!(page.total_filtered, 1);
        assert_eq!(page.records[0].id, "T1");
    }
}
