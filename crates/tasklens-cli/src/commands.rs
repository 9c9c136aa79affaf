//! Command implementations for the tasklens CLI.
//!
//! Every command loads settings, installs logging, reads the corpus export
//! into an in-memory store and builds a `QueryPipeline` over it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use tasklens_llm::{ApiModel, ApiModelConfig};
use tasklens_query::{PipelineConfig, QueryPipeline, QueryRequest, QueryResponse};
use tasklens_store::{parse_export, InMemoryStore, RecordFilter};
use tasklens_types::Settings;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<String>,
    pub log_level: Option<String>,
    pub corpus: Option<String>,
}

/// Load configuration and apply CLI overrides.
pub fn load_settings(options: &GlobalOptions) -> Result<Settings> {
    let mut settings =
        Settings::load(options.config.as_deref()).context("Failed to load configuration")?;

    if let Some(log_level) = &options.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(corpus) = &options.corpus {
        settings.corpus_path = corpus.clone();
    }
    Ok(settings)
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build a pipeline over the corpus file at `path`.
///
/// The generative model is attached unless the provider is `none` or its
/// configuration is incomplete.
pub async fn build_pipeline(settings: &Settings, path: &Path) -> Result<QueryPipeline> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {:?}", path))?;
    let items = parse_export(&json).with_context(|| format!("Failed to parse corpus {:?}", path))?;

    let store = Arc::new(InMemoryStore::new());
    let mut pipeline = QueryPipeline::new(store, PipelineConfig::from_settings(settings));

    if settings.model.is_enabled() {
        match ApiModelConfig::from_settings(&settings.model).and_then(ApiModel::new) {
            Ok(model) => {
                info!(provider = %settings.model.provider, model = %settings.model.model, "Generative model enabled");
                pipeline = pipeline.with_model(Arc::new(model));
            }
            Err(e) => warn!(error = %e, "Generative model unavailable, using fast path only"),
        }
    }

    let report = pipeline
        .ingest(items)
        .await
        .context("Failed to load corpus into store")?;
    info!(
        path = ?path,
        added = report.added,
        skipped = report.skipped,
        failed = report.failed,
        "Corpus loaded"
    );
    Ok(pipeline)
}

/// Render a response for the terminal.
pub fn render_response(response: &QueryResponse) -> String {
    let mut out = Vec::new();
    if let Some(answer) = &response.answer {
        out.push(answer.clone());
        out.push(String::new());
    }

    let stats = &response.result.statistics;
    out.push(format!(
        "{} task(s) [{} strategy, normalized: \"{}\"]",
        stats.total,
        response.strategy.as_str(),
        response.normalized_query
    ));
    for task in &response.result.tasks {
        out.push(format!(
            "  {:<12} {:<12} {:<8} {:<12} {}",
            task.id, task.status, task.priority, task.assignee, task.title
        ));
    }
    if stats.total > 0 {
        out.push(format!(
            "completed: {}  in progress: {}  high priority: {}  bugs: {}",
            stats.completed, stats.in_progress, stats.high_priority, stats.bugs
        ));
    }
    if response.degraded {
        out.push("(degraded: some collaborators were unavailable)".to_string());
    }
    out.join("\n")
}

pub async fn handle_query(
    pipeline: &QueryPipeline,
    text: String,
    sprint: Option<String>,
    project: Option<String>,
    json: bool,
) -> Result<()> {
    let request = QueryRequest {
        query: text,
        sprint_filter: sprint,
        project_filter: project,
    };
    let response = pipeline.query(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", render_response(&response));
    }
    Ok(())
}

pub fn handle_vocab(pipeline: &QueryPipeline) -> Result<()> {
    let vocabulary = pipeline.vocabulary();
    println!("{}", serde_json::to_string_pretty(vocabulary.as_ref())?);
    Ok(())
}

pub async fn handle_stats(pipeline: &QueryPipeline) -> Result<()> {
    let stats = pipeline.corpus_stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn handle_list(
    pipeline: &QueryPipeline,
    filter: RecordFilter,
    offset: usize,
    limit: usize,
) -> Result<()> {
    let page = pipeline.list_records(&filter, offset, limit).await?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

pub fn handle_normalize(pipeline: &QueryPipeline, text: &str) -> Result<()> {
    println!("{}", pipeline.normalize(text));
    Ok(())
}
