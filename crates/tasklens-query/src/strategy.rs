//! Retrieval strategy selection and execution.
//!
//! The structural filters in the query context decide how candidates are
//! gathered:
//!
//! | filters set | strategy | store call                        |
//! |-------------|----------|-----------------------------------|
//! | both        | targeted | `get_all`, exact structural match |
//! | one         | hybrid   | similarity top 50, post-filtered  |
//! | none        | semantic | similarity top 25                 |

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tasklens_store::{DocumentStore, StoreError};
use tasklens_types::{QueryContext, RetrievalResult, RetrievalSettings};

use crate::error::QueryError;
use crate::filter::FilterPredicate;

/// The three candidate-gathering strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Targeted,
    Hybrid,
    Semantic,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Targeted => "targeted",
            StrategyKind::Hybrid => "hybrid",
            StrategyKind::Semantic => "semantic",
        }
    }
}

/// A selected strategy with everything needed to run it.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalStrategy {
    /// Enumerate the corpus and keep exact sprint and project matches.
    Targeted { filter: FilterPredicate },

    /// Similarity search, then post-filter on the one structural filter.
    Hybrid { filter: FilterPredicate, top_k: usize },

    /// Plain similarity search.
    Semantic { top_k: usize },
}

impl RetrievalStrategy {
    /// Pick a strategy from the structural filters present in `context`.
    pub fn select(context: &QueryContext, settings: &RetrievalSettings) -> Self {
        let strategy = match (&context.sprint_filter, &context.project_filter) {
            (Some(_), Some(_)) => RetrievalStrategy::Targeted {
                filter: FilterPredicate::structural(context),
            },
            (None, None) => RetrievalStrategy::Semantic {
                top_k: settings.semantic_top_k,
            },
            _ => RetrievalStrategy::Hybrid {
                filter: FilterPredicate::structural(context),
                top_k: settings.hybrid_top_k,
            },
        };

        debug!(strategy = strategy.kind().as_str(), "Selected retrieval strategy");
        strategy
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            RetrievalStrategy::Targeted { .. } => StrategyKind::Targeted,
            RetrievalStrategy::Hybrid { .. } => StrategyKind::Hybrid,
            RetrievalStrategy::Semantic { .. } => StrategyKind::Semantic,
        }
    }

    /// Gather candidates, sorted by descending relevance score.
    ///
    /// Each store call is bounded by `timeout`; failures and timeouts surface
    /// as `QueryError::Retrieval` for the caller to degrade on.
    pub async fn retrieve(
        &self,
        store: &dyn DocumentStore,
        query_text: &str,
        timeout: Duration,
    ) -> Result<Vec<RetrievalResult>, QueryError> {
        let mut results = match self {
            RetrievalStrategy::Targeted { filter } => {
                let records = bounded(timeout, store.get_all()).await?;
                let scanned = records.len();
                let kept: Vec<RetrievalResult> = records
                    .into_iter()
                    .filter(|record| filter.evaluate(record))
                    .map(|record| RetrievalResult::new(record, 1.0))
                    .collect();
                debug!(scanned, kept = kept.len(), "Targeted scan");
                kept
            }
            RetrievalStrategy::Hybrid { filter, top_k } => {
                let hits = bounded(timeout, store.similarity_search(query_text, *top_k)).await?;
                let returned = hits.len();
                let kept: Vec<RetrievalResult> = hits
                    .into_iter()
                    .filter(|hit| filter.evaluate(&hit.record))
                    .collect();
                debug!(returned, kept = kept.len(), top_k, "Hybrid search");
                kept
            }
            RetrievalStrategy::Semantic { top_k } => {
                bounded(timeout, store.similarity_search(query_text, *top_k)).await?
            }
        };

        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

        info!(
            strategy = self.kind().as_str(),
            candidates = results.len(),
            "Retrieved candidates"
        );
        Ok(results)
    }
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, QueryError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(QueryError::Retrieval(e.to_string())),
        Err(_) => Err(QueryError::Retrieval(format!(
            "store call timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}
