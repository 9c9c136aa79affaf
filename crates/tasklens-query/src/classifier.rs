//! Complexity classification for queries.
//!
//! Decides whether a query needs the generative model (slow path) or can be
//! handled by the deterministic extractor (fast path). The decision only
//! affects cost and latency; filtering is identical on both paths.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tasklens_types::ClassifierSettings;

use crate::vocabulary::{pad, Vocabulary};

/// Why a query was routed the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityReason {
    TooShort,
    AnalyticalKeyword,
    ManyCategories,
    RequestPhrase,
    TooManyTokens,
    Simple,
}

/// Result of complexity classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    /// True when the generative model should handle the query
    pub requires_model: bool,

    /// First rule that decided
    pub reason: ComplexityReason,

    /// Keywords, phrases or categories that triggered the rule
    pub matched_keywords: Vec<String>,
}

impl ComplexityAssessment {
    fn decided(reason: ComplexityReason, matched_keywords: Vec<String>) -> Self {
        Self {
            requires_model: reason != ComplexityReason::Simple,
            reason,
            matched_keywords,
        }
    }
}

/// Configuration for complexity classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Length and count thresholds
    pub settings: ClassifierSettings,

    /// Analytical, comparative, temporal and quantitative terms
    pub analytical_keywords: Vec<String>,

    /// Conversational request phrases
    pub request_phrases: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            settings: ClassifierSettings::default(),
            analytical_keywords: [
                // Reasoning
                "why", "how", "explain", "analyze", "analysis", "summarize", "summary",
                // Comparison
                "compare", "comparison", "versus", "vs",
                // Trends and time
                "trend", "trends", "since", "before", "after", "between", "over time",
                "last week", "last month", "this week", "this month", "yesterday", "today",
                // Quantities
                "how many", "how much", "average", "total", "count", "percentage", "ratio",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            request_phrases: [
                "which", "what are", "what is", "show me", "can you", "could you", "tell me",
                "give me", "i need", "i want", "who is", "who are",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Keyword and threshold based complexity classifier.
pub struct ComplexityClassifier {
    config: ClassifierConfig,
    analytical_set: HashSet<String>,
    request_set: HashSet<String>,
}

impl ComplexityClassifier {
    /// Create a new classifier with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    /// Create a classifier from loaded settings and the default keyword sets.
    pub fn from_settings(settings: ClassifierSettings) -> Self {
        Self::with_config(ClassifierConfig {
            settings,
            ..ClassifierConfig::default()
        })
    }

    /// Create a classifier with custom configuration.
    pub fn with_config(config: ClassifierConfig) -> Self {
        let analytical_set = config
            .analytical_keywords
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        let request_set = config
            .request_phrases
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        Self {
            config,
            analytical_set,
            request_set,
        }
    }

    /// Shorthand for `assess(..).requires_model`.
    pub fn requires_model(&self, text: &str, vocabulary: &Vocabulary) -> bool {
        self.assess(text, vocabulary).requires_model
    }

    /// Classify a normalized query. Rules are checked in order; the first
    /// one that fires decides.
    pub fn assess(&self, text: &str, vocabulary: &Vocabulary) -> ComplexityAssessment {
        let trimmed = text.trim();
        let settings = &self.config.settings;

        let assessment = if trimmed.chars().count() < settings.min_length {
            ComplexityAssessment::decided(ComplexityReason::TooShort, Vec::new())
        } else {
            let padded = pad(&strip_punctuation(trimmed));
            let categories = vocabulary.matched_categories(&padded);
            let analytical = matches_in(&self.analytical_set, &padded);
            let requests = matches_in(&self.request_set, &padded);
            let tokens = trimmed.split_whitespace().count();

            if !analytical.is_empty() {
                ComplexityAssessment::decided(ComplexityReason::AnalyticalKeyword, analytical)
            } else if categories.len() >= settings.category_threshold {
                ComplexityAssessment::decided(
                    ComplexityReason::ManyCategories,
                    categories.iter().map(|f| f.to_string()).collect(),
                )
            } else if !requests.is_empty() {
                ComplexityAssessment::decided(ComplexityReason::RequestPhrase, requests)
            } else if tokens > settings.max_tokens {
                ComplexityAssessment::decided(ComplexityReason::TooManyTokens, Vec::new())
            } else {
                ComplexityAssessment::decided(ComplexityReason::Simple, Vec::new())
            }
        };

        debug!(
            query = %trimmed,
            requires_model = assessment.requires_model,
            reason = ?assessment.reason,
            matched = ?assessment.matched_keywords,
            "Classified query complexity"
        );
        assessment
    }
}

impl Default for ComplexityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '.' | ',' | '!' | '?') { ' ' } else { c })
        .collect()
}

/// Whole-word phrases from `set` present in `padded`, sorted.
fn matches_in(set: &HashSet<String>, padded: &str) -> Vec<String> {
    let mut matched: Vec<String> = set
        .iter()
        .filter(|phrase| padded.contains(&format!(" {} ", phrase)))
        .cloned()
        .collect();
    matched.sort();
    matched
}
