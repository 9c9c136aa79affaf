//! Pluggable string similarity for fuzzy correction.

use std::sync::Arc;

/// Similarity cascade used by the normalizer, strict to loose.
pub const DEFAULT_THRESHOLDS: [f64; 4] = [0.9, 0.8, 0.7, 0.6];

/// Scores how alike two strings are, in [0.0, 1.0].
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;

    fn name(&self) -> &'static str;
}

/// Levenshtein distance scaled by the longer length.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl SimilarityScorer for NormalizedLevenshtein {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(a, b)
    }

    fn name(&self) -> &'static str {
        "normalized_levenshtein"
    }
}

/// Jaro-Winkler, which favours shared prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl SimilarityScorer for JaroWinkler {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::jaro_winkler(a, b)
    }

    fn name(&self) -> &'static str {
        "jaro_winkler"
    }
}

pub fn default_scorer() -> Arc<dyn SimilarityScorer> {
    Arc::new(NormalizedLevenshtein)
}

/// Walk the thresholds from strict to loose and return the best candidate
/// at the first threshold any candidate reaches.
///
/// Ties go to the earlier candidate, so sorted input gives stable output.
pub fn cascade_match<'a, I>(
    scorer: &dyn SimilarityScorer,
    token: &str,
    candidates: I,
    thresholds: &[f64],
) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates {
        let score = scorer.score(token, candidate);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((candidate, score));
        }
    }

    let (candidate, score) = best?;
    thresholds
        .iter()
        .find(|threshold| score >= **threshold)
        .map(|_| candidate)
}
