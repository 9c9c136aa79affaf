//! Text normalization and fuzzy correction against the vocabulary.
//!
//! Normalizing already-normalized text returns it unchanged. Every step works
//! on the core of a token (edge punctuation split off) and only ever emits
//! known words or the cleaned token itself, which keeps a second pass a no-op.

use std::sync::Arc;

use tracing::debug;

use crate::error::QueryError;
use crate::similarity::{cascade_match, default_scorer, SimilarityScorer, DEFAULT_THRESHOLDS};
use crate::vocabulary::Vocabulary;

/// Fixed shorthand, applied after acronym expansion.
const SHORTHAND: &[(&str, &str)] = &[
    ("hp", "high priority"),
    ("ip", "in progress"),
    ("td", "to do"),
    ("wip", "in progress"),
];

/// Punctuation that may survive sanitization.
const PUNCTUATION: &[char] = &['-', '_', '.', ',', '!', '?'];

/// Connectives that decide the logical operator; never produced by correction.
const CONNECTIVES: &[&str] = &["and", "or"];

/// Punctuation that attaches to the preceding word.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?'];

/// Configuration for the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Similarity cascade, strict to loose
    pub thresholds: Vec<f64>,

    /// Shortest token core considered for fuzzy matching
    pub min_fuzzy_len: usize,

    /// Shortest token core considered for substring completion
    pub min_substring_len: usize,

    /// Inputs with more tokens than this are not corrected
    pub max_tokens: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            min_fuzzy_len: 3,
            min_substring_len: 4,
            max_tokens: 256,
        }
    }
}

/// Cleans free text and corrects it toward the vocabulary.
pub struct Normalizer {
    config: NormalizerConfig,
    scorer: Arc<dyn SimilarityScorer>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::with_config(NormalizerConfig::default())
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        Self {
            config,
            scorer: default_scorer(),
        }
    }

    /// Swap the similarity algorithm used for fuzzy matching.
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Normalize `text` against `vocabulary`.
    ///
    /// Fails with `Correction` when the input is too long to correct token-wise;
    /// callers then use the original text.
    pub fn normalize(&self, text: &str, vocabulary: &Vocabulary) -> Result<String, QueryError> {
        // 1. lowercase, trim, clean each token
        let lowered = text.trim().to_lowercase();
        let tokens: Vec<String> = lowered
            .split_whitespace()
            .map(clean_token)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() > self.config.max_tokens {
            return Err(QueryError::Correction(format!(
                "{} tokens exceeds limit of {}",
                tokens.len(),
                self.config.max_tokens
            )));
        }

        // 2-3. correct, then expand abbreviations
        let corrected: Vec<String> = tokens
            .iter()
            .map(|token| self.correct_token(token, vocabulary))
            .collect();

        // 4. formatting, 5. sanitization
        let formatted = format_tokens(&corrected.join(" "));
        let normalized = sanitize(&formatted);

        if normalized != lowered {
            debug!(input = %text, normalized = %normalized, "Query normalized");
        }
        Ok(normalized)
    }

    fn correct_token(&self, token: &str, vocabulary: &Vocabulary) -> String {
        let (prefix, core, suffix) = split_edges(token);
        if core.is_empty() || core.chars().any(|c| c.is_ascii_digit()) {
            return token.to_string();
        }

        let corrected = self.correct_core(core, vocabulary);
        let expanded = expand(&corrected, vocabulary);
        format!("{}{}{}", prefix, expanded, suffix)
    }

    fn correct_core(&self, core: &str, vocabulary: &Vocabulary) -> String {
        if vocabulary.is_known_word(core) {
            return core.to_string();
        }

        if core.chars().count() >= self.config.min_fuzzy_len {
            if let Some(candidate) = cascade_match(
                self.scorer.as_ref(),
                core,
                correction_candidates(vocabulary),
                &self.config.thresholds,
            ) {
                return candidate.to_string();
            }
        }

        if core.chars().count() >= self.config.min_substring_len {
            let containing = correction_candidates(vocabulary)
                .filter(|word| word.len() > core.len() && word.contains(core))
                .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
            if let Some(word) = containing {
                return word.to_string();
            }
        }

        core.to_string()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Known single words a token may be corrected into.
fn correction_candidates(vocabulary: &Vocabulary) -> impl Iterator<Item = &str> {
    vocabulary
        .single_words()
        .filter(|word| is_clean_word(word) && !CONNECTIVES.contains(word))
}

fn shorthand(core: &str) -> Option<&'static str> {
    SHORTHAND
        .iter()
        .find(|(short, _)| *short == core)
        .map(|(_, long)| *long)
}

/// Expand an acronym or shorthand. Expansions whose words would not survive
/// another pass unchanged are skipped.
fn expand(core: &str, vocabulary: &Vocabulary) -> String {
    let expansion = vocabulary.expand_acronym(core).or_else(|| shorthand(core));
    match expansion {
        Some(long)
            if long.split(' ').all(|word| {
                is_clean_word(word)
                    && vocabulary.expand_acronym(word).is_none()
                    && shorthand(word).is_none()
            }) =>
        {
            long.to_string()
        }
        _ => core.to_string(),
    }
}

/// A word that cleaning and edge splitting leave intact.
fn is_clean_word(word: &str) -> bool {
    let mut previous: Option<char> = None;
    for c in word.chars() {
        if !is_allowed(c) {
            return false;
        }
        if PUNCTUATION.contains(&c) && previous == Some(c) {
            return false;
        }
        previous = Some(c);
    }
    match (word.chars().next(), word.chars().last()) {
        (Some(first), Some(last)) => !PUNCTUATION.contains(&first) && !PUNCTUATION.contains(&last),
        _ => false,
    }
}

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || PUNCTUATION.contains(&c)
}

/// Drop disallowed characters and collapse runs of the same punctuation mark.
fn clean_token(token: &str) -> String {
    let mut cleaned = String::with_capacity(token.len());
    for c in token.chars().filter(|c| is_allowed(*c)) {
        if PUNCTUATION.contains(&c) && cleaned.ends_with(c) {
            continue;
        }
        cleaned.push(c);
    }
    cleaned
}

/// Split a token into leading punctuation, core, trailing punctuation.
fn split_edges(token: &str) -> (&str, &str, &str) {
    let start = token
        .find(|c: char| !PUNCTUATION.contains(&c))
        .unwrap_or(token.len());
    let end = token
        .char_indices()
        .rev()
        .find(|(_, c)| !PUNCTUATION.contains(c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(start);
    (&token[..start], &token[start..end], &token[end..])
}

/// Attach trailing-punctuation-only tokens to the previous word and collapse whitespace.
fn format_tokens(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for token in text.split_whitespace() {
        let punctuation_only = token.chars().all(|c| TRAILING_PUNCTUATION.contains(&c));
        match out.last_mut() {
            Some(previous) if punctuation_only => {
                previous.push_str(token);
                *previous = clean_token(previous);
            }
            _ => out.push(token.to_string()),
        }
    }
    out.join(" ")
}

/// Restrict to letters, digits, spaces and `-_.,!?`.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| *c == ' ' || is_allowed(*c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
