//! Corpus vocabulary: the known values per category.
//!
//! A `Vocabulary` is an immutable snapshot built from the whole corpus. It is
//! never patched in place; `VocabularyStore` swaps in a freshly built snapshot
//! so readers always see one consistent version.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use tasklens_store::DocumentStore;
use tasklens_types::{TaskField, TaskRecord};

use crate::error::QueryError;

/// Words that carry query structure rather than data.
pub const CONNECTOR_WORDS: &[&str] = &[
    "a", "all", "an", "and", "any", "are", "assigned", "assignee", "by", "can", "display", "do",
    "each", "every", "find", "for", "from", "get", "give", "has", "have", "in", "is", "issue",
    "issues", "item", "items", "list", "me", "my", "of", "on", "open", "or", "please", "priority",
    "progress", "project", "show", "sprint", "status", "task", "tasks", "the", "ticket",
    "tickets", "to", "type", "what", "which", "who", "with", "you",
];

/// Synonyms recognised by the extractors, kept known so correction leaves them alone.
pub const SYNONYM_WORDS: &[&str] = &[
    "blocker", "bugs", "closed", "completed", "critical", "defect", "defects", "done", "finished",
    "fixed", "ongoing", "resolved", "started", "todo", "urgent", "wip",
];

/// Nouns that name records in general, never an issue type.
pub const GENERIC_NOUNS: &[&str] = &[
    "task", "tasks", "issue", "issues", "item", "items", "ticket", "tickets",
];

/// Seed values used when the corpus provides none for a category.
pub fn seed_values(field: TaskField) -> &'static [&'static str] {
    match field {
        TaskField::Priority => &["high", "medium", "low"],
        TaskField::Status => &["in progress", "done", "to do"],
        TaskField::IssueType => &["bug", "story", "task"],
        TaskField::Assignee | TaskField::Project | TaskField::Sprint => &[],
    }
}

/// Categories whose acronyms are expanded during normalization.
///
/// Person, project and sprint initials collide with ordinary words too often.
pub const EXPANDABLE_FIELDS: [TaskField; 3] =
    [TaskField::Priority, TaskField::Status, TaskField::IssueType];

/// Immutable taxonomy snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vocabulary {
    /// Lowercase observed values per category
    categories: BTreeMap<TaskField, BTreeSet<String>>,

    /// Surface form -> canonical value, per category
    #[serde(skip)]
    aliases: BTreeMap<TaskField, BTreeMap<String, String>>,

    /// Initials -> value for multi-word values of up to three words
    acronyms: BTreeMap<TaskField, BTreeMap<String, String>>,

    /// Values, variants, acronyms, component words and connector words
    known_words: BTreeSet<String>,

    /// Categories that were filled with seed values
    seeded: BTreeSet<TaskField>,
}

impl Vocabulary {
    /// Vocabulary of seed values only.
    pub fn seed() -> Self {
        Self::from_records(&[])
    }

    /// Build a vocabulary from a corpus snapshot.
    ///
    /// Output depends only on the set of values, not on record order.
    pub fn from_records(records: &[TaskRecord]) -> Self {
        let mut categories: BTreeMap<TaskField, BTreeSet<String>> = TaskField::ALL
            .iter()
            .map(|field| (*field, BTreeSet::new()))
            .collect();

        for record in records {
            for field in TaskField::ALL {
                if let Some(value) = record.field(field) {
                    let value = canonical_form(value);
                    if let Some(set) = categories.get_mut(&field) {
                        set.insert(value);
                    }
                }
            }
        }

        let mut seeded = BTreeSet::new();
        for field in TaskField::ALL {
            let seeds = seed_values(field);
            if let Some(set) = categories.get_mut(&field) {
                if set.is_empty() && !seeds.is_empty() {
                    set.extend(seeds.iter().map(|s| s.to_string()));
                    seeded.insert(field);
                }
            }
        }

        let mut aliases: BTreeMap<TaskField, BTreeMap<String, String>> = BTreeMap::new();
        let mut acronyms: BTreeMap<TaskField, BTreeMap<String, String>> = BTreeMap::new();
        let mut known_words: BTreeSet<String> = BTreeSet::new();

        for (field, values) in &categories {
            let field_aliases = aliases.entry(*field).or_default();
            let field_acronyms = acronyms.entry(*field).or_default();

            for value in values {
                field_aliases.insert(value.clone(), value.clone());
                known_words.insert(value.clone());

                let words: Vec<&str> = value.split(' ').collect();
                if words.len() > 1 {
                    for variant in [words.concat(), words.join("-")] {
                        field_aliases.entry(variant.clone()).or_insert_with(|| value.clone());
                        known_words.insert(variant);
                    }
                    known_words.extend(words.iter().map(|w| w.to_string()));

                    if words.len() <= 3 {
                        let acronym: String =
                            words.iter().filter_map(|w| w.chars().next()).collect();
                        field_acronyms
                            .entry(acronym.clone())
                            .or_insert_with(|| value.clone());
                        known_words.insert(acronym);
                    }
                }

                if *field == TaskField::IssueType && words.len() == 1 {
                    let plural = pluralize(value);
                    field_aliases.entry(plural.clone()).or_insert_with(|| value.clone());
                    known_words.insert(plural);
                }
            }
        }

        known_words.extend(CONNECTOR_WORDS.iter().map(|w| w.to_string()));
        known_words.extend(SYNONYM_WORDS.iter().map(|w| w.to_string()));
        for field in EXPANDABLE_FIELDS {
            for seed in seed_values(field) {
                known_words.extend(seed.split(' ').map(str::to_string));
            }
        }

        Self {
            categories,
            aliases,
            acronyms,
            known_words,
            seeded,
        }
    }

    /// Values of a category, sorted.
    pub fn values(&self, field: TaskField) -> impl Iterator<Item = &str> {
        self.categories
            .get(&field)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn contains_value(&self, field: TaskField, value: &str) -> bool {
        self.categories
            .get(&field)
            .map(|set| set.contains(&canonical_form(value)))
            .unwrap_or(false)
    }

    pub fn known_words(&self) -> &BTreeSet<String> {
        &self.known_words
    }

    pub fn is_known_word(&self, word: &str) -> bool {
        self.known_words.contains(word)
    }

    /// Known words without spaces, the candidates for token correction.
    pub fn single_words(&self) -> impl Iterator<Item = &str> {
        self.known_words
            .iter()
            .map(String::as_str)
            .filter(|w| !w.contains(' '))
    }

    pub fn seeded_fields(&self) -> &BTreeSet<TaskField> {
        &self.seeded
    }

    /// True when every category came from seeds.
    pub fn is_seed_only(&self) -> bool {
        self.seeded.len() == EXPANDABLE_FIELDS.len()
            && [TaskField::Assignee, TaskField::Project, TaskField::Sprint]
                .iter()
                .all(|f| self.values(*f).next().is_none())
    }

    /// Expand an acronym using the status, priority and issue-type tables.
    pub fn expand_acronym(&self, token: &str) -> Option<&str> {
        EXPANDABLE_FIELDS.iter().find_map(|field| {
            self.acronyms
                .get(field)
                .and_then(|table| table.get(token))
                .map(String::as_str)
        })
    }

    /// Canonical value for a surface form (value, variant or plural).
    pub fn canonical(&self, field: TaskField, surface: &str) -> Option<&str> {
        self.aliases
            .get(&field)
            .and_then(|table| table.get(&canonical_form(surface)))
            .map(String::as_str)
    }

    /// First value of `field` whose surface form occurs as whole words in `padded`.
    ///
    /// `padded` is lowercase text with a leading and trailing space. Longer
    /// surface forms are tried first. Returns `(surface, value)`.
    pub fn find_in(&self, field: TaskField, padded: &str) -> Option<(&str, &str)> {
        let table = self.aliases.get(&field)?;
        let mut surfaces: Vec<(&String, &String)> = table.iter().collect();
        surfaces.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        surfaces
            .into_iter()
            .filter(|(surface, _)| {
                field != TaskField::IssueType || !GENERIC_NOUNS.contains(&surface.as_str())
            })
            .find(|(surface, _)| padded.contains(&format!(" {} ", surface)))
            .map(|(surface, value)| (surface.as_str(), value.as_str()))
    }

    /// Categories with at least one value present in the text.
    pub fn matched_categories(&self, text: &str) -> Vec<TaskField> {
        let padded = pad(text);
        TaskField::ALL
            .iter()
            .copied()
            .filter(|field| self.find_in(*field, &padded).is_some())
            .collect()
    }

    /// Assignee values containing `name` as a substring, sorted.
    pub fn assignees_containing(&self, name: &str) -> Vec<&str> {
        let name = canonical_form(name);
        self.values(TaskField::Assignee)
            .filter(|value| value.contains(&name))
            .collect()
    }

    /// True for connector, synonym or structural category words.
    pub fn is_reserved_word(&self, word: &str) -> bool {
        CONNECTOR_WORDS.contains(&word)
            || SYNONYM_WORDS.contains(&word)
            || EXPANDABLE_FIELDS.iter().any(|field| {
                self.aliases
                    .get(field)
                    .map(|table| {
                        table
                            .keys()
                            .any(|surface| surface.split(' ').any(|part| part == word))
                    })
                    .unwrap_or(false)
            })
    }

    /// First preferred value present in the category, else the first preference.
    pub fn preferred(&self, field: TaskField, preferences: &[&str]) -> String {
        preferences
            .iter()
            .find(|p| self.contains_value(field, p))
            .or_else(|| preferences.first())
            .map(|p| p.to_string())
            .unwrap_or_default()
    }
}

/// Lowercase, trimmed, single-spaced.
pub fn canonical_form(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Surround text with single spaces for whole-word containment checks.
pub fn pad(text: &str) -> String {
    format!(" {} ", canonical_form(text))
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Build a vocabulary from the store's current corpus.
pub async fn load(store: &dyn DocumentStore) -> Result<Vocabulary, QueryError> {
    let records = store
        .get_all()
        .await
        .map_err(|e| QueryError::VocabularyBuild(e.to_string()))?;
    let vocabulary = Vocabulary::from_records(&records);

    info!(
        records = records.len(),
        known_words = vocabulary.known_words.len(),
        seeded = ?vocabulary.seeded,
        "Vocabulary built"
    );
    Ok(vocabulary)
}

/// Process-wide holder of the current vocabulary snapshot.
pub struct VocabularyStore {
    current: RwLock<Arc<Vocabulary>>,
}

impl VocabularyStore {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            current: RwLock::new(Arc::new(vocabulary)),
        }
    }

    /// The snapshot in effect. Cheap; callers keep the `Arc` for a whole query.
    pub fn current(&self) -> Arc<Vocabulary> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new snapshot, returning it.
    pub fn replace(&self, vocabulary: Vocabulary) -> Arc<Vocabulary> {
        let next = Arc::new(vocabulary);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        debug!("Vocabulary snapshot replaced");
        next
    }

    /// Rebuild from the store and swap. On failure the current snapshot stays.
    pub async fn refresh(&self, store: &dyn DocumentStore) -> Result<Arc<Vocabulary>, QueryError> {
        let vocabulary = load(store).await?;
        Ok(self.replace(vocabulary))
    }
}

impl Default for VocabularyStore {
    fn default() -> Self {
        Self::new(Vocabulary::seed())
    }
}
