//! Criteria extraction: free text to structured filter criteria.
//!
//! Two implementations share the `CriteriaExtractor` contract. The
//! deterministic extractor scans for vocabulary values and a handful of
//! synonym rules; the model-assisted extractor asks a generative model for
//! JSON and falls back to the deterministic one when the output does not
//! conform. Neither keeps any state besides the vocabulary it is handed.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use tasklens_llm::{extract_json, GenerativeModel};
use tasklens_types::{Criteria, CriteriaGroup, FieldValue, LogicOperator, QueryContext, TaskField};

use crate::error::QueryError;
use crate::vocabulary::{canonical_form, Vocabulary};

/// Phrases meaning "no filter at all".
const SHOW_ALL_PHRASES: &[&str] = &[
    "show all tasks",
    "list all tasks",
    "show all",
    "list all",
    "all tasks",
    "show tasks",
    "list tasks",
];

const DONE_WORDS: &[&str] = &["done", "completed", "finished", "fixed", "resolved", "closed"];
const DONE_PREFERENCE: &[&str] = &["done", "closed", "resolved", "completed", "fixed"];
const TODO_WORDS: &[&str] = &["todo", "open", "not started"];
const TODO_PREFERENCE: &[&str] = &["to do", "open", "backlog"];
const IN_PROGRESS_WORDS: &[&str] = &["ongoing", "wip", "started", "in-progress"];
const IN_PROGRESS_PREFERENCE: &[&str] = &["in progress", "in-progress", "doing"];
const HIGH_WORDS: &[&str] = &["critical", "urgent", "blocker"];
const HIGH_PREFERENCE: &[&str] = &["high", "highest", "critical"];
const BUG_WORDS: &[&str] = &["defect", "defects"];

static COMPOSITE_DONE_BUGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:fixed|resolved|completed)\s+bugs?\b").expect("composite bug regex is valid")
});

static PRIORITY_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpriority\s+(?:tasks?|issues?|items?|tickets?)\b")
        .expect("priority list regex is valid")
});

static ASSIGNEE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:with|assigned to)\s+([\p{L}\p{N}][\p{L}\p{N}._-]*)")
        .expect("assignee phrase regex is valid")
});

/// Turns text plus context into criteria combined with one operator.
#[async_trait]
pub trait CriteriaExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        context: &QueryContext,
        vocabulary: &Vocabulary,
    ) -> Result<CriteriaGroup, QueryError>;

    fn name(&self) -> &'static str;
}

/// Check a query and find its connective.
///
/// Empty text and text using both " and " and " or " are rejected.
pub fn validate_query(text: &str) -> Result<Option<LogicOperator>, QueryError> {
    let lower = canonical_form(text);
    if lower.is_empty() {
        return Err(QueryError::EmptyQuery);
    }

    let has_and = lower.contains(LogicOperator::And.connective());
    let has_or = lower.contains(LogicOperator::Or.connective());
    match (has_and, has_or) {
        (true, true) => Err(QueryError::MixedOperators),
        (true, false) => Ok(Some(LogicOperator::And)),
        (false, true) => Ok(Some(LogicOperator::Or)),
        (false, false) => Ok(None),
    }
}

/// Vocabulary-driven extractor with no external calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicExtractor;

impl DeterministicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract one criteria entry per connective-separated segment.
    pub fn extract_group(
        &self,
        text: &str,
        vocabulary: &Vocabulary,
    ) -> Result<CriteriaGroup, QueryError> {
        let lower = canonical_form(text);
        let group = match validate_query(&lower)? {
            None => CriteriaGroup::single(self.extract_segment(&lower, vocabulary)),
            Some(operator) => {
                let criteria: Vec<Criteria> = lower
                    .split(operator.connective())
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| self.extract_segment(segment, vocabulary))
                    .collect();
                if criteria.is_empty() {
                    CriteriaGroup::default()
                } else {
                    CriteriaGroup::new(operator, criteria)
                }
            }
        };

        debug!(
            text = %lower,
            operator = group.operator.as_str(),
            segments = group.criteria.len(),
            "Extracted criteria"
        );
        Ok(group)
    }

    /// Extract criteria from a single segment.
    pub fn extract_segment(&self, segment: &str, vocabulary: &Vocabulary) -> Criteria {
        let words: Vec<&str> = segment
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        let phrase = words.join(" ");

        if SHOW_ALL_PHRASES.contains(&phrase.as_str()) {
            return Criteria::default();
        }

        let padded = format!(" {} ", phrase);
        let mut criteria = Criteria::default();
        let mut consumed: Vec<String> = Vec::new();

        if let Some(found) = COMPOSITE_DONE_BUGS.find(&phrase) {
            criteria.issue_type = Some(FieldValue::One(bug_type(vocabulary)));
            criteria.status = Some(FieldValue::One(
                vocabulary.preferred(TaskField::Status, DONE_PREFERENCE),
            ));
            consumed.push(found.as_str().to_string());
        }

        for field in [TaskField::Priority, TaskField::Status, TaskField::IssueType] {
            if criteria.get(field).is_some() {
                continue;
            }
            if let Some((surface, value)) = vocabulary.find_in(field, &padded) {
                criteria.set(field, FieldValue::One(value.to_string()));
                consumed.push(surface.to_string());
            } else if let Some((word, value)) = synonym(field, &padded, vocabulary) {
                criteria.set(field, FieldValue::One(value));
                consumed.push(word.to_string());
            }
        }

        if criteria.priority.is_none() && PRIORITY_LIST.is_match(&phrase) {
            let all: Vec<String> = vocabulary
                .values(TaskField::Priority)
                .map(str::to_string)
                .collect();
            criteria.priority = Some(FieldValue::Any(all));
        }

        if let Some((word, assignee)) = self.find_assignee(&phrase, &padded, vocabulary) {
            criteria.assignee = Some(FieldValue::One(assignee));
            consumed.push(word);
        }

        criteria.keywords = keywords(&words, &consumed, vocabulary);
        criteria
    }

    fn find_assignee(
        &self,
        phrase: &str,
        padded: &str,
        vocabulary: &Vocabulary,
    ) -> Option<(String, String)> {
        for captures in ASSIGNEE_PHRASE.captures_iter(phrase) {
            let Some(name) = captures.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if vocabulary.is_reserved_word(name) {
                continue;
            }
            let resolved = vocabulary
                .assignees_containing(name)
                .first()
                .map(|v| v.to_string())
                .unwrap_or_else(|| name.to_string());
            return Some((name.to_string(), resolved));
        }

        vocabulary
            .find_in(TaskField::Assignee, padded)
            .map(|(surface, value)| (surface.to_string(), value.to_string()))
    }
}

#[async_trait]
impl CriteriaExtractor for DeterministicExtractor {
    async fn extract(
        &self,
        text: &str,
        _context: &QueryContext,
        vocabulary: &Vocabulary,
    ) -> Result<CriteriaGroup, QueryError> {
        self.extract_group(text, vocabulary)
    }

    fn name(&self) -> &'static str {
        "deterministic"
    }
}

fn bug_type(vocabulary: &Vocabulary) -> String {
    vocabulary
        .canonical(TaskField::IssueType, "bug")
        .unwrap_or("bug")
        .to_string()
}

/// Synonym rule for a field: the matched word and the value it stands for.
fn synonym(field: TaskField, padded: &str, vocabulary: &Vocabulary) -> Option<(&'static str, String)> {
    let present = |words: &[&'static str]| -> Option<&'static str> {
        words
            .iter()
            .copied()
            .find(|word| padded.contains(&format!(" {} ", word)))
    };

    match field {
        TaskField::Priority => present(HIGH_WORDS)
            .map(|w| (w, vocabulary.preferred(TaskField::Priority, HIGH_PREFERENCE))),
        TaskField::Status => present(DONE_WORDS)
            .map(|w| (w, vocabulary.preferred(TaskField::Status, DONE_PREFERENCE)))
            .or_else(|| {
                present(IN_PROGRESS_WORDS)
                    .map(|w| (w, vocabulary.preferred(TaskField::Status, IN_PROGRESS_PREFERENCE)))
            })
            .or_else(|| {
                present(TODO_WORDS)
                    .map(|w| (w, vocabulary.preferred(TaskField::Status, TODO_PREFERENCE)))
            }),
        TaskField::IssueType => present(BUG_WORDS).map(|w| (w, bug_type(vocabulary))),
        TaskField::Assignee | TaskField::Project | TaskField::Sprint => None,
    }
}

/// Leftover words worth searching for.
fn keywords(words: &[&str], consumed: &[String], vocabulary: &Vocabulary) -> Vec<String> {
    let consumed_words: Vec<&str> = consumed.iter().flat_map(|c| c.split(' ')).collect();
    let mut keywords: Vec<String> = Vec::new();
    for word in words {
        if word.len() < 3
            || word.chars().all(|c| c.is_ascii_digit())
            || consumed_words.contains(word)
            || vocabulary.is_known_word(word)
        {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

/// Extractor backed by a generative model.
///
/// Model failures, timeouts and non-conforming output all fall back to the
/// deterministic extractor.
pub struct LlmExtractor {
    model: Arc<dyn GenerativeModel>,
    fallback: DeterministicExtractor,
    timeout: Duration,
}

impl LlmExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self {
            model,
            fallback: DeterministicExtractor::new(),
            timeout,
        }
    }

    /// Prompt asking the model for criteria JSON.
    pub fn build_prompt(text: &str, context: &QueryContext, vocabulary: &Vocabulary) -> String {
        let known = |field: TaskField| -> String {
            let values: Vec<&str> = vocabulary.values(field).take(50).collect();
            if values.is_empty() {
                "(none)".to_string()
            } else {
                values.join(", ")
            }
        };

        let mut scope = String::new();
        if let Some(project) = &context.project_filter {
            scope.push_str(&format!("Project: {}\n", project));
        }
        if let Some(sprint) = &context.sprint_filter {
            scope.push_str(&format!("Sprint: {}\n", sprint));
        }

        format!(
            r#"Extract search filters from a question about project tasks.

Known values:
- priority: {priority}
- status: {status}
- issue_type: {issue_type}
- assignee: {assignee}

{scope}Query: {text}

Respond with JSON only, in this shape:
{{"assignee": null, "priority": null, "status": null, "issue_type": null, "keywords": []}}

Each field is a string, a list of strings meaning "any of", or null when the
query does not constrain it. Use the known values where possible.
If the query combines conditions with "and" or "or", respond with
{{"operator": "AND" or "OR", "groups": [<one object as above per condition>]}}"#,
            priority = known(TaskField::Priority),
            status = known(TaskField::Status),
            issue_type = known(TaskField::IssueType),
            assignee = known(TaskField::Assignee),
        )
    }

    /// Call the model and parse its answer, without falling back.
    pub async fn try_extract(
        &self,
        text: &str,
        context: &QueryContext,
        vocabulary: &Vocabulary,
    ) -> Result<CriteriaGroup, QueryError> {
        let prompt = Self::build_prompt(text, context, vocabulary);
        let response = match tokio::time::timeout(self.timeout, self.model.invoke(&prompt)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(QueryError::CriteriaParse(format!("model call failed: {}", e))),
            Err(_) => {
                return Err(QueryError::CriteriaParse(format!(
                    "model timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        };
        parse_model_criteria(&response, vocabulary)
    }
}

#[async_trait]
impl CriteriaExtractor for LlmExtractor {
    async fn extract(
        &self,
        text: &str,
        context: &QueryContext,
        vocabulary: &Vocabulary,
    ) -> Result<CriteriaGroup, QueryError> {
        validate_query(text)?;

        match self.try_extract(text, context, vocabulary).await {
            Ok(group) => {
                debug!(model = self.model.name(), segments = group.criteria.len(), "Model extracted criteria");
                Ok(group)
            }
            Err(e) => {
                warn!(error = %e, "Model extraction failed, using deterministic extractor");
                self.fallback.extract_group(text, vocabulary)
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCriteria {
    #[serde(default)]
    assignee: Option<serde_json::Value>,
    #[serde(default)]
    priority: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(default, alias = "issueType")]
    issue_type: Option<serde_json::Value>,
    #[serde(default)]
    keywords: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelOutput {
    Groups {
        #[serde(default)]
        operator: Option<String>,
        groups: Vec<RawCriteria>,
    },
    Listed {
        #[serde(default)]
        operator: Option<String>,
        criteria: Vec<RawCriteria>,
    },
    Single(RawCriteria),
}

const CRITERIA_KEYS: &[&str] = &[
    "assignee", "priority", "status", "issue_type", "issueType", "keywords", "groups", "criteria",
];

/// Parse model output into criteria, canonicalizing values against the vocabulary.
pub fn parse_model_criteria(
    response: &str,
    vocabulary: &Vocabulary,
) -> Result<CriteriaGroup, QueryError> {
    let json = extract_json(response);
    let value: serde_json::Value = serde_json::from_str(&json)
        .map_err(|e| QueryError::CriteriaParse(format!("invalid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| QueryError::CriteriaParse("expected a JSON object".to_string()))?;
    if !CRITERIA_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(QueryError::CriteriaParse(
            "object has no criteria fields".to_string(),
        ));
    }

    let output: ModelOutput = serde_json::from_value(value)
        .map_err(|e| QueryError::CriteriaParse(format!("unexpected shape: {}", e)))?;

    let (operator, raw) = match output {
        ModelOutput::Groups { operator, groups } => (operator, groups),
        ModelOutput::Listed { operator, criteria } => (operator, criteria),
        ModelOutput::Single(criteria) => (None, vec![criteria]),
    };

    let operator = match operator.as_deref().map(str::trim) {
        Some(op) if op.eq_ignore_ascii_case("or") => LogicOperator::Or,
        _ => LogicOperator::And,
    };

    let criteria: Vec<Criteria> = raw
        .into_iter()
        .map(|raw| convert(raw, vocabulary))
        .collect::<Result<_, _>>()?;

    if criteria.is_empty() {
        return Ok(CriteriaGroup::default());
    }
    Ok(CriteriaGroup::new(operator, criteria))
}

fn convert(raw: RawCriteria, vocabulary: &Vocabulary) -> Result<Criteria, QueryError> {
    Ok(Criteria {
        assignee: field_value(TaskField::Assignee, raw.assignee, vocabulary)?,
        priority: field_value(TaskField::Priority, raw.priority, vocabulary)?,
        status: field_value(TaskField::Status, raw.status, vocabulary)?,
        issue_type: field_value(TaskField::IssueType, raw.issue_type, vocabulary)?,
        keywords: match raw.keywords {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(value) => strings(value)?,
        },
    })
}

fn strings(value: serde_json::Value) -> Result<Vec<String>, QueryError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(s) => Ok(vec![s]),
        serde_json::Value::Number(n) => Ok(vec![n.to_string()]),
        serde_json::Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(strings(item)?);
            }
            Ok(out)
        }
        other => Err(QueryError::CriteriaParse(format!(
            "expected string or list, got {}",
            other
        ))),
    }
}

fn field_value(
    field: TaskField,
    value: Option<serde_json::Value>,
    vocabulary: &Vocabulary,
) -> Result<Option<FieldValue>, QueryError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let mut values: Vec<String> = Vec::new();
    for raw in strings(value)? {
        let raw = canonical_form(&raw);
        if raw.is_empty() || matches!(raw.as_str(), "null" | "none" | "any" | "all") {
            continue;
        }
        let canonical = canonicalize(field, &raw, vocabulary);
        if !values.contains(&canonical) {
            values.push(canonical);
        }
    }

    Ok(match values.len() {
        0 => None,
        1 => values.pop().map(FieldValue::One),
        _ => Some(FieldValue::Any(values)),
    })
}

fn canonicalize(field: TaskField, raw: &str, vocabulary: &Vocabulary) -> String {
    if let Some(value) = vocabulary.canonical(field, raw) {
        return value.to_string();
    }
    synonym(field, &format!(" {} ", raw), vocabulary)
        .map(|(_, value)| value)
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklens_llm::MockModel;
    use tasklens_types::TaskRecord;

    fn vocab() -> Vocabulary {
        Vocabulary::from_records(&[
            TaskRecord::new("T1")
                .with_priority("High")
                .with_status("Done")
                .with_issue_type("Bug")
                .with_assignee("Alice Smith"),
            TaskRecord::new("T2")
                .with_priority("Low")
                .with_status("In Progress")
                .with_issue_type("Story")
                .with_assignee("Bob Jones"),
            TaskRecord::new("T3").with_priority("Medium").with_status("To Do"),
        ])
    }

    fn extract(text: &str) -> CriteriaGroup {
        DeterministicExtractor::new().extract_group(text, &vocab()).unwrap()
    }

    fn one(value: &str) -> Option<FieldValue> {
        Some(FieldValue::from(value))
    }

    #[test]
    fn test_validation() {
        assert_eq!(validate_query("   "), Err(QueryError::EmptyQuery));
        assert_eq!(validate_query("bugs and stories or epics"), Err(QueryError::MixedOperators));
        assert_eq!(validate_query("bugs or stories"), Ok(Some(LogicOperator::Or)));
        assert_eq!(validate_query("android bugs"), Ok(None));
    }

    #[test]
    fn test_priority_and_type() {
        let group = extract("high priority bugs");
        assert_eq!(group.criteria.len(), 1);
        let criteria = &group.criteria[0];
        assert_eq!(criteria.priority, one("high"));
        assert_eq!(criteria.issue_type, one("bug"));
        assert_eq!(criteria.status, None);
    }

    #[test]
    fn test_show_all_is_unconstrained() {
        for text in ["show all tasks", "list all", "all tasks"] {
            assert!(extract(text).is_unconstrained(), "{}", text);
        }
    }

    #[test]
    fn test_generic_nouns_are_not_issue_types() {
        let vocab = Vocabulary::seed();
        let group = DeterministicExtractor::new()
            .extract_group("high priority tasks", &vocab)
            .unwrap();
        assert_eq!(group.criteria[0].issue_type, None);
        assert_eq!(group.criteria[0].priority, one("high"));
    }

    #[test]
    fn test_done_synonyms_are_equivalent() {
        let expected = extract("fixed bugs");
        assert_eq!(expected.criteria[0].issue_type, one("bug"));
        assert_eq!(expected.criteria[0].status, one("done"));
        assert_eq!(extract("resolved bugs"), expected);
        assert_eq!(extract("completed bugs"), expected);
    }

    #[test]
    fn test_other_synonyms() {
        assert_eq!(extract("critical tasks").criteria[0].priority, one("high"));
        assert_eq!(extract("finished stories").criteria[0].status, one("done"));
        assert_eq!(extract("ongoing work").criteria[0].status, one("in progress"));
        assert_eq!(extract("defects").criteria[0].issue_type, one("bug"));
    }

    #[test]
    fn test_priority_list() {
        let expected = Some(FieldValue::Any(vec![
            "high".to_string(),
            "low".to_string(),
            "medium".to_string(),
        ]));
        assert_eq!(extract("all priority tasks").criteria[0].priority, expected);
        assert_eq!(extract("priority tasks").criteria[0].priority, expected);
        assert_eq!(extract("low priority tasks").criteria[0].priority, one("low"));
    }

    #[test]
    fn test_assignee_phrases() {
        assert_eq!(extract("tasks with alice").criteria[0].assignee, one("alice smith"));
        assert_eq!(extract("bugs assigned to jones").criteria[0].assignee, one("bob jones"));
        assert_eq!(extract("tasks assigned to carol").criteria[0].assignee, one("carol"));
        assert_eq!(extract("tasks with high priority").criteria[0].assignee, None);
        assert_eq!(extract("bob smith stories").criteria[0].assignee, None);
        assert_eq!(extract("alice smith stories").criteria[0].assignee, one("alice smith"));
    }

    #[test]
    fn test_non_ascii_assignee_phrase() {
        let vocab = Vocabulary::from_records(&[TaskRecord::new("T1").with_assignee("Zoë Núñez")]);
        let group = DeterministicExtractor::new()
            .extract_group("bugs assigned to núñez", &vocab)
            .unwrap();
        assert_eq!(group.criteria[0].assignee, one("zoë núñez"));
    }

    #[test]
    fn test_connective_split() {
        let group = extract("high priority bugs or stories with bob");
        assert_eq!(group.operator, LogicOperator::Or);
        assert_eq!(group.criteria.len(), 2);
        assert_eq!(group.criteria[0].issue_type, one("bug"));
        assert_eq!(group.criteria[1].issue_type, one("story"));
        assert_eq!(group.criteria[1].assignee, one("bob jones"));

        let group = extract("bugs and done and alice");
        assert_eq!(group.operator, LogicOperator::And);
        assert_eq!(group.criteria.len(), 3);
    }

    #[test]
    fn test_keywords() {
        let group = extract("login crash bugs");
        assert_eq!(group.criteria[0].keywords, vec!["login", "crash"]);
    }

    #[test]
    fn test_parse_single_object() {
        let response = r#"```json
{"assignee": null, "priority": "High", "status": "completed", "issue_type": "bugs", "keywords": ["login"]}
```"#;
        let group = parse_model_criteria(response, &vocab()).unwrap();
        assert_eq!(group.operator, LogicOperator::And);
        let criteria = &group.criteria[0];
        assert_eq!(criteria.priority, one("high"));
        assert_eq!(criteria.status, one("done"));
        assert_eq!(criteria.issue_type, one("bug"));
        assert_eq!(criteria.keywords, vec!["login"]);
        assert_eq!(criteria.assignee, None);
    }

    #[test]
    fn test_parse_groups_and_lists() {
        let response = r#"{"operator": "or", "groups": [
            {"priority": ["high", "critical"]},
            {"issueType": "story", "assignee": "none"}
        ]}"#;
        let group = parse_model_criteria(response, &vocab()).unwrap();
        assert_eq!(group.operator, LogicOperator::Or);
        assert_eq!(group.criteria[0].priority, one("high"));
        assert_eq!(group.criteria[1].issue_type, one("story"));
        assert_eq!(group.criteria[1].assignee, None);
    }

    #[test]
    fn test_parse_rejects_non_conforming_output() {
        let vocab = vocab();
        for response in [
            "I cannot help with that.",
            r#"{"answer": "two bugs"}"#,
            r#"{"priority": {"level": "high"}}"#,
            "[1, 2, 3]",
        ] {
            let err = parse_model_criteria(response, &vocab).unwrap_err();
            assert!(matches!(err, QueryError::CriteriaParse(_)), "{}", response);
        }
    }

    #[tokio::test]
    async fn test_llm_extractor_uses_model_output() {
        let model = Arc::new(MockModel::new(r#"{"status": "to do"}"#));
        let extractor = LlmExtractor::new(model.clone(), Duration::from_secs(1));
        let context = QueryContext::new().with_project("Alpha");

        let group = extractor
            .extract("which things are still open", &context, &vocab())
            .await
            .unwrap();
        assert_eq!(group.criteria[0].status, one("to do"));

        let prompts = model.prompts();
        assert!(prompts[0].contains("Project: Alpha"));
        assert!(prompts[0].contains("Query: which things are still open"));
    }

    #[tokio::test]
    async fn test_llm_extractor_falls_back_on_garbage() {
        let model = Arc::new(MockModel::new("Sure! High priority bugs, I think."));
        let extractor = LlmExtractor::new(model, Duration::from_secs(1));
        let group = extractor
            .extract("high priority bugs", &QueryContext::new(), &vocab())
            .await
            .unwrap();
        assert_eq!(group, extract("high priority bugs"));
    }

    #[tokio::test]
    async fn test_llm_extractor_falls_back_on_failure_and_timeout() {
        let extractor = LlmExtractor::new(Arc::new(MockModel::failing()), Duration::from_secs(1));
        let group = extractor.extract("done bugs", &QueryContext::new(), &vocab()).await.unwrap();
        assert_eq!(group.criteria[0].status, one("done"));

        let slow = MockModel::new(r#"{"status": "to do"}"#).with_delay(Duration::from_secs(5));
        let extractor = LlmExtractor::new(Arc::new(slow), Duration::from_millis(20));
        let group = extractor.extract("done bugs", &QueryContext::new(), &vocab()).await.unwrap();
        assert_eq!(group.criteria[0].status, one("done"));
    }

    #[tokio::test]
    async fn test_llm_extractor_surfaces_validation_errors() {
        let extractor = LlmExtractor::new(Arc::new(MockModel::new("{}")), Duration::from_secs(1));
        let err = extractor
            .extract("bugs and stories or epics", &QueryContext::new(), &vocab())
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::MixedOperators);
    }
}
