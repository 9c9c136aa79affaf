//! Structured filtering of candidate records.
//!
//! Every code path that narrows records goes through `FilterPredicate`:
//! criteria evaluation, the targeted and hybrid retrieval strategies, and
//! the final project pass.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tasklens_types::{
    Criteria, CriteriaGroup, FieldValue, LogicOperator, QueryContext, RetrievalResult, TaskField,
    TaskRecord,
};

/// How a single field is compared. Values are stored lowercase and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum MatchOp {
    Equals(String),
    OneOf(Vec<String>),
    /// Substring containment of any of the values
    Contains(Vec<String>),
}

impl MatchOp {
    fn matches(&self, actual: &str) -> bool {
        let actual = actual.trim().to_lowercase();
        match self {
            MatchOp::Equals(expected) => actual == *expected,
            MatchOp::OneOf(expected) => expected.iter().any(|e| actual == *e),
            MatchOp::Contains(needles) => needles.iter().any(|n| actual.contains(n.as_str())),
        }
    }
}

/// A predicate over task records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterPredicate {
    Field { field: TaskField, op: MatchOp },
    All { predicates: Vec<FilterPredicate> },
    Any { predicates: Vec<FilterPredicate> },
}

fn lowered(value: &str) -> String {
    value.trim().to_lowercase()
}

impl FilterPredicate {
    /// Case-insensitive equality on one field.
    pub fn equals(field: TaskField, value: &str) -> Self {
        FilterPredicate::Field {
            field,
            op: MatchOp::Equals(lowered(value)),
        }
    }

    /// Predicate for one field of a criteria entry.
    ///
    /// Assignee uses containment to tolerate partial names.
    pub fn from_field_value(field: TaskField, value: &FieldValue) -> Self {
        let values: Vec<String> = value.values().into_iter().map(lowered).collect();
        let op = match (field, value) {
            (TaskField::Assignee, _) => MatchOp::Contains(values),
            (_, FieldValue::One(v)) => MatchOp::Equals(lowered(v)),
            (_, FieldValue::Any(_)) => MatchOp::OneOf(values),
        };
        FilterPredicate::Field { field, op }
    }

    /// All present fields of `criteria` must match. Keywords do not filter.
    pub fn from_criteria(criteria: &Criteria) -> Self {
        let predicates = Criteria::FIELDS
            .iter()
            .filter_map(|field| {
                criteria
                    .get(*field)
                    .filter(|value| !value.is_blank())
                    .map(|value| Self::from_field_value(*field, value))
            })
            .collect();
        FilterPredicate::All { predicates }
    }

    /// Combine the entries of a group with its operator.
    ///
    /// A group without entries matches everything.
    pub fn from_group(group: &CriteriaGroup) -> Self {
        if group.criteria.is_empty() {
            return FilterPredicate::All {
                predicates: Vec::new(),
            };
        }

        let predicates = group.criteria.iter().map(Self::from_criteria).collect();
        match group.operator {
            LogicOperator::And => FilterPredicate::All { predicates },
            LogicOperator::Or => FilterPredicate::Any { predicates },
        }
    }

    /// The caller's project scope, if any.
    pub fn project(context: &QueryContext) -> Option<Self> {
        context
            .project_filter
            .as_deref()
            .map(|project| Self::equals(TaskField::Project, project))
    }

    /// The caller's sprint scope, if any.
    pub fn sprint(context: &QueryContext) -> Option<Self> {
        context
            .sprint_filter
            .as_deref()
            .map(|sprint| Self::equals(TaskField::Sprint, sprint))
    }

    /// Both structural filters of the context. Matches everything when none is set.
    pub fn structural(context: &QueryContext) -> Self {
        FilterPredicate::All {
            predicates: Self::sprint(context)
                .into_iter()
                .chain(Self::project(context))
                .collect(),
        }
    }

    /// Evaluate against a record. A missing field never matches a field predicate.
    pub fn evaluate(&self, record: &TaskRecord) -> bool {
        match self {
            FilterPredicate::Field { field, op } => {
                record.field(*field).map(|v| op.matches(v)).unwrap_or(false)
            }
            FilterPredicate::All { predicates } => predicates.iter().all(|p| p.evaluate(record)),
            FilterPredicate::Any { predicates } => predicates.iter().any(|p| p.evaluate(record)),
        }
    }
}

/// Apply criteria to candidates, then enforce the project filter.
///
/// The project pass runs after everything else for every strategy, so no
/// earlier step can widen the caller's project scope.
pub fn apply_filters(
    candidates: Vec<RetrievalResult>,
    group: &CriteriaGroup,
    context: &QueryContext,
) -> Vec<RetrievalResult> {
    let predicate = FilterPredicate::from_group(group);
    let before = candidates.len();

    let mut kept: Vec<RetrievalResult> = candidates
        .into_iter()
        .filter(|candidate| predicate.evaluate(&candidate.record))
        .collect();
    let after_criteria = kept.len();

    if let Some(project) = FilterPredicate::project(context) {
        kept.retain(|candidate| project.evaluate(&candidate.record));
    }

    debug!(
        candidates = before,
        after_criteria,
        after_project = kept.len(),
        operator = group.operator.as_str(),
        "Applied filters"
    );
    kept
}
