//! Structured filter criteria and the caller-supplied query context.

use serde::{Deserialize, Serialize};

use crate::record::TaskField;

/// A criterion value: one value, or a list meaning "any of".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(String),
    Any(Vec<String>),
}

impl FieldValue {
    /// All values this criterion accepts.
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::One(v) => vec![v.as_str()],
            FieldValue::Any(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// True when the value carries nothing to filter on.
    pub fn is_blank(&self) -> bool {
        self.values().iter().all(|v| v.trim().is_empty())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::One(value.to_string())
    }
}

/// Filter conditions extracted from one query segment.
///
/// Absent fields are not constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default)]
    pub assignee: Option<FieldValue>,

    #[serde(default)]
    pub priority: Option<FieldValue>,

    #[serde(default)]
    pub status: Option<FieldValue>,

    #[serde(default, alias = "issueType")]
    pub issue_type: Option<FieldValue>,

    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Criteria {
    /// Fields a criteria value may constrain.
    pub const FIELDS: [TaskField; 4] = [
        TaskField::Assignee,
        TaskField::Priority,
        TaskField::Status,
        TaskField::IssueType,
    ];

    pub fn get(&self, field: TaskField) -> Option<&FieldValue> {
        match field {
            TaskField::Assignee => self.assignee.as_ref(),
            TaskField::Priority => self.priority.as_ref(),
            TaskField::Status => self.status.as_ref(),
            TaskField::IssueType => self.issue_type.as_ref(),
            TaskField::Project | TaskField::Sprint => None,
        }
    }

    /// Set a filterable field. Project and sprint are ignored.
    pub fn set(&mut self, field: TaskField, value: FieldValue) {
        match field {
            TaskField::Assignee => self.assignee = Some(value),
            TaskField::Priority => self.priority = Some(value),
            TaskField::Status => self.status = Some(value),
            TaskField::IssueType => self.issue_type = Some(value),
            TaskField::Project | TaskField::Sprint => {}
        }
    }

    /// True when no field constrains anything.
    pub fn is_unconstrained(&self) -> bool {
        Self::FIELDS.iter().all(|f| self.get(*f).is_none())
    }
}

/// How the criteria of a group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
        }
    }

    /// The connective as it appears in free text.
    pub fn connective(&self) -> &'static str {
        match self {
            LogicOperator::And => " and ",
            LogicOperator::Or => " or ",
        }
    }
}

/// Criteria combined with exactly one operator.
///
/// A query without an explicit connective has exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaGroup {
    pub operator: LogicOperator,
    pub criteria: Vec<Criteria>,
}

impl CriteriaGroup {
    pub fn single(criteria: Criteria) -> Self {
        Self {
            operator: LogicOperator::And,
            criteria: vec![criteria],
        }
    }

    pub fn new(operator: LogicOperator, criteria: Vec<Criteria>) -> Self {
        Self { operator, criteria }
    }

    /// True when no entry constrains anything.
    pub fn is_unconstrained(&self) -> bool {
        self.criteria.iter().all(Criteria::is_unconstrained)
    }
}

impl Default for CriteriaGroup {
    fn default() -> Self {
        Self::single(Criteria::default())
    }
}

/// Structural filters supplied by the caller, independent of the free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub sprint_filter: Option<String>,

    #[serde(default)]
    pub project_filter: Option<String>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context, dropping blank filters.
    pub fn from_filters(sprint: Option<String>, project: Option<String>) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            sprint_filter: keep(sprint),
            project_filter: keep(project),
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_untagged_serde() {
        let one: FieldValue = serde_json::from_str(r#""high""#).unwrap();
        assert_eq!(one, FieldValue::One("high".to_string()));

        let any: FieldValue = serde_json::from_str(r#"["high","low"]"#).unwrap();
        assert_eq!(any.values(), vec!["high", "low"]);
    }

    #[test]
    fn test_criteria_accepts_nulls() {
        let json = r#"{"assignee":null,"priority":"high","status":null,"issue_type":"bug","keywords":[]}"#;
        let criteria: Criteria = serde_json::from_str(json).unwrap();
        assert!(criteria.assignee.is_none());
        assert_eq!(criteria.priority, Some(FieldValue::from("high")));
        assert!(!criteria.is_unconstrained());
    }

    #[test]
    fn test_operator_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&LogicOperator::Or).unwrap(), r#""OR""#);
        assert_eq!(LogicOperator::And.connective(), " and ");
    }

    #[test]
    fn test_context_drops_blank_filters() {
        let context = QueryContext::from_filters(Some("  ".to_string()), Some("Alpha".to_string()));
        assert!(context.sprint_filter.is_none());
        assert_eq!(context.project_filter.as_deref(), Some("Alpha"));
    }
}
