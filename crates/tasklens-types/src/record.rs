//! Task records and retrieval hits.
//!
//! A `TaskRecord` is an immutable snapshot of one tracker issue. The document
//! store owns the corpus; the query engine only ever reads records.

use serde::{Deserialize, Serialize};

/// Structural field of a task record.
///
/// The first four are filterable through criteria; project and sprint are
/// only constrained through the query context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Priority,
    Status,
    IssueType,
    Assignee,
    Project,
    Sprint,
}

impl TaskField {
    /// Every field, in vocabulary order.
    pub const ALL: [TaskField; 6] = [
        TaskField::Priority,
        TaskField::Status,
        TaskField::IssueType,
        TaskField::Assignee,
        TaskField::Project,
        TaskField::Sprint,
    ];

    /// Returns the display name for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskField::Priority => "priority",
            TaskField::Status => "status",
            TaskField::IssueType => "issue_type",
            TaskField::Assignee => "assignee",
            TaskField::Project => "project",
            TaskField::Sprint => "sprint",
        }
    }
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of one corpus document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Issue key (e.g. "ALPHA-12")
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub assignee: Option<String>,

    #[serde(default)]
    pub reporter: Option<String>,

    #[serde(default)]
    pub issue_type: Option<String>,

    #[serde(default)]
    pub resolution: Option<String>,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub sprint: Option<String>,
}

impl TaskRecord {
    /// Create a record with only an id; metadata is filled in with the `with_*` builders.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            status: None,
            priority: None,
            assignee: None,
            reporter: None,
            issue_type: None,
            resolution: None,
            project: None,
            sprint: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = Some(reporter.into());
        self
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_sprint(mut self, sprint: impl Into<String>) -> Self {
        self.sprint = Some(sprint.into());
        self
    }

    /// Value of a structural field, if present and non-blank.
    pub fn field(&self, field: TaskField) -> Option<&str> {
        let value = match field {
            TaskField::Priority => &self.priority,
            TaskField::Status => &self.status,
            TaskField::IssueType => &self.issue_type,
            TaskField::Assignee => &self.assignee,
            TaskField::Project => &self.project,
            TaskField::Sprint => &self.sprint,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Render the record as the text that gets embedded and shown to the model.
    pub fn document_text(&self) -> String {
        fn or_unknown(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("Unknown")
        }

        format!(
            "Task ID: {}\nTitle: {}\nDescription: {}\nStatus: {}\nPriority: {}\nAssignee: {}\nReporter: {}\nIssue Type: {}\nResolution: {}\nProject: {}\nSprint: {}",
            self.id,
            or_unknown(&self.title),
            or_unknown(&self.description),
            or_unknown(&self.status),
            or_unknown(&self.priority),
            or_unknown(&self.assignee),
            or_unknown(&self.reporter),
            or_unknown(&self.issue_type),
            self.resolution.as_deref().unwrap_or("Unresolved"),
            or_unknown(&self.project),
            or_unknown(&self.sprint),
        )
    }
}

/// A candidate record with the relevance score assigned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub record: TaskRecord,

    /// Similarity reported by the vector store, higher is more similar.
    /// Exact structural matches are scored 1.0.
    pub relevance_score: f32,
}

impl RetrievalResult {
    pub fn new(record: TaskRecord, relevance_score: f32) -> Self {
        Self {
            record,
            relevance_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ignores_blank_values() {
        let record = TaskRecord::new("T-1").with_status("  ").with_priority("High");
        assert_eq!(record.field(TaskField::Status), None);
        assert_eq!(record.field(TaskField::Priority), Some("High"));
        assert_eq!(record.field(TaskField::Sprint), None);
    }

    #[test]
    fn test_document_text_layout() {
        let record = TaskRecord::new("ALPHA-1")
            .with_title("Login fails")
            .with_status("Done")
            .with_project("Alpha");
        let text = record.document_text();
        assert!(text.starts_with("Task ID: ALPHA-1\nTitle: Login fails\n"));
        assert!(text.contains("Status: Done"));
        assert!(text.contains("Resolution: Unresolved"));
        assert!(text.ends_with("Project: Alpha\nSprint: Unknown"));
    }

    #[test]
    fn test_record_serde_uses_camel_case() {
        let json = r#"{"id":"T-9","issueType":"Bug","sprint":"Sprint-1"}"#;
        let record: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.issue_type.as_deref(), Some("Bug"));
        assert_eq!(record.sprint.as_deref(), Some("Sprint-1"));
        assert!(record.title.is_none());
    }
}
