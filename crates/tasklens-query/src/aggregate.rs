//! Conversion of filtered results into output records and statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use tasklens_types::{RetrievalResult, TaskRecord};

use crate::error::QueryError;

const DONE_STATUSES: &[&str] = &["done", "closed", "resolved", "completed", "fixed"];
const IN_PROGRESS_STATUSES: &[&str] = &["in progress", "in-progress", "inprogress", "doing"];
const HIGH_PRIORITIES: &[&str] = &["high", "highest", "critical"];
const BUG_TYPES: &[&str] = &["bug", "defect"];

/// One task in the output, with defaults for missing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub reporter: String,
    pub issue_type: String,
    pub resolution: String,
    pub project: String,
    pub sprint: String,
    pub relevance_score: f32,
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl TaskView {
    pub fn from_record(record: &TaskRecord, relevance_score: f32) -> Self {
        Self {
            id: record.id.clone(),
            title: or_default(&record.title, "Unknown Title"),
            description: or_default(&record.description, ""),
            status: or_default(&record.status, "Unknown"),
            priority: or_default(&record.priority, "Medium"),
            assignee: or_default(&record.assignee, "Unassigned"),
            reporter: or_default(&record.reporter, "Unknown"),
            issue_type: or_default(&record.issue_type, "Task"),
            resolution: or_default(&record.resolution, "Unresolved"),
            project: or_default(&record.project, "Unknown Project"),
            sprint: or_default(&record.sprint, "Unknown Sprint"),
            relevance_score,
        }
    }

    fn is_in(value: &str, set: &[&str]) -> bool {
        set.contains(&value.trim().to_lowercase().as_str())
    }
}

/// Counts over a set of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub high_priority: usize,
    pub bugs: usize,
}

impl PortfolioStats {
    fn add(&mut self, task: &TaskView) {
        self.total += 1;
        if TaskView::is_in(&task.status, DONE_STATUSES) {
            self.completed += 1;
        }
        if TaskView::is_in(&task.status, IN_PROGRESS_STATUSES) {
            self.in_progress += 1;
        }
        if TaskView::is_in(&task.priority, HIGH_PRIORITIES) {
            self.high_priority += 1;
        }
        if TaskView::is_in(&task.issue_type, BUG_TYPES) {
            self.bugs += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project: String,
    pub stats: PortfolioStats,
}

/// Structured query output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub tasks: Vec<TaskView>,
    /// Sorted by project name
    pub per_project_summaries: Vec<ProjectSummary>,
    pub statistics: PortfolioStats,
    /// Ids of records that could not be converted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

fn check(result: &RetrievalResult) -> Result<(), QueryError> {
    if result.record.id.trim().is_empty() {
        return Err(QueryError::Aggregation {
            id: String::new(),
            reason: "record has no id".to_string(),
        });
    }
    if !result.relevance_score.is_finite() {
        return Err(QueryError::Aggregation {
            id: result.record.id.clone(),
            reason: format!("relevance score {} is not finite", result.relevance_score),
        });
    }
    Ok(())
}

/// Build tasks and statistics. Input order is preserved; malformed records
/// are skipped and listed.
pub fn aggregate(results: &[RetrievalResult]) -> AggregatedResult {
    let mut output = AggregatedResult::default();
    // Keyed case-insensitively; the first spelling seen is the display name
    let mut per_project: BTreeMap<String, (String, PortfolioStats)> = BTreeMap::new();

    for result in results {
        if let Err(e) = check(result) {
            warn!(error = %e, "Skipping record");
            output.skipped.push(result.record.id.clone());
            continue;
        }

        let task = TaskView::from_record(&result.record, result.relevance_score);
        output.statistics.add(&task);
        per_project
            .entry(task.project.trim().to_lowercase())
            .or_insert_with(|| (task.project.trim().to_string(), PortfolioStats::default()))
            .1
            .add(&task);
        output.tasks.push(task);
    }

    output.per_project_summaries = per_project
        .into_values()
        .map(|(project, stats)| ProjectSummary { project, stats })
        .collect();
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<RetrievalResult> {
        vec![
            RetrievalResult::new(
                TaskRecord::new("T1")
                    .with_title("Crash")
                    .with_priority("High")
                    .with_status("Done")
                    .with_issue_type("Bug")
                    .with_project("Beta"),
                0.9,
            ),
            RetrievalResult::new(
                TaskRecord::new("T2")
                    .with_priority("Critical")
                    .with_status("In Progress")
                    .with_project("Alpha"),
                0.8,
            ),
            RetrievalResult::new(TaskRecord::new("T3").with_status("Closed"), 0.7),
        ]
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let view = TaskView::from_record(&TaskRecord::new("X").with_assignee("  "), 1.0);
        assert_eq!(view.title, "Unknown Title");
        assert_eq!(view.status, "Unknown");
        assert_eq!(view.priority, "Medium");
        assert_eq!(view.assignee, "Unassigned");
        assert_eq!(view.issue_type, "Task");
        assert_eq!(view.resolution, "Unresolved");
        assert_eq!(view.project, "Unknown Project");
    }

    #[test]
    fn test_statistics() {
        let output = aggregate(&results());
        assert_eq!(
            output.statistics,
            PortfolioStats {
                total: 3,
                completed: 2,
                in_progress: 1,
                high_priority: 2,
                bugs: 1,
            }
        );

        let projects: Vec<&str> = output
            .per_project_summaries
            .iter()
            .map(|s| s.project.as_str())
            .collect();
        assert_eq!(projects, vec!["Alpha", "Beta", "Unknown Project"]);
        assert_eq!(output.per_project_summaries[1].stats.bugs, 1);
    }

    #[test]
    fn test_preserves_order_and_is_deterministic() {
        let first = aggregate(&results());
        let ids: Vec<&str> = first.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T3"]);
        assert_eq!(first, aggregate(&results()));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut input = results();
        input.push(RetrievalResult::new(TaskRecord::new("T4"), f32::NAN));
        input.push(RetrievalResult::new(TaskRecord::new(" "), 0.5));

        let output = aggregate(&input);
        assert_eq!(output.tasks.len(), 3);
        assert_eq!(output.statistics.total, 3);
        assert_eq!(output.skipped, vec!["T4".to_string(), " ".to_string()]);
    }

    #[test]
    fn test_project_buckets_ignore_case() {
        let results = vec![
            RetrievalResult::new(TaskRecord::new("A").with_project("Alpha"), 0.9),
            RetrievalResult::new(TaskRecord::new("B").with_project("alpha "), 0.8),
            RetrievalResult::new(TaskRecord::new("C").with_project("Beta"), 0.7),
        ];
        let output = aggregate(&results);

        let summaries: Vec<(&str, usize)> = output
            .per_project_summaries
            .iter()
            .map(|s| (s.project.as_str(), s.stats.total))
            .collect();
        assert_eq!(summaries, vec![("Alpha", 2), ("Beta", 1)]);
    }

    #[test]
    fn test_empty_input() {
        let output = aggregate(&[]);
        assert!(output.tasks.is_empty());
        assert!(output.per_project_summaries.is_empty());
        assert_eq!(output.statistics, PortfolioStats::default());
    }
}
