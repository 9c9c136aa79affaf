//! Corpus inspection: collection statistics and paginated listing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tasklens_types::{TaskField, TaskRecord};

/// Summary of what the collection holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub total_documents: usize,
    pub projects: Vec<String>,
    pub sprints: Vec<String>,
    pub issue_types: Vec<String>,
    pub statuses: Vec<String>,
}

impl CorpusStats {
    pub fn from_records(records: &[TaskRecord]) -> Self {
        let distinct = |field: TaskField| -> Vec<String> {
            records
                .iter()
                .filter_map(|r| r.field(field))
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        Self {
            total_documents: records.len(),
            projects: distinct(TaskField::Project),
            sprints: distinct(TaskField::Sprint),
            issue_types: distinct(TaskField::IssueType),
            statuses: distinct(TaskField::Status),
        }
    }
}

/// Exact (case-insensitive) filters for listing records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub sprint: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &TaskRecord) -> bool {
        let checks = [
            (TaskField::Project, &self.project),
            (TaskField::Sprint, &self.sprint),
            (TaskField::IssueType, &self.issue_type),
            (TaskField::Status, &self.status),
        ];
        checks.iter().all(|(field, wanted)| match wanted {
            None => true,
            Some(wanted) => {
                let wanted = wanted.trim().to_lowercase();
                record
                    .field(*field)
                    .map(|v| v.trim().to_lowercase() == wanted)
                    .unwrap_or(false)
            }
        })
    }
}

/// One page of listed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPage {
    pub records: Vec<TaskRecord>,
    pub total_filtered: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub total_pages: usize,
}

/// Filter then paginate. A `limit` of zero is treated as one.
pub fn list_records(
    records: &[TaskRecord],
    filter: &RecordFilter,
    offset: usize,
    limit: usize,
) -> RecordPage {
    let limit = limit.max(1);
    let filtered: Vec<&TaskRecord> = records.iter().filter(|r| filter.matches(r)).collect();
    let total_filtered = filtered.len();

    let page: Vec<TaskRecord> = filtered
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    RecordPage {
        has_more: offset + page.len() < total_filtered,
        total_pages: total_filtered.div_ceil(limit),
        records: page,
        total_filtered,
        offset,
        limit,
    }
}
