//! Corpus ingestion from tracker exports.
//!
//! Raw items are cleaned into `TaskRecord`s and written to a `DocumentStore`
//! in batches. A failed batch is retried one document at a time so a single
//! bad record does not cost the whole batch.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use tasklens_types::TaskRecord;

use crate::error::StoreError;
use crate::traits::DocumentStore;

/// One issue as exported by the tracker.
///
/// Every field is optional; numbers are accepted where strings are expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub issue_key: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub issue_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub priority: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub assignee: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub reporter: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub created: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub updated: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub resolution: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub project_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub sprint_id: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Trim and flatten line breaks and tabs to spaces. Blank input becomes `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    let cleaned: String = value?
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl RawTaskItem {
    /// Convert to a record. Returns `None` when the item has neither summary nor description.
    pub fn into_record(self, fallback_id: usize) -> Option<TaskRecord> {
        let title = clean_text(self.summary.as_deref());
        let description = clean_text(self.description.as_deref());
        if title.is_none() && description.is_none() {
            return None;
        }

        let id = clean_text(self.issue_key.as_deref())
            .unwrap_or_else(|| format!("task-{}", fallback_id));

        Some(TaskRecord {
            id,
            title,
            description,
            status: clean_text(self.status.as_deref()),
            priority: clean_text(self.priority.as_deref()),
            assignee: clean_text(self.assignee.as_deref()),
            reporter: clean_text(self.reporter.as_deref()),
            issue_type: clean_text(self.issue_type.as_deref()),
            resolution: clean_text(self.resolution.as_deref()),
            project: clean_text(self.project_id.as_deref()),
            sprint: clean_text(self.sprint_id.as_deref()),
        })
    }
}

/// Parse a JSON export: either an array of items or `{"data": [...]}`.
pub fn parse_export(json: &str) -> Result<Vec<RawTaskItem>, StoreError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Export {
        Items(Vec<RawTaskItem>),
        Wrapped { data: Vec<RawTaskItem> },
    }

    Ok(match serde_json::from_str::<Export>(json)? {
        Export::Items(items) => items,
        Export::Wrapped { data } => data,
    })
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Items received
    pub received: usize,
    /// Items converted to records
    pub processed: usize,
    /// Items skipped for having no summary and no description
    pub skipped: usize,
    /// Records stored
    pub added: usize,
    /// Batches that failed as a whole
    pub failed_batches: usize,
    /// Records stored by the one-at-a-time retry of a failed batch
    pub recovered: usize,
    /// Records that could not be stored at all
    pub failed: usize,
}

/// Convert raw items and add them to the store in batches.
pub async fn ingest_items<S>(
    store: &S,
    items: Vec<RawTaskItem>,
    batch_size: usize,
) -> Result<IngestReport, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let mut report = IngestReport {
        received: items.len(),
        ..IngestReport::default()
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item.into_record(index) {
            Some(record) => records.push(record),
            None => report.skipped += 1,
        }
    }
    report.processed = records.len();

    if records.is_empty() {
        debug!(skipped = report.skipped, "Nothing to ingest");
        return Ok(report);
    }

    info!(count = records.len(), batch_size, "Ingesting records");

    for batch in records.chunks(batch_size.max(1)) {
        match store.add_documents(batch).await {
            Ok(added) => report.added += added,
            Err(e) => {
                warn!(error = %e, size = batch.len(), "Batch failed, retrying documents individually");
                report.failed_batches += 1;
                for record in batch {
                    match store.add_documents(std::slice::from_ref(record)).await {
                        Ok(added) => {
                            report.added += added;
                            report.recovered += added;
                        }
                        Err(e) => {
                            warn!(id = %record.id, error = %e, "Failed to add document");
                            report.failed += 1;
                        }
                    }
                }
            }
        }
    }

    info!(
        processed = report.processed,
        added = report.added,
        skipped = report.skipped,
        failed = report.failed,
        "Ingestion complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn raw(key: &str, summary: &str) -> RawTaskItem {
        RawTaskItem {
            issue_key: Some(key.to_string()),
            summary: Some(summary.to_string()),
            ..RawTaskItem::default()
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  a\nb\tc\r ")), Some("a b c".to_string()));
        assert_eq!(clean_text(Some(" \n ")), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn test_into_record_maps_fields() {
        let item = RawTaskItem {
            issue_key: Some("ALPHA-7".to_string()),
            summary: Some("Fix\nlogin".to_string()),
            issue_type: Some("Bug".to_string()),
            project_id: Some("Alpha".to_string()),
            sprint_id: Some("Sprint-1".to_string()),
            ..RawTaskItem::default()
        };
        let record = item.into_record(0).unwrap();
        assert_eq!(record.id, "ALPHA-7");
        assert_eq!(record.title.as_deref(), Some("Fix login"));
        assert_eq!(record.issue_type.as_deref(), Some("Bug"));
        assert_eq!(record.project.as_deref(), Some("Alpha"));
        assert!(record.description.is_none());
    }

    #[test]
    fn test_item_without_text_is_skipped() {
        let item = RawTaskItem {
            issue_key: Some("X-1".to_string()),
            description: Some("   ".to_string()),
            ..RawTaskItem::default()
        };
        assert!(item.into_record(0).is_none());
    }

    #[test]
    fn test_parse_export_accepts_numbers_and_wrapper() {
        let json = r#"{"data":[{"issueKey":42,"summary":"Numbered","sprintId":3,"assignee":null}]}"#;
        let items = parse_export(json).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].issue_key.as_deref(), Some("42"));
        assert_eq!(items[0].sprint_id.as_deref(), Some("3"));
        assert!(items[0].assignee.is_none());

        let items = parse_export(r#"[{"summary":"Bare"}]"#).unwrap();
        let record = items.into_iter().next().unwrap().into_record(5).unwrap();
        assert_eq!(record.id, "task-5");
    }

    #[tokio::test]
    async fn test_ingest_counts() {
        let store = InMemoryStore::new();
        let items = vec![raw("A-1", "one"), RawTaskItem::default(), raw("A-2", "two")];
        let report = ingest_items(&store, items, 50).await.unwrap();

        assert_eq!(report.received, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.added, 2);
        assert_eq!(report.failed_batches, 0);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_retries_individually() {
        let store = InMemoryStore::new().with_max_batch_size(1);
        let items = vec![raw("A-1", "one"), raw("A-2", "two"), raw("A-3", "three")];
        let report = ingest_items(&store, items, 2).await.unwrap();

        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.recovered, 2);
        assert_eq!(report.added, 3);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_rejected_document_is_counted() {
        let store = InMemoryStore::new().with_rejected_id("A-2");
        let items = vec![raw("A-1", "one"), raw("A-2", "two")];
        let report = ingest_items(&store, items, 50).await.unwrap();

        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.added, 1);
        assert_eq!(report.failed, 1);
    }
}
