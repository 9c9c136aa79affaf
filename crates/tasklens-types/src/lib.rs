//! # tasklens-types
//!
//! Shared domain types for the tasklens query engine.
//!
//! - Records: immutable snapshots of tracker tasks owned by the document store
//! - Criteria: structured filter conditions extracted from free text
//! - Context: caller-supplied structural filters (sprint, project)
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use tasklens_types::{QueryContext, TaskField, TaskRecord};
//!
//! let record = TaskRecord::new("T-1").with_project("Alpha");
//! assert_eq!(record.field(TaskField::Project), Some("Alpha"));
//!
//! let context = QueryContext::from_filters(Some(" ".to_string()), Some("Alpha".to_string()));
//! assert!(context.sprint_filter.is_none());
//! ```

pub mod config;
pub mod criteria;
pub mod error;
pub mod record;

pub use config::{ClassifierSettings, ModelSettings, RetrievalSettings, Settings};
pub use criteria::{Criteria, CriteriaGroup, FieldValue, LogicOperator, QueryContext};
pub use error::TaskLensError;
pub use record::{RetrievalResult, TaskField, TaskRecord};
