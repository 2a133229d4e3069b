//! Types for the task orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::events::EventBusError;
use crate::storage::ObjectStoreError;
use crate::task::{StorageRole, TaskError, TaskStatus};

/// Which result artifact a data request refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskDataKind {
    /// Extracted odds-path rows.
    OddsPath,
    /// Field explanations.
    Explanations,
}

impl TaskDataKind {
    /// Returns the kind as a string (also the artifact key prefix piece).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskDataKind::OddsPath => "odds_path",
            TaskDataKind::Explanations => "explanations",
        }
    }

    /// The storage role the artifact is recorded under.
    pub fn storage_role(&self) -> StorageRole {
        match self {
            TaskDataKind::OddsPath => StorageRole::OddsPathParquet,
            TaskDataKind::Explanations => StorageRole::ExplanationsParquet,
        }
    }

    /// Parse from a client-supplied string.
    pub fn parse(s: &str) -> Option<TaskDataKind> {
        match s {
            "odds_path" => Some(TaskDataKind::OddsPath),
            "explanations" => Some(TaskDataKind::Explanations),
            _ => None,
        }
    }
}

impl fmt::Display for TaskDataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker-reported status change.
///
/// Worker feedback goes through the same entry point as any other caller,
/// so at-least-once delivery from the broker side is tolerated uniformly.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    /// Extraction started.
    Started,
    /// Extraction finished; both result artifacts were written.
    Completed {
        /// Object-store key of the odds-path parquet.
        odds_path_key: String,
        /// Object-store key of the explanations parquet.
        explanations_key: String,
    },
    /// Extraction failed.
    Failed {
        /// Reason for the failure.
        error: String,
    },
}

impl StatusReport {
    /// The status this report drives the task toward.
    pub fn target_status(&self) -> TaskStatus {
        match self {
            StatusReport::Started => TaskStatus::Processing,
            StatusReport::Completed { .. } => TaskStatus::Completed,
            StatusReport::Failed { .. } => TaskStatus::Failed,
        }
    }
}

/// One category of a task's object-store listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileCategory {
    /// Number of files in this category.
    pub count: usize,
    /// Object keys, sorted.
    pub files: Vec<String>,
}

impl FileCategory {
    /// Build a category from a sorted key listing.
    pub fn from_keys(files: Vec<String>) -> Self {
        Self {
            count: files.len(),
            files,
        }
    }
}

/// Per-category file listing for a task's namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileStructure {
    /// The task id.
    pub task_id: String,
    /// Uploaded source documents.
    pub pdfs: FileCategory,
    /// Result artifacts.
    pub parquets: FileCategory,
    /// Anything else in the namespace.
    pub others: FileCategory,
    /// Total number of files across categories.
    pub total_files: usize,
}

/// Both decoded result artifacts of a completed task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskData {
    /// Decoded odds-path rows.
    pub odds_path: Vec<serde_json::Value>,
    /// Decoded explanation rows.
    pub explanations: Vec<serde_json::Value>,
}

/// Error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Task absent.
    #[error("task not found: {0}")]
    NotFound(String),

    /// A transition (or progress report) was rejected by the state machine.
    /// Non-fatal: the record is untouched.
    #[error("cannot apply {attempted} to task {task_id}: current status is {current}")]
    InvalidTransition {
        task_id: String,
        current: TaskStatus,
        attempted: String,
    },

    /// Data or artifact requested before the task completed.
    #[error("task {task_id} is not ready: status is {status}")]
    TaskNotReady { task_id: String, status: TaskStatus },

    /// The work message could not be enqueued; the task was transitioned to
    /// failed as compensation rather than left dangling in pending.
    #[error("failed to enqueue extraction for task {task_id}: {reason}")]
    PublishFailure { task_id: String, reason: String },

    /// Upload exceeds the configured limit.
    #[error("document too large: {size} bytes (limit {limit})")]
    DocumentTooLarge { size: usize, limit: usize },

    /// The task is completed but the requested artifact is missing from the
    /// object store.
    #[error("artifact {kind} missing for task {task_id}")]
    MissingArtifact { task_id: String, kind: TaskDataKind },

    #[error(transparent)]
    Store(#[from] TaskError),

    #[error(transparent)]
    Storage(#[from] ObjectStoreError),

    #[error(transparent)]
    Events(#[from] EventBusError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_kind_strings() {
        assert_eq!(TaskDataKind::OddsPath.as_str(), "odds_path");
        assert_eq!(TaskDataKind::Explanations.as_str(), "explanations");
        assert_eq!(TaskDataKind::parse("odds_path"), Some(TaskDataKind::OddsPath));
        assert_eq!(
            TaskDataKind::parse("explanations"),
            Some(TaskDataKind::Explanations)
        );
        assert_eq!(TaskDataKind::parse("bogus"), None);
    }

    #[test]
    fn test_data_kind_storage_roles() {
        assert_eq!(
            TaskDataKind::OddsPath.storage_role(),
            StorageRole::OddsPathParquet
        );
        assert_eq!(
            TaskDataKind::Explanations.storage_role(),
            StorageRole::ExplanationsParquet
        );
    }

    #[test]
    fn test_status_report_targets() {
        assert_eq!(StatusReport::Started.target_status(), TaskStatus::Processing);
        assert_eq!(
            StatusReport::Completed {
                odds_path_key: "a".to_string(),
                explanations_key: "b".to_string(),
            }
            .target_status(),
            TaskStatus::Completed
        );
        assert_eq!(
            StatusReport::Failed {
                error: "x".to_string()
            }
            .target_status(),
            TaskStatus::Failed
        );
    }

    #[test]
    fn test_file_category_from_keys() {
        let category =
            FileCategory::from_keys(vec!["pdfs/a.pdf".to_string(), "pdfs/b.pdf".to_string()]);
        assert_eq!(category.count, 2);
    }
}
