//! Core task data types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current status of a task.
///
/// State machine flow:
/// ```text
/// Pending -> Processing -> Completed
///    |            |
///    v            v
///  Failed       Failed
///
/// Completed and Failed are terminal: no further transitions are accepted.
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created, extraction not yet picked up by a worker.
    Pending,
    /// A worker reported it started extracting the document.
    Processing,
    /// Extraction finished, result artifacts are available (terminal).
    Completed,
    /// Extraction failed or the work message could not be enqueued (terminal).
    Failed,
}

impl TaskStatus {
    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Returns true if the task is still moving through the pipeline.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    /// Returns the status as a string (for storage and filtering).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse a status from its storage representation.
    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an object-store reference held by a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StorageRole {
    /// The uploaded source document.
    Pdf,
    /// Extracted odds-path data (parquet).
    OddsPathParquet,
    /// Extracted field explanations (parquet).
    ExplanationsParquet,
}

impl StorageRole {
    /// Returns the role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageRole::Pdf => "pdf",
            StorageRole::OddsPathParquet => "odds_path_parquet",
            StorageRole::ExplanationsParquet => "explanations_parquet",
        }
    }
}

/// A task representing one document-extraction request and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier (UUID), assigned at creation.
    pub id: String,

    /// Original document name, immutable.
    pub filename: String,

    /// Current status.
    pub status: TaskStatus,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,

    /// When a worker reported extraction started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Logical object-store keys, keyed by role.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage_refs: BTreeMap<StorageRole, String>,

    /// Present only when the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Task {
    /// Returns the storage key recorded for the given role, if any.
    pub fn storage_ref(&self, role: StorageRole) -> Option<&str> {
        self.storage_refs.get(&role).map(String::as_str)
    }
}
