//! Task storage trait and types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::task::{StorageRole, Task, TaskStatus};

/// Error type for task store operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new task record.
///
/// The id is assigned by the orchestrator before the record exists, because
/// the uploaded document is stored under the task's namespace first.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Pre-assigned task id.
    pub id: String,
    /// Original document name.
    pub filename: String,
    /// Initial storage refs (normally just the uploaded PDF).
    pub storage_refs: BTreeMap<StorageRole, String>,
}

/// Partial update applied to a task record.
///
/// The store persists exactly what it is given; status/timestamp discipline
/// is owned by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// New status, if changing.
    pub status: Option<TaskStatus>,
    /// Set `processing_started_at`.
    pub processing_started_at: Option<DateTime<Utc>>,
    /// Set `completed_at`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set `error_message`.
    pub error_message: Option<String>,
    /// Storage refs to merge into the record.
    pub storage_refs: BTreeMap<StorageRole, String>,
}

impl TaskUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Stamp `processing_started_at`.
    pub fn with_processing_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.processing_started_at = Some(at);
        self
    }

    /// Stamp `completed_at`.
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Set the failure message.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Merge a storage ref into the record.
    pub fn with_storage_ref(mut self, role: StorageRole, key: impl Into<String>) -> Self {
        self.storage_refs.insert(role, key.into());
        self
    }
}

/// Trait for task record storage backends.
pub trait TaskStore: Send + Sync {
    /// Create a new task record in `pending` state.
    fn create(&self, request: NewTask) -> Result<Task, TaskError>;

    /// Get a task by id.
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError>;

    /// Apply a partial update; refreshes `updated_at`.
    fn update(&self, id: &str, update: TaskUpdate) -> Result<Task, TaskError>;

    /// List tasks, most recently created first.
    fn list_active(&self) -> Result<Vec<Task>, TaskError>;

    /// Permanently delete a task record. Returns the deleted task if found.
    fn delete(&self, id: &str) -> Result<Task, TaskError>;
}
