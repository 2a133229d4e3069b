//! Task lifecycle orchestrator.
//!
//! Owns task creation, validates state transitions, appends events and
//! coordinates the task store, object store and work queue. Worker feedback
//! is just another caller of `report_progress`/`report_status`, so the same
//! idempotence and ordering guarantees apply to every path.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::artifacts;
use crate::events::{EventBus, EventPayload, Subscription, TaskEvent};
use crate::queue::{ExtractionRequest, WorkQueue};
use crate::storage::{ObjectStore, ObjectStoreError, PARQUET_PREFIX, PDF_PREFIX};
use crate::task::{NewTask, StorageRole, Task, TaskStatus, TaskStore, TaskUpdate};

use super::config::OrchestratorConfig;
use super::locks::TaskLocks;
use super::types::{
    FileCategory, FileStructure, OrchestratorError, StatusReport, TaskData, TaskDataKind,
};

/// The task orchestrator.
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    tasks: Arc<dyn TaskStore>,
    objects: Arc<dyn ObjectStore>,
    queue: Arc<dyn WorkQueue>,
    events: Arc<EventBus>,
    locks: TaskLocks,
}

impl TaskOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        tasks: Arc<dyn TaskStore>,
        objects: Arc<dyn ObjectStore>,
        queue: Arc<dyn WorkQueue>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            tasks,
            objects,
            queue,
            events,
            locks: TaskLocks::new(),
        }
    }

    /// The event bus backing this orchestrator.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a task for an uploaded document.
    ///
    /// Sequence: store the document, create the pending record, append the
    /// initial status event, publish the work message. There is no
    /// distributed transaction across those steps; if the publish fails
    /// after the record exists, the task is transitioned to `failed` with a
    /// descriptive message so no task is ever left pending with no queued
    /// work.
    pub async fn create_task(
        &self,
        filename: &str,
        document: Bytes,
    ) -> Result<Task, OrchestratorError> {
        if document.len() > self.config.max_document_bytes {
            return Err(OrchestratorError::DocumentTooLarge {
                size: document.len(),
                limit: self.config.max_document_bytes,
            });
        }

        let task_id = uuid::Uuid::new_v4().to_string();
        let pdf_key = format!("{}{}", PDF_PREFIX, filename);

        self.objects.put(&task_id, &pdf_key, document).await?;

        let mut storage_refs = BTreeMap::new();
        storage_refs.insert(StorageRole::Pdf, pdf_key.clone());

        let task = self.tasks.create(NewTask {
            id: task_id.clone(),
            filename: filename.to_string(),
            storage_refs,
        })?;

        self.events.append(
            &task_id,
            EventPayload::Status {
                status: TaskStatus::Pending,
                message: Some(format!("task created for {}", filename)),
            },
        )?;

        let request = ExtractionRequest {
            task_id: task_id.clone(),
            filename: filename.to_string(),
            pdf_path: pdf_key,
            submitted_at: Utc::now(),
        };

        if let Err(e) = self.queue.publish(&request).await {
            warn!(task_id = %task_id, error = %e, "publish failed, marking task failed");
            let reason = format!("failed to enqueue extraction: {}", e);

            self.tasks.update(
                &task_id,
                TaskUpdate::new()
                    .with_status(TaskStatus::Failed)
                    .with_completed_at(Utc::now())
                    .with_error_message(reason.clone()),
            )?;
            self.events.append(
                &task_id,
                EventPayload::Error {
                    error: reason,
                    details: None,
                },
            )?;
            self.events.release(&task_id);
            self.locks.release(&task_id);

            return Err(OrchestratorError::PublishFailure {
                task_id,
                reason: e.to_string(),
            });
        }

        info!(task_id = %task_id, filename = %filename, "task created");
        Ok(task)
    }

    // ========================================================================
    // Worker feedback
    // ========================================================================

    /// Append a progress event. Does not change the task's status.
    pub async fn report_progress(
        &self,
        task_id: &str,
        percent: u8,
        message: &str,
    ) -> Result<TaskEvent, OrchestratorError> {
        let lock = self.locks.lock_for(task_id);
        let _guard = lock.lock().await;

        let task = self.require_task(task_id)?;
        if task.status.is_terminal() {
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                current: task.status,
                attempted: "progress".to_string(),
            });
        }

        let event = self.events.append(
            task_id,
            EventPayload::Progress {
                percent: percent.min(100),
                message: message.to_string(),
            },
        )?;

        Ok(event)
    }

    /// Apply a worker-reported status change through the state machine.
    ///
    /// Reports for the same task are serialized by a per-task lock; reports
    /// for different tasks run in parallel. A duplicate terminal report is
    /// accepted as a no-op (at-least-once delivery); any other transition
    /// out of a terminal state is rejected without mutating anything.
    pub async fn report_status(
        &self,
        task_id: &str,
        report: StatusReport,
    ) -> Result<Task, OrchestratorError> {
        let lock = self.locks.lock_for(task_id);
        let _guard = lock.lock().await;

        let task = self.require_task(task_id)?;
        let target = report.target_status();

        if task.status.is_terminal() {
            if task.status == target {
                debug!(task_id, status = %target, "duplicate terminal report ignored");
                return Ok(task);
            }
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                current: task.status,
                attempted: target.as_str().to_string(),
            });
        }

        if !task.status.can_transition_to(target) {
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                current: task.status,
                attempted: target.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let updated = match report {
            StatusReport::Started => {
                let updated = self.tasks.update(
                    task_id,
                    TaskUpdate::new()
                        .with_status(TaskStatus::Processing)
                        .with_processing_started_at(now),
                )?;
                self.events.append(
                    task_id,
                    EventPayload::Status {
                        status: TaskStatus::Processing,
                        message: Some("extraction started".to_string()),
                    },
                )?;
                updated
            }

            StatusReport::Completed {
                odds_path_key,
                explanations_key,
            } => {
                let updated = self.tasks.update(
                    task_id,
                    TaskUpdate::new()
                        .with_status(TaskStatus::Completed)
                        .with_completed_at(now)
                        .with_storage_ref(StorageRole::OddsPathParquet, odds_path_key.clone())
                        .with_storage_ref(
                            StorageRole::ExplanationsParquet,
                            explanations_key.clone(),
                        ),
                )?;

                let mut artifacts = BTreeMap::new();
                artifacts.insert(StorageRole::OddsPathParquet, odds_path_key);
                artifacts.insert(StorageRole::ExplanationsParquet, explanations_key);
                self.events
                    .append(task_id, EventPayload::Completion { artifacts })?;

                self.events.release(task_id);
                self.locks.release(task_id);
                updated
            }

            StatusReport::Failed { error } => {
                let updated = self.tasks.update(
                    task_id,
                    TaskUpdate::new()
                        .with_status(TaskStatus::Failed)
                        .with_completed_at(now)
                        .with_error_message(error.clone()),
                )?;
                self.events.append(
                    task_id,
                    EventPayload::Error {
                        error,
                        details: None,
                    },
                )?;

                self.events.release(task_id);
                self.locks.release(task_id);
                updated
            }
        };

        info!(task_id, status = %updated.status, "task status updated");
        Ok(updated)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get a task by id.
    pub fn get_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.require_task(task_id)
    }

    /// List tasks, most recently created first.
    pub fn list_tasks(&self) -> Result<Vec<Task>, OrchestratorError> {
        Ok(self.tasks.list_active()?)
    }

    /// Decode one result artifact into row-oriented data.
    ///
    /// Only permitted once the task is `completed`.
    pub async fn task_data(
        &self,
        task_id: &str,
        kind: TaskDataKind,
    ) -> Result<Vec<serde_json::Value>, OrchestratorError> {
        let (_, bytes) = self.artifact_bytes(task_id, kind).await?;
        Ok(artifacts::read_rows(&bytes)?)
    }

    /// Decode both result artifacts.
    pub async fn all_task_data(&self, task_id: &str) -> Result<TaskData, OrchestratorError> {
        Ok(TaskData {
            odds_path: self.task_data(task_id, TaskDataKind::OddsPath).await?,
            explanations: self.task_data(task_id, TaskDataKind::Explanations).await?,
        })
    }

    /// Fetch the raw bytes of a result artifact for download.
    pub async fn download_artifact(
        &self,
        task_id: &str,
        kind: TaskDataKind,
    ) -> Result<(String, Bytes), OrchestratorError> {
        self.artifact_bytes(task_id, kind).await
    }

    /// Per-category file listing of the task's object-store namespace.
    pub async fn file_structure(&self, task_id: &str) -> Result<FileStructure, OrchestratorError> {
        self.require_task(task_id)?;

        let pdfs = self.objects.list(task_id, PDF_PREFIX).await?;
        let parquets = self.objects.list(task_id, PARQUET_PREFIX).await?;
        let others: Vec<String> = self
            .objects
            .list(task_id, "")
            .await?
            .into_iter()
            .filter(|key| !key.starts_with(PDF_PREFIX) && !key.starts_with(PARQUET_PREFIX))
            .collect();

        let total_files = pdfs.len() + parquets.len() + others.len();

        Ok(FileStructure {
            task_id: task_id.to_string(),
            pdfs: FileCategory::from_keys(pdfs),
            parquets: FileCategory::from_keys(parquets),
            others: FileCategory::from_keys(others),
            total_files,
        })
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    /// Subscribe to a task's event stream (replay-then-live).
    pub fn subscribe(&self, task_id: &str) -> Result<Subscription, OrchestratorError> {
        self.require_task(task_id)?;
        Ok(self.events.subscribe(task_id)?)
    }

    /// Historical event log for a task.
    pub fn event_history(&self, task_id: &str) -> Result<Vec<TaskEvent>, OrchestratorError> {
        self.require_task(task_id)?;
        Ok(self.events.history(task_id)?)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.tasks
            .get(task_id)?
            .ok_or_else(|| OrchestratorError::NotFound(task_id.to_string()))
    }

    /// Resolve and read a completed task's artifact.
    ///
    /// The key comes from `storage_refs`; if the record predates the ref
    /// (or a worker only wrote the file), fall back to a prefix listing of
    /// `parquets/{kind}_…` the way the original store layout is organized.
    async fn artifact_bytes(
        &self,
        task_id: &str,
        kind: TaskDataKind,
    ) -> Result<(String, Bytes), OrchestratorError> {
        let task = self.require_task(task_id)?;

        if task.status != TaskStatus::Completed {
            return Err(OrchestratorError::TaskNotReady {
                task_id: task_id.to_string(),
                status: task.status,
            });
        }

        let key = match task.storage_ref(kind.storage_role()) {
            Some(key) => key.to_string(),
            None => {
                let prefix = format!("{}{}_", PARQUET_PREFIX, kind.as_str());
                self.objects
                    .list(task_id, &prefix)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(OrchestratorError::MissingArtifact {
                        task_id: task_id.to_string(),
                        kind,
                    })?
            }
        };

        match self.objects.get(task_id, &key).await {
            Ok(bytes) => Ok((key, bytes)),
            Err(ObjectStoreError::NotFound { .. }) => Err(OrchestratorError::MissingArtifact {
                task_id: task_id.to_string(),
                kind,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
