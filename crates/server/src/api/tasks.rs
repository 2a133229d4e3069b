//! Task API handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use scrivano_core::{
    FileStructure, OrchestratorError, StatusReport, Task, TaskData, TaskDataKind, TaskStatus,
};

use crate::metrics::{TASKS_CREATED_TOTAL, TASK_TRANSITIONS_TOTAL};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for task operations
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub filename: String,
    pub status: TaskStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub storage_refs: std::collections::BTreeMap<scrivano_core::StorageRole, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            filename: task.filename,
            status: task.status,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
            processing_started_at: task.processing_started_at.map(|t| t.to_rfc3339()),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
            storage_refs: task.storage_refs,
            error_message: task.error_message,
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: usize,
}

/// Request body for worker progress reports
#[derive(Debug, Deserialize)]
pub struct ProgressBody {
    /// Percent complete (0-100).
    pub percent: u8,
    /// Progress message.
    pub message: String,
}

/// Request body for worker status reports
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    /// Target status: "processing", "completed" or "failed".
    pub status: String,
    /// Failure reason (required for "failed").
    pub error: Option<String>,
    /// Odds-path artifact key (required for "completed").
    pub odds_path_key: Option<String>,
    /// Explanations artifact key (required for "completed").
    pub explanations_key: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map orchestrator failures onto HTTP statuses.
pub fn error_response(err: OrchestratorError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidTransition { .. } => StatusCode::CONFLICT,
        OrchestratorError::TaskNotReady { .. } => StatusCode::CONFLICT,
        OrchestratorError::DocumentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        OrchestratorError::PublishFailure { .. } => StatusCode::BAD_GATEWAY,
        OrchestratorError::MissingArtifact { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a task from an uploaded PDF (multipart field "file").
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TaskResponse>), (StatusCode, Json<ErrorResponse>)> {
    let mut upload: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        if field.content_type() != Some("application/pdf") {
            return Err(bad_request("file must be a PDF"));
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| bad_request("file field is missing a filename"))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| bad_request("missing \"file\" field"))?;

    match state.orchestrator().create_task(&filename, bytes).await {
        Ok(task) => {
            TASKS_CREATED_TOTAL.inc();
            Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// Get a task by id.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .orchestrator()
        .get_task(&id)
        .map(|task| Json(TaskResponse::from(task)))
        .map_err(error_response)
}

/// List tasks, most recently created first.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListTasksResponse>, (StatusCode, Json<ErrorResponse>)> {
    let tasks = state.orchestrator().list_tasks().map_err(error_response)?;

    Ok(Json(ListTasksResponse {
        total: tasks.len(),
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
    }))
}

/// Decoded rows for one result artifact.
pub async fn get_task_data(
    State(state): State<Arc<AppState>>,
    Path((id, data_type)): Path<(String, String)>,
) -> Result<Json<Vec<serde_json::Value>>, (StatusCode, Json<ErrorResponse>)> {
    let kind = parse_data_kind(&data_type)?;

    state
        .orchestrator()
        .task_data(&id, kind)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Decoded rows for both result artifacts.
pub async fn get_all_task_data(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskData>, (StatusCode, Json<ErrorResponse>)> {
    state
        .orchestrator()
        .all_task_data(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Raw artifact download.
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Path((id, data_type)): Path<(String, String)>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let kind = parse_data_kind(&data_type)?;

    let (key, bytes) = state
        .orchestrator()
        .download_artifact(&id, kind)
        .await
        .map_err(error_response)?;

    let filename = key.rsplit('/').next().unwrap_or(&key).to_string();

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Per-category file listing of the task's namespace.
pub async fn get_file_structure(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FileStructure>, (StatusCode, Json<ErrorResponse>)> {
    state
        .orchestrator()
        .file_structure(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Worker progress report.
pub async fn report_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ProgressBody>,
) -> Result<Json<scrivano_core::TaskEvent>, (StatusCode, Json<ErrorResponse>)> {
    state
        .orchestrator()
        .report_progress(&id, body.percent, &body.message)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Worker status report.
pub async fn report_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    let report = match body.status.as_str() {
        "processing" => StatusReport::Started,
        "completed" => {
            let odds_path_key = body
                .odds_path_key
                .ok_or_else(|| bad_request("odds_path_key is required for \"completed\""))?;
            let explanations_key = body
                .explanations_key
                .ok_or_else(|| bad_request("explanations_key is required for \"completed\""))?;
            StatusReport::Completed {
                odds_path_key,
                explanations_key,
            }
        }
        "failed" => StatusReport::Failed {
            error: body
                .error
                .ok_or_else(|| bad_request("error is required for \"failed\""))?,
        },
        other => {
            return Err(bad_request(format!(
                "unknown status \"{}\" (expected processing, completed or failed)",
                other
            )))
        }
    };

    match state.orchestrator().report_status(&id, report).await {
        Ok(task) => {
            TASK_TRANSITIONS_TOTAL
                .with_label_values(&[task.status.as_str()])
                .inc();
            Ok(Json(TaskResponse::from(task)))
        }
        Err(e) => Err(error_response(e)),
    }
}

fn parse_data_kind(data_type: &str) -> Result<TaskDataKind, (StatusCode, Json<ErrorResponse>)> {
    TaskDataKind::parse(data_type).ok_or_else(|| {
        bad_request(format!(
            "unknown data type \"{}\" (expected odds_path or explanations)",
            data_type
        ))
    })
}
