//! Task event types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{StorageRole, TaskStatus};

/// Kind of a task event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Worker progress within the current status.
    Progress,
    /// Status change (including the initial `pending`).
    Status,
    /// Failure (terminal for the stream).
    Error,
    /// Successful completion (terminal for the stream).
    Completion,
}

impl EventKind {
    /// Returns the kind as a string (for storage and SSE event names).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Progress => "progress",
            EventKind::Status => "status",
            EventKind::Error => "error",
            EventKind::Completion => "completion",
        }
    }

    /// Returns true if delivering this event ends a subscription.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Error | EventKind::Completion)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Worker progress report.
    Progress {
        /// Percent complete (0-100).
        percent: u8,
        /// Human-readable progress message.
        message: String,
    },

    /// Status change.
    Status {
        /// The status the task moved to.
        status: TaskStatus,
        /// Optional context for the change.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Failure report.
    Error {
        /// Error message.
        error: String,
        /// Optional detail (e.g. the underlying collaborator fault).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },

    /// Successful completion, carrying the result artifact refs.
    Completion {
        /// Artifact storage keys by role.
        artifacts: BTreeMap<StorageRole, String>,
    },
}

impl EventPayload {
    /// Returns the kind of this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Progress { .. } => EventKind::Progress,
            EventPayload::Status { .. } => EventKind::Status,
            EventPayload::Error { .. } => EventKind::Error,
            EventPayload::Completion { .. } => EventKind::Completion,
        }
    }
}

/// An immutable, ordered fact about a task's progress or outcome.
///
/// Sequence numbers are assigned by the event bus at append time, are
/// strictly increasing per task and start at 1. Events are never mutated
/// or deleted while the task is live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEvent {
    /// The task this event belongs to.
    pub task_id: String,
    /// Position in the task's event log (starts at 1).
    pub sequence: u64,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub payload: EventPayload,
    /// When the event was appended.
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Returns true if this event ends a subscription.
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kinds() {
        let progress = EventPayload::Progress {
            percent: 40,
            message: "extracting tables".to_string(),
        };
        assert_eq!(progress.kind(), EventKind::Progress);
        assert!(!progress.kind().is_terminal());

        let completion = EventPayload::Completion {
            artifacts: BTreeMap::new(),
        };
        assert_eq!(completion.kind(), EventKind::Completion);
        assert!(completion.kind().is_terminal());

        let error = EventPayload::Error {
            error: "boom".to_string(),
            details: None,
        };
        assert!(error.kind().is_terminal());
    }

    #[test]
    fn test_event_serialization_flattens_payload() {
        let event = TaskEvent {
            task_id: "t-1".to_string(),
            sequence: 3,
            payload: EventPayload::Progress {
                percent: 75,
                message: "almost done".to_string(),
            },
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"progress""#));
        assert!(json.contains(r#""sequence":3"#));
        assert!(json.contains(r#""percent":75"#));

        let parsed: TaskEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_status_payload_serialization() {
        let payload = EventPayload::Status {
            status: TaskStatus::Processing,
            message: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"kind":"status","status":"processing"}"#);

        let parsed: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_completion_payload_carries_artifacts() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            StorageRole::OddsPathParquet,
            "parquets/odds_path_report.parquet".to_string(),
        );

        let payload = EventPayload::Completion { artifacts };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("odds_path_parquet"));

        let parsed: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind(), EventKind::Completion);
    }
}
