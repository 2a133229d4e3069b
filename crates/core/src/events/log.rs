//! Durable per-task event log.
//!
//! The log is append-only for the life of a task. Retention/eviction of
//! terminal tasks' logs is a deployment policy; `prune` is the hook for it.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use super::{EventPayload, TaskEvent};

/// Error type for event log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Trait for durable event log backends.
pub trait EventLog: Send + Sync {
    /// Append an event. The caller (the event bus) assigns the sequence.
    fn append(&self, event: &TaskEvent) -> Result<(), EventLogError>;

    /// Full history for a task, sequence ascending. Idempotent.
    fn history(&self, task_id: &str) -> Result<Vec<TaskEvent>, EventLogError>;

    /// Highest sequence recorded for a task (0 if none).
    fn last_sequence(&self, task_id: &str) -> Result<u64, EventLogError>;

    /// Discard a task's history. Returns the number of events removed.
    fn prune(&self, task_id: &str) -> Result<usize, EventLogError>;
}

/// SQLite-backed event log.
pub struct SqliteEventLog {
    conn: Mutex<Connection>,
}

impl SqliteEventLog {
    /// Create a new SQLite event log, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, EventLogError> {
        let conn = Connection::open(path).map_err(|e| EventLogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite event log (useful for testing).
    pub fn in_memory() -> Result<Self, EventLogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| EventLogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), EventLogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS task_events (
                task_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (task_id, sequence)
            );

            CREATE INDEX IF NOT EXISTS idx_task_events_kind ON task_events(task_id, kind);
            "#,
        )
        .map_err(|e| EventLogError::Database(e.to_string()))?;

        Ok(())
    }
}

impl EventLog for SqliteEventLog {
    fn append(&self, event: &TaskEvent) -> Result<(), EventLogError> {
        let conn = self.conn.lock().unwrap();

        let payload_json = serde_json::to_string(&event.payload)
            .map_err(|e| EventLogError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO task_events (task_id, sequence, kind, payload, timestamp) VALUES (?, ?, ?, ?, ?)",
            params![
                event.task_id,
                event.sequence as i64,
                event.kind().as_str(),
                payload_json,
                event.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| EventLogError::Database(e.to_string()))?;

        Ok(())
    }

    fn history(&self, task_id: &str) -> Result<Vec<TaskEvent>, EventLogError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT sequence, payload, timestamp FROM task_events WHERE task_id = ? ORDER BY sequence ASC",
            )
            .map_err(|e| EventLogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![task_id], |row| {
                let sequence: i64 = row.get(0)?;
                let payload_json: String = row.get(1)?;
                let timestamp_str: String = row.get(2)?;
                Ok((sequence, payload_json, timestamp_str))
            })
            .map_err(|e| EventLogError::Database(e.to_string()))?;

        let mut events = Vec::new();
        for row_result in rows {
            let (sequence, payload_json, timestamp_str) =
                row_result.map_err(|e| EventLogError::Database(e.to_string()))?;

            let payload: EventPayload = serde_json::from_str(&payload_json)
                .map_err(|e| EventLogError::Serialization(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| EventLogError::Database(format!("invalid timestamp: {}", e)))?
                .into();

            events.push(TaskEvent {
                task_id: task_id.to_string(),
                sequence: sequence as u64,
                payload,
                timestamp,
            });
        }

        Ok(events)
    }

    fn last_sequence(&self, task_id: &str) -> Result<u64, EventLogError> {
        let conn = self.conn.lock().unwrap();

        let last: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sequence), 0) FROM task_events WHERE task_id = ?",
                params![task_id],
                |row| row.get(0),
            )
            .map_err(|e| EventLogError::Database(e.to_string()))?;

        Ok(last as u64)
    }

    fn prune(&self, task_id: &str) -> Result<usize, EventLogError> {
        let conn = self.conn.lock().unwrap();

        conn.execute("DELETE FROM task_events WHERE task_id = ?", params![task_id])
            .map_err(|e| EventLogError::Database(e.to_string()))
    }
}
