//! SQLite-backed task store implementation.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{NewTask, StorageRole, Task, TaskError, TaskStatus, TaskStore, TaskUpdate};

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Create a new SQLite task store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                processing_started_at TEXT,
                completed_at TEXT,
                storage_refs TEXT NOT NULL,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            "#,
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let id: String = row.get(0)?;
        let filename: String = row.get(1)?;
        let status_str: String = row.get(2)?;
        let created_at_str: String = row.get(3)?;
        let updated_at_str: String = row.get(4)?;
        let processing_started_at_str: Option<String> = row.get(5)?;
        let completed_at_str: Option<String> = row.get(6)?;
        let storage_refs_json: String = row.get(7)?;
        let error_message: Option<String> = row.get(8)?;

        let status = TaskStatus::parse(&status_str).unwrap_or(TaskStatus::Pending);

        // Parse timestamps - use now() if parsing fails (shouldn't happen with valid data)
        let created_at = parse_timestamp(&created_at_str).unwrap_or_else(Utc::now);
        let updated_at = parse_timestamp(&updated_at_str).unwrap_or_else(Utc::now);
        let processing_started_at = processing_started_at_str.and_then(|s| parse_timestamp(&s));
        let completed_at = completed_at_str.and_then(|s| parse_timestamp(&s));

        let storage_refs: BTreeMap<StorageRole, String> =
            serde_json::from_str(&storage_refs_json).unwrap_or_default();

        Ok(Task {
            id,
            filename,
            status,
            created_at,
            updated_at,
            processing_started_at,
            completed_at,
            storage_refs,
            error_message,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Task, TaskError> {
        let result = conn.query_row(
            "SELECT id, filename, status, created_at, updated_at, processing_started_at, completed_at, storage_refs, error_message FROM tasks WHERE id = ?",
            params![id],
            Self::row_to_task,
        );

        match result {
            Ok(task) => Ok(task),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(TaskError::NotFound(id.to_string())),
            Err(e) => Err(TaskError::Database(e.to_string())),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, request: NewTask) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let status = TaskStatus::Pending;

        let storage_refs_json = serde_json::to_string(&request.storage_refs)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO tasks (id, filename, status, created_at, updated_at, storage_refs) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                request.id,
                request.filename,
                status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
                storage_refs_json,
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(Task {
            id: request.id,
            filename: request.filename,
            status,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            completed_at: None,
            storage_refs: request.storage_refs,
            error_message: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        match Self::fetch(&conn, id) {
            Ok(task) => Ok(Some(task)),
            Err(TaskError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn update(&self, id: &str, update: TaskUpdate) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let mut task = Self::fetch(&conn, id)?;

        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(at) = update.processing_started_at {
            task.processing_started_at = Some(at);
        }
        if let Some(at) = update.completed_at {
            task.completed_at = Some(at);
        }
        if let Some(message) = update.error_message {
            task.error_message = Some(message);
        }
        for (role, key) in update.storage_refs {
            task.storage_refs.insert(role, key);
        }
        task.updated_at = Utc::now();

        let storage_refs_json = serde_json::to_string(&task.storage_refs)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE tasks SET status = ?, updated_at = ?, processing_started_at = ?, completed_at = ?, storage_refs = ?, error_message = ? WHERE id = ?",
            params![
                task.status.as_str(),
                task.updated_at.to_rfc3339(),
                task.processing_started_at.map(|t| t.to_rfc3339()),
                task.completed_at.map(|t| t.to_rfc3339()),
                storage_refs_json,
                task.error_message,
                id,
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(task)
    }

    fn list_active(&self) -> Result<Vec<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, filename, status, created_at, updated_at, processing_started_at, completed_at, storage_refs, error_message FROM tasks ORDER BY created_at DESC, id DESC",
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_task)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row_result in rows {
            let task = row_result.map_err(|e| TaskError::Database(e.to_string()))?;
            tasks.push(task);
        }

        Ok(tasks)
    }

    fn delete(&self, id: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let task = Self::fetch(&conn, id)?;

        conn.execute("DELETE FROM tasks WHERE id = ?", params![id])
            .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteTaskStore {
        SqliteTaskStore::in_memory().unwrap()
    }

    fn create_test_request(id: &str) -> NewTask {
        let mut storage_refs = BTreeMap::new();
        storage_refs.insert(StorageRole::Pdf, format!("pdfs/{}.pdf", id));
        NewTask {
            id: id.to_string(),
            filename: format!("{}.pdf", id),
            storage_refs,
        }
    }

    #[test]
    fn test_create_task() {
        let store = create_test_store();
        let task = store.create(create_test_request("t-1")).unwrap();

        assert_eq!(task.id, "t-1");
        assert_eq!(task.filename, "t-1.pdf");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.storage_ref(StorageRole::Pdf), Some("pdfs/t-1.pdf"));
        assert!(task.processing_started_at.is_none());
        assert!(task.error_message.is_none());
    }

    #[test]
    fn test_get_task() {
        let store = create_test_store();
        let created = store.create(create_test_request("t-1")).unwrap();

        let fetched = store.get("t-1").unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.status, TaskStatus::Pending);
        assert_eq!(fetched.storage_refs, created.storage_refs);
    }

    #[test]
    fn test_get_nonexistent_task() {
        let store = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_status_and_timestamps() {
        let store = create_test_store();
        store.create(create_test_request("t-1")).unwrap();

        let started = Utc::now();
        let updated = store
            .update(
                "t-1",
                TaskUpdate::new()
                    .with_status(TaskStatus::Processing)
                    .with_processing_started_at(started),
            )
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Processing);
        assert!(updated.processing_started_at.is_some());

        // Verify persistence.
        let fetched = store.get("t-1").unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Processing);
        assert!(fetched.processing_started_at.is_some());
    }

    #[test]
    fn test_update_merges_storage_refs() {
        let store = create_test_store();
        store.create(create_test_request("t-1")).unwrap();

        let updated = store
            .update(
                "t-1",
                TaskUpdate::new()
                    .with_storage_ref(
                        StorageRole::OddsPathParquet,
                        "parquets/odds_path_t-1.parquet",
                    )
                    .with_storage_ref(
                        StorageRole::ExplanationsParquet,
                        "parquets/explanations_t-1.parquet",
                    ),
            )
            .unwrap();

        // Original pdf ref is preserved.
        assert_eq!(updated.storage_refs.len(), 3);
        assert_eq!(updated.storage_ref(StorageRole::Pdf), Some("pdfs/t-1.pdf"));
        assert_eq!(
            updated.storage_ref(StorageRole::OddsPathParquet),
            Some("parquets/odds_path_t-1.parquet")
        );
    }

    #[test]
    fn test_update_error_message() {
        let store = create_test_store();
        store.create(create_test_request("t-1")).unwrap();

        let updated = store
            .update(
                "t-1",
                TaskUpdate::new()
                    .with_status(TaskStatus::Failed)
                    .with_completed_at(Utc::now())
                    .with_error_message("worker crashed"),
            )
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Failed);
        assert_eq!(updated.error_message.as_deref(), Some("worker crashed"));
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn test_update_nonexistent_task() {
        let store = create_test_store();
        let result = store.update("nope", TaskUpdate::new().with_status(TaskStatus::Failed));
        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }

    #[test]
    fn test_update_refreshes_updated_at() {
        let store = create_test_store();
        let created = store.create(create_test_request("t-1")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = store
            .update("t-1", TaskUpdate::new().with_status(TaskStatus::Processing))
            .unwrap();

        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn test_list_newest_first() {
        let store = create_test_store();
        for i in 0..3 {
            store.create(create_test_request(&format!("t-{}", i))).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let tasks = store.list_active().unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].id, "t-2");
        assert_eq!(tasks[2].id, "t-0");
    }

    #[test]
    fn test_delete_task() {
        let store = create_test_store();
        store.create(create_test_request("t-1")).unwrap();

        let deleted = store.delete("t-1").unwrap();
        assert_eq!(deleted.id, "t-1");
        assert!(store.get("t-1").unwrap().is_none());

        let result = store.delete("t-1");
        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("tasks.db");

        let store = SqliteTaskStore::new(&db_path).unwrap();
        store.create(create_test_request("t-1")).unwrap();

        assert!(db_path.exists());
        assert!(store.get("t-1").unwrap().is_some());
    }
}
