//! Per-task lock registry.
//!
//! Concurrent status reports for the *same* task must be applied in a
//! serialized, deterministic order; reports for *different* tasks proceed
//! fully in parallel. Locks are created lazily and reclaimed once the task
//! reaches a terminal state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lazily-populated registry of per-task async locks.
#[derive(Default)]
pub struct TaskLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TaskLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for a task id.
    ///
    /// The registry mutex is only held for the map lookup; callers await
    /// the returned per-task lock outside it, so unrelated tasks never
    /// block each other.
    pub fn lock_for(&self, task_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        Arc::clone(
            map.entry(task_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Drop a task's lock entry (terminal-state reclamation).
    ///
    /// In-flight holders keep their `Arc`; only the registry entry goes.
    pub fn release(&self, task_id: &str) {
        self.inner.lock().unwrap().remove(task_id);
    }

    /// Number of live lock entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// True if no locks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_returns_same_lock() {
        let locks = TaskLocks::new();
        let a = locks.lock_for("t-1");
        let b = locks.lock_for("t-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_different_ids_do_not_contend() {
        let locks = TaskLocks::new();

        // Hold t-1's lock across the whole test.
        let lock_a = locks.lock_for("t-1");
        let _guard_a = lock_a.lock().await;

        // t-2 must be acquirable immediately.
        let lock_b = locks.lock_for("t-2");
        let acquired = tokio::time::timeout(Duration::from_millis(100), lock_b.lock()).await;
        assert!(acquired.is_ok(), "t-2 lock blocked behind t-1");
    }

    #[tokio::test]
    async fn test_same_id_serializes() {
        let locks = TaskLocks::new();

        let lock = locks.lock_for("t-1");
        let guard = lock.lock().await;

        let lock_again = locks.lock_for("t-1");
        let blocked = tokio::time::timeout(Duration::from_millis(50), lock_again.lock()).await;
        assert!(blocked.is_err(), "second holder should wait");

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_millis(100), lock_again.lock()).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_release_reclaims_entry() {
        let locks = TaskLocks::new();
        locks.lock_for("t-1");
        locks.lock_for("t-2");
        assert_eq!(locks.len(), 2);

        locks.release("t-1");
        assert_eq!(locks.len(), 1);

        // Releasing an unknown id is a no-op.
        locks.release("nope");
        assert_eq!(locks.len(), 1);
    }
}
