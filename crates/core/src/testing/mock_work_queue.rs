//! Mock work queue for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::queue::{ExtractionRequest, QueueError, WorkQueue};

/// Mock implementation of the WorkQueue trait.
///
/// Records published requests for assertions and can simulate publish
/// failures (one-shot or permanent).
pub struct MockWorkQueue {
    published: RwLock<Vec<ExtractionRequest>>,
    next_error: RwLock<Option<QueueError>>,
    fail_always: RwLock<bool>,
}

impl Default for MockWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorkQueue {
    /// Create a new mock queue.
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            next_error: RwLock::new(None),
            fail_always: RwLock::new(false),
        }
    }

    /// All published requests, in order.
    pub async fn published(&self) -> Vec<ExtractionRequest> {
        self.published.read().await.clone()
    }

    /// Number of successfully published requests.
    pub async fn publish_count(&self) -> usize {
        self.published.read().await.len()
    }

    /// Configure the next publish to fail with the given error.
    pub async fn set_next_error(&self, error: QueueError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every publish fail (broker down).
    pub async fn set_fail_always(&self, fail: bool) {
        *self.fail_always.write().await = fail;
    }
}

#[async_trait]
impl WorkQueue for MockWorkQueue {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(&self, request: &ExtractionRequest) -> Result<(), QueueError> {
        if *self.fail_always.read().await {
            return Err(QueueError::Publish("broker unavailable".to_string()));
        }
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.published.write().await.push(request.clone());
        Ok(())
    }
}
