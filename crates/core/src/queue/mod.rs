//! Work queue publisher.
//!
//! Extraction is performed by an external worker pool; the orchestrator only
//! enqueues a request per task. Delivery is assumed at-least-once, which is
//! why terminal status reports are handled idempotently.

mod nats;

pub use nats::NatsWorkQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message published to the extraction queue for one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionRequest {
    /// Task to process.
    pub task_id: String,
    /// Original document name.
    pub filename: String,
    /// Object-store key of the uploaded PDF within the task's namespace.
    pub pdf_path: String,
    /// When the request was enqueued.
    pub submitted_at: DateTime<Utc>,
}

/// Error type for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection failed: {0}")]
    Connect(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Trait for work queue backends.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Backend name (for logging).
    fn name(&self) -> &str;

    /// Enqueue a processing request. Returns once the broker has
    /// acknowledged the message.
    async fn publish(&self, request: &ExtractionRequest) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_request_serialization() {
        let request = ExtractionRequest {
            task_id: "t-1".to_string(),
            filename: "report.pdf".to_string(),
            pdf_path: "pdfs/report.pdf".to_string(),
            submitted_at: Utc::now(),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""task_id":"t-1""#));
        assert!(json.contains(r#""pdf_path":"pdfs/report.pdf""#));

        let parsed: ExtractionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }
}
