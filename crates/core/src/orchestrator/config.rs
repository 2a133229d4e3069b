//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the task orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-subscriber live event buffer. A streaming client that falls
    /// further behind than this is disconnected with a backpressure error
    /// instead of silently missing events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

fn default_event_capacity() -> usize {
    256
}

fn default_max_document_bytes() -> usize {
    50 * 1024 * 1024 // 50 MiB
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}
