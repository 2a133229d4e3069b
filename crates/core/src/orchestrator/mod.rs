//! Task lifecycle orchestrator.
//!
//! The orchestrator owns the state machine
//! (`pending -> processing -> completed | failed`), appends ordered events
//! through the event bus, and coordinates the object store and work queue.
//! Per-task state is guarded by a per-task lock so reports for the same
//! task serialize while unrelated tasks proceed in parallel.

mod config;
mod locks;
mod service;
mod types;

pub use config::OrchestratorConfig;
pub use locks::TaskLocks;
pub use service::TaskOrchestrator;
pub use types::{
    FileCategory, FileStructure, OrchestratorError, StatusReport, TaskData, TaskDataKind,
};
