pub mod artifacts;
pub mod auth;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod queue;
pub mod storage;
pub mod task;
pub mod testing;

pub use artifacts::{read_rows, write_rows, ArtifactError, ColumnData};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, ObjectStoreConfig, QueueConfig, SanitizedConfig, ServerConfig,
};
pub use events::{
    EventBus, EventBusError, EventKind, EventLog, EventLogError, EventPayload, SqliteEventLog,
    Subscription, TaskEvent,
};
pub use orchestrator::{
    FileCategory, FileStructure, OrchestratorConfig, OrchestratorError, StatusReport, TaskData,
    TaskDataKind, TaskOrchestrator,
};
pub use queue::{ExtractionRequest, NatsWorkQueue, QueueError, WorkQueue};
pub use storage::{
    FsObjectStore, ObjectStore, ObjectStoreError, PARQUET_PREFIX, PDF_PREFIX,
};
pub use task::{
    NewTask, SqliteTaskStore, StorageRole, Task, TaskError, TaskStatus, TaskStore, TaskUpdate,
};
