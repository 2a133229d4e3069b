use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub objects: ObjectStoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8084
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared key, required when method = "api_key".
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration (task records and event log)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("scrivano.db")
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    /// Root directory for the filesystem-backed store.
    #[serde(default = "default_objects_root")]
    pub root: PathBuf,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: default_objects_root(),
        }
    }
}

fn default_objects_root() -> PathBuf {
    PathBuf::from("data/objects")
}

/// Work queue (NATS JetStream) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// NATS server URLs.
    #[serde(default = "default_queue_urls")]
    pub urls: Vec<String>,
    /// Subject extraction requests are published to.
    #[serde(default = "default_queue_subject")]
    pub subject: String,
    /// JetStream stream backing the subject.
    #[serde(default = "default_queue_stream")]
    pub stream: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_queue_timeout")]
    pub connection_timeout_secs: u64,
    /// Client connection name.
    #[serde(default = "default_queue_client_name")]
    pub client_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            urls: default_queue_urls(),
            subject: default_queue_subject(),
            stream: default_queue_stream(),
            connection_timeout_secs: default_queue_timeout(),
            client_name: default_queue_client_name(),
        }
    }
}

fn default_queue_urls() -> Vec<String> {
    vec!["nats://localhost:4222".to_string()]
}

fn default_queue_subject() -> String {
    "scrivano.tasks.extract".to_string()
}

fn default_queue_stream() -> String {
    "SCRIVANO_TASKS".to_string()
}

fn default_queue_timeout() -> u64 {
    5
}

fn default_queue_client_name() -> String {
    "scrivano-server".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub objects: ObjectStoreConfig,
    pub queue: SanitizedQueueConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

/// Sanitized queue config (credentials in URLs are a deployment concern,
/// the URLs themselves are not secret here)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQueueConfig {
    pub urls: Vec<String>,
    pub subject: String,
    pub stream: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|key| !key.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            objects: config.objects.clone(),
            queue: SanitizedQueueConfig {
                urls: config.queue.urls.clone(),
                subject: config.queue.subject.clone(),
                stream: config.queue.stream.clone(),
            },
            orchestrator: config.orchestrator.clone(),
        }
    }
}
