//! Object store trait and types.
//!
//! The content store is external (S3/MinIO-shaped); the core only needs a
//! narrow per-task namespace of keys. Keys are grouped under the `pdfs/`,
//! `parquets/` and `others/` prefixes within a task's namespace.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Key prefix for uploaded source documents.
pub const PDF_PREFIX: &str = "pdfs/";

/// Key prefix for result artifacts.
pub const PARQUET_PREFIX: &str = "parquets/";

/// Error type for object store operations.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// Object absent.
    #[error("object not found: {namespace}/{key}")]
    NotFound { namespace: String, key: String },

    /// Namespace or key is malformed (empty, absolute, or traversing).
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Transient backend fault; propagated, not retried by the core.
    #[error("object store error: {0}")]
    Io(String),
}

/// Trait for object storage backends, namespaced per task.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `namespace/key`, overwriting any existing one.
    async fn put(&self, namespace: &str, key: &str, bytes: Bytes) -> Result<(), ObjectStoreError>;

    /// Fetch an object. Fails with `NotFound` if absent.
    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError>;

    /// List keys in a namespace matching the prefix, sorted. An empty
    /// prefix lists the whole namespace.
    async fn list(&self, namespace: &str, prefix: &str)
        -> Result<Vec<String>, ObjectStoreError>;
}

/// Validate a namespace or key component.
///
/// Rejects empty values, absolute paths and parent-directory traversal so a
/// filesystem-backed store can never be walked out of its root.
pub fn validate_component(value: &str) -> Result<(), ObjectStoreError> {
    if value.is_empty() {
        return Err(ObjectStoreError::InvalidKey("empty".to_string()));
    }
    if value.starts_with('/') || value.starts_with('\\') {
        return Err(ObjectStoreError::InvalidKey(value.to_string()));
    }
    if value.split(['/', '\\']).any(|part| part == "..") {
        return Err(ObjectStoreError::InvalidKey(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_component_accepts_nested_keys() {
        assert!(validate_component("pdfs/report.pdf").is_ok());
        assert!(validate_component("parquets/odds_path_report.parquet").is_ok());
        assert!(validate_component("a1b2c3").is_ok());
    }

    #[test]
    fn test_validate_component_rejects_traversal() {
        assert!(validate_component("").is_err());
        assert!(validate_component("/etc/passwd").is_err());
        assert!(validate_component("../secrets").is_err());
        assert!(validate_component("pdfs/../../x").is_err());
    }
}
