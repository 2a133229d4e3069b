//! Mock object store for testing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::storage::{validate_component, ObjectStore, ObjectStoreError};

/// In-memory implementation of the ObjectStore trait.
///
/// Provides controllable behavior for testing:
/// - Inspect stored objects for assertions
/// - Inject a one-shot error into the next operation
pub struct MockObjectStore {
    /// Stored objects keyed by (namespace, key). BTreeMap keeps listings
    /// deterministically sorted.
    objects: RwLock<BTreeMap<(String, String), Bytes>>,
    /// If set, the next operation fails with this error.
    next_error: RwLock<Option<ObjectStoreError>>,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            next_error: RwLock::new(None),
        }
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ObjectStoreError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of stored objects across all namespaces.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// True if an object exists.
    pub async fn contains(&self, namespace: &str, key: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    async fn take_error(&self) -> Option<ObjectStoreError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, namespace: &str, key: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        validate_component(namespace)?;
        validate_component(key)?;

        self.objects
            .write()
            .await
            .insert((namespace.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.objects
            .read()
            .await
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    async fn list(
        &self,
        namespace: &str,
        prefix: &str,
    ) -> Result<Vec<String>, ObjectStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|(ns, key)| ns == namespace && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MockObjectStore::new();
        store
            .put("t-1", "pdfs/a.pdf", Bytes::from_static(b"data"))
            .await
            .unwrap();

        let bytes = store.get("t-1", "pdfs/a.pdf").await.unwrap();
        assert_eq!(&bytes[..], b"data");
        assert!(store.contains("t-1", "pdfs/a.pdf").await);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MockObjectStore::new();
        let result = store.get("t-1", "nope").await;
        assert!(matches!(result, Err(ObjectStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_prefix() {
        let store = MockObjectStore::new();
        store
            .put("t-1", "pdfs/a.pdf", Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .put("t-1", "parquets/odds_path_a.parquet", Bytes::from_static(b"p"))
            .await
            .unwrap();
        store
            .put("t-2", "pdfs/b.pdf", Bytes::from_static(b"b"))
            .await
            .unwrap();

        let keys = store.list("t-1", "pdfs/").await.unwrap();
        assert_eq!(keys, vec!["pdfs/a.pdf"]);

        let all = store.list("t-1", "").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_error_injection_is_one_shot() {
        let store = MockObjectStore::new();
        store
            .set_next_error(ObjectStoreError::Io("disk on fire".to_string()))
            .await;

        let result = store.put("t-1", "pdfs/a.pdf", Bytes::new()).await;
        assert!(matches!(result, Err(ObjectStoreError::Io(_))));

        // The error is consumed; the next call succeeds.
        store.put("t-1", "pdfs/a.pdf", Bytes::new()).await.unwrap();
    }
}
