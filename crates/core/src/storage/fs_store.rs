//! Filesystem-backed object store implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{validate_component, ObjectStore, ObjectStoreError};

/// Object store rooted at a local directory.
///
/// Layout: `<root>/<namespace>/<key>`, where keys may contain `/` to form
/// the `pdfs/`, `parquets/` and `others/` groups.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ObjectStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, namespace: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_component(namespace)?;
        validate_component(key)?;
        Ok(self.root.join(namespace).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, namespace: &str, key: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let path = self.resolve(namespace, key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        }

        fs::write(&path, &bytes)
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.resolve(namespace, key)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(ObjectStoreError::Io(e.to_string())),
        }
    }

    async fn list(
        &self,
        namespace: &str,
        prefix: &str,
    ) -> Result<Vec<String>, ObjectStoreError> {
        validate_component(namespace)?;
        let base = self.root.join(namespace);

        if !base.exists() {
            return Ok(Vec::new());
        }

        // Iterative walk; async recursion is not worth the boxing here.
        let mut keys = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| ObjectStoreError::Io(e.to_string()))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ObjectStoreError::Io(e.to_string()))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }

                let key = path
                    .strip_prefix(&base)
                    .map_err(|e| ObjectStoreError::Io(e.to_string()))?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PARQUET_PREFIX, PDF_PREFIX};

    fn create_test_store() -> (FsObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("objects")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (store, _dir) = create_test_store();

        store
            .put("t-1", "pdfs/report.pdf", Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        let bytes = store.get("t-1", "pdfs/report.pdf").await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (store, _dir) = create_test_store();

        let result = store.get("t-1", "pdfs/missing.pdf").await;
        assert!(matches!(result, Err(ObjectStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (store, _dir) = create_test_store();

        store
            .put("t-1", "pdfs/a.pdf", Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .put("t-1", "pdfs/a.pdf", Bytes::from_static(b"two"))
            .await
            .unwrap();

        let bytes = store.get("t-1", "pdfs/a.pdf").await.unwrap();
        assert_eq!(&bytes[..], b"two");
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (store, _dir) = create_test_store();

        store
            .put("t-1", "pdfs/report.pdf", Bytes::from_static(b"pdf"))
            .await
            .unwrap();
        store
            .put(
                "t-1",
                "parquets/odds_path_report.parquet",
                Bytes::from_static(b"pq"),
            )
            .await
            .unwrap();
        store
            .put("t-1", "others/notes.txt", Bytes::from_static(b"n"))
            .await
            .unwrap();

        let pdfs = store.list("t-1", PDF_PREFIX).await.unwrap();
        assert_eq!(pdfs, vec!["pdfs/report.pdf"]);

        let parquets = store.list("t-1", PARQUET_PREFIX).await.unwrap();
        assert_eq!(parquets, vec!["parquets/odds_path_report.parquet"]);

        let all = store.list("t-1", "").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_list_unknown_namespace_is_empty() {
        let (store, _dir) = create_test_store();
        assert!(store.list("nope", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let (store, _dir) = create_test_store();

        store
            .put("t-1", "pdfs/a.pdf", Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .put("t-2", "pdfs/b.pdf", Bytes::from_static(b"b"))
            .await
            .unwrap();

        assert_eq!(store.list("t-1", "").await.unwrap(), vec!["pdfs/a.pdf"]);
        assert_eq!(store.list("t-2", "").await.unwrap(), vec!["pdfs/b.pdf"]);
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (store, _dir) = create_test_store();

        let result = store
            .put("t-1", "../escape.pdf", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));

        let result = store.get("..", "pdfs/a.pdf").await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));
    }
}
