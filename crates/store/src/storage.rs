use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object '{key}' not found")]
    NotFound { key: String },

    #[error("Invalid storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("IO error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<StorageError> for site_builder_core::Error {
    fn from(err: StorageError) -> Self {
        site_builder_core::Error::Storage(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Listing entry returned by [`ObjectStorage::list`]
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Key/value object storage holding documents, published pages and assets.
///
/// Writes are whole-object overwrites, so repeating one is always safe.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Backend identifier for logs
    fn backend_name(&self) -> &'static str;

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn write(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Objects whose key starts with `prefix`, sorted by key
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.read(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Reject keys that could escape a storage root
pub fn validate_key(key: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(invalid("keys are relative and '/'-separated"));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(invalid("empty or relative path segment"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    modified: DateTime<Utc>,
}

/// Process-local storage for tests and throwaway previews
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for an object
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn write(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| ObjectInfo {
                key: k.clone(),
                size: o.bytes.len() as u64,
                last_modified: Some(o.modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("example.com/_builder/site.json").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("example.com/../secret").is_err());
        assert!(validate_key("example.com//index.html").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .write("site/index.html", b"<html>".to_vec(), "text/html")
            .await
            .unwrap();

        assert_eq!(storage.read("site/index.html").await.unwrap(), b"<html>");
        assert_eq!(
            storage.content_type("site/index.html").await.as_deref(),
            Some("text/html")
        );
        assert!(storage.exists("site/index.html").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read("site/missing.json").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!storage.exists("site/missing.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_delete_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.write("site/a.html", vec![1], "text/html").await.unwrap();
        storage.delete("site/a.html").await.unwrap();
        storage.delete("site/a.html").await.unwrap();
        assert!(!storage.exists("site/a.html").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_list_by_prefix() {
        let storage = MemoryStorage::new();
        for key in ["a/x.json", "a/y.json", "ab/z.json", "b/w.json"] {
            storage.write(key, vec![0; 3], "application/json").await.unwrap();
        }

        let keys: Vec<String> = storage
            .list("a/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/x.json", "a/y.json"]);
    }
}
