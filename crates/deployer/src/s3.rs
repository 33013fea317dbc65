use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use site_builder_store::storage::validate_key;
use site_builder_store::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use tracing::debug;

/// Object storage in an S3 bucket (or any S3-compatible service).
///
/// Keys are used as object keys unchanged, so a bucket serving
/// `{site}/index.html` can sit directly behind a CDN.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Client from the standard AWS environment (credentials, profile,
    /// region), with an optional region override
    pub async fn from_env(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn backend_error(operation: &str, key: &str, err: impl std::error::Error) -> StorageError {
    StorageError::Backend(format!(
        "{} '{}' failed: {}",
        operation,
        key,
        DisplayErrorContext(err)
    ))
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_key())
                {
                    return Err(StorageError::NotFound {
                        key: key.to_string(),
                    });
                }
                return Err(backend_error("GetObject", key, err));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| backend_error("GetObject body", key, e))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn write(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| backend_error("PutObject", key, e))?;
        debug!(bucket = %self.bucket, key, size, "put object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        // S3 deletes succeed for missing keys
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("DeleteObject", key, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| backend_error("ListObjectsV2", prefix, e))?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{Credentials, Region};

    fn offline_storage() -> S3Storage {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .build();
        S3Storage::new(Client::from_conf(config), "sites")
    }

    #[tokio::test]
    async fn test_invalid_keys_never_reach_the_network() {
        let storage = offline_storage();
        assert!(matches!(
            storage.read("../secret").await,
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            storage.write("/abs", vec![1], "text/plain").await,
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            storage.delete("a//b").await,
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_bucket_name() {
        assert_eq!(offline_storage().bucket(), "sites");
        assert_eq!(offline_storage().backend_name(), "s3");
    }
}
