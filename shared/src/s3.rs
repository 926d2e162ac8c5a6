use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_smithy_http::byte_stream::ByteStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to put s3://{bucket}/{key}: {message}")]
    Put {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Write side of an object store. One call is one upload attempt.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        (**self).put(bucket, key, content_type, body).await
    }
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Loads credentials and region from the environment. `operation_timeout`
    /// bounds each S3 call including its internal attempts.
    pub async fn from_env(operation_timeout: Duration) -> Self {
        let aws_config = aws_config::load_from_env().await;
        let config = aws_sdk_s3::config::Builder::from(&aws_config)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(operation_timeout)
                    .build(),
            )
            .build();

        Self::new(aws_sdk_s3::Client::from_conf(config))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Keeps uploads in memory. Backs dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<Vec<StoredObject>>,
    fail_with: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every put fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            objects: Mutex::default(),
            fail_with: Some(message.into()),
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects
            .lock()
            .map(|objects| objects.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        if let Some(message) = &self.fail_with {
            return Err(StoreError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: message.clone(),
            });
        }

        let object = StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            body,
        };
        match self.objects.lock() {
            Ok(mut objects) => objects.push(object),
            Err(poisoned) => poisoned.into_inner().push(object),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_records_puts_in_order() {
        let store = MemoryStore::new();
        store
            .put("bucket", "a.csv", "text/csv", b"a".to_vec())
            .await
            .unwrap();
        store
            .put("bucket", "b.csv", "text/csv", b"b".to_vec())
            .await
            .unwrap();

        let keys: Vec<String> = store.objects().into_iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["a.csv", "b.csv"]);
    }

    #[tokio::test]
    async fn failing_store_reports_location() {
        let store = MemoryStore::failing("access denied");
        let err = store
            .put("bucket", "k.csv", "text/csv", Vec::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to put s3://bucket/k.csv: access denied"
        );
        assert!(store.objects().is_empty());
    }
}
