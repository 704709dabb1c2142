//! Retry-wrapped blob storage gateway.

use std::sync::Arc;

use uuid::Uuid;

use jobtrail_core::environment::AppEnvironment;
use jobtrail_core::error::CoreError;
use jobtrail_core::retry::{retry_if, RetryError, RetryPolicy};

use crate::backend::{Blob, ObjectStore, ObjectStoreError};
use crate::config::{StorageConfig, DEFAULT_CONTENT_TYPE, DEFAULT_EXTENSION};

/// Stores opaque blobs under generated keys.
///
/// Every provider call goes through the shared retry policy. A missing key
/// is reported as `CoreError::NotFound` straight away; only request faults
/// are retried.
#[derive(Clone)]
pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
    environment: AppEnvironment,
    extension: String,
    content_type: String,
}

impl BlobStore {
    /// Gateway storing `application/pdf` blobs under `<uuid>.pdf` keys.
    pub fn new(store: Arc<dyn ObjectStore>, policy: RetryPolicy, environment: AppEnvironment) -> Self {
        Self {
            store,
            policy,
            environment,
            extension: DEFAULT_EXTENSION.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    /// Gateway using the key extension and content type from `config`.
    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        policy: RetryPolicy,
        environment: AppEnvironment,
        config: &StorageConfig,
    ) -> Self {
        Self::new(store, policy, environment).with_format(&config.extension, &config.content_type)
    }

    pub fn with_format(mut self, extension: &str, content_type: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self.content_type = content_type.to_string();
        self
    }

    /// Store `bytes` under a fresh `<uuid>.<extension>` key and return the key.
    pub async fn put(&self, bytes: &[u8]) -> Result<String, CoreError> {
        let key = format!("{}.{}", Uuid::new_v4(), self.extension);
        let store = self.store.as_ref();
        let (key_ref, content_type) = (key.as_str(), self.content_type.as_str());

        retry_if(
            &self.policy,
            "blob put",
            move || store.put_object(key_ref, bytes, content_type),
            ObjectStoreError::is_transient,
        )
        .await
        .map_err(|err| map_error("put", key_ref, err))?;

        tracing::debug!(key = %key, size = bytes.len(), "Blob stored");
        Ok(key)
    }

    /// Fetch a blob and its content type.
    pub async fn get(&self, key: &str) -> Result<Blob, CoreError> {
        let store = self.store.as_ref();
        retry_if(
            &self.policy,
            "blob get",
            move || store.get_object(key),
            ObjectStoreError::is_transient,
        )
        .await
        .map_err(|err| map_error("get", key, err))
    }

    /// Delete a blob. Whether a missing key errors depends on the provider.
    pub async fn delete(&self, key: &str) -> Result<(), CoreError> {
        let store = self.store.as_ref();
        retry_if(
            &self.policy,
            "blob delete",
            move || store.delete_object(key),
            ObjectStoreError::is_transient,
        )
        .await
        .map_err(|err| map_error("delete", key, err))?;

        tracing::debug!(key, "Blob deleted");
        Ok(())
    }

    /// Delete every key returned by one listing page. Test environment only.
    ///
    /// Not pagination-safe: a bucket holding more keys than one listing
    /// page is only partially emptied. Not safe to run concurrently against
    /// the same bucket either; callers serialize it.
    pub async fn empty_all(&self) -> Result<usize, CoreError> {
        if !self.environment.is_test() {
            tracing::warn!(environment = ?self.environment, "Refusing bulk blob deletion");
            return Err(CoreError::Forbidden(
                "Bulk blob deletion is only permitted in the test environment".into(),
            ));
        }

        let store = self.store.as_ref();
        let keys = retry_if(
            &self.policy,
            "blob list",
            move || store.list_keys(),
            ObjectStoreError::is_transient,
        )
        .await
        .map_err(|err| map_error("list", "*", err))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let batch = keys.as_slice();
        let deleted = retry_if(
            &self.policy,
            "blob bulk delete",
            move || store.delete_keys(batch),
            ObjectStoreError::is_transient,
        )
        .await
        .map_err(|err| map_error("bulk delete", "*", err))?;

        tracing::info!(count = deleted, "Emptied blob bucket");
        Ok(deleted)
    }
}

fn map_error(operation: &str, key: &str, err: RetryError<ObjectStoreError>) -> CoreError {
    match err {
        RetryError::Permanent {
            error: ObjectStoreError::NotFound(_),
            ..
        } => CoreError::NotFound {
            entity: "blob",
            id: key.to_string(),
        },
        other => {
            tracing::error!(
                operation,
                key,
                attempts = other.attempts(),
                error = %other.error(),
                "Blob storage unavailable",
            );
            CoreError::Infrastructure {
                resource: "blob storage",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::MemoryObjectStore;

    fn gateway(store: Arc<MemoryObjectStore>, environment: AppEnvironment) -> BlobStore {
        BlobStore::new(
            store,
            RetryPolicy::fixed(3, Duration::from_millis(1)).unwrap(),
            environment,
        )
    }

    #[tokio::test]
    async fn put_returns_uuid_key_with_extension() {
        let store = Arc::new(MemoryObjectStore::new());
        let blobs = gateway(store.clone(), AppEnvironment::Test);

        let key = blobs.put(b"%PDF-1.7 resume").await.unwrap();

        let stem = key.strip_suffix(".pdf").expect("key should end with .pdf");
        assert!(Uuid::parse_str(stem).is_ok(), "key stem should be a UUID: {key}");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_returns_stored_bytes_and_content_type() {
        let blobs = gateway(Arc::new(MemoryObjectStore::new()), AppEnvironment::Test);
        let payload = b"%PDF-1.7 resume body".to_vec();

        let key = blobs.put(&payload).await.unwrap();
        let blob = blobs.get(&key).await.unwrap();

        assert_eq!(blob.bytes, payload);
        assert_eq!(blob.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn get_after_delete_is_not_found() {
        let store = Arc::new(MemoryObjectStore::new());
        let blobs = gateway(store.clone(), AppEnvironment::Test);
        let key = blobs.put(b"bytes").await.unwrap();

        blobs.delete(&key).await.unwrap();
        let calls_before = store.calls();
        let err = blobs.get(&key).await.unwrap_err();

        assert_matches!(err, CoreError::NotFound { entity: "blob", ref id } if *id == key);
        assert_eq!(store.calls() - calls_before, 1, "not-found is not retried");
    }

    #[tokio::test]
    async fn custom_format_applies_to_key_and_metadata() {
        let blobs = gateway(Arc::new(MemoryObjectStore::new()), AppEnvironment::Test)
            .with_format(".docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document");

        let key = blobs.put(b"doc").await.unwrap();

        assert!(key.ends_with(".docx"));
        assert!(blobs.get(&key).await.unwrap().content_type.contains("wordprocessingml"));
    }

    #[tokio::test]
    async fn transient_faults_are_retried() {
        let store = Arc::new(MemoryObjectStore::new());
        let blobs = gateway(store.clone(), AppEnvironment::Test);

        store.fail_next(2);
        let key = blobs.put(b"bytes").await.unwrap();

        assert_eq!(store.calls(), 3);
        assert_eq!(blobs.get(&key).await.unwrap().bytes, b"bytes");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_infrastructure_error() {
        let store = Arc::new(MemoryObjectStore::new());
        let blobs = gateway(store.clone(), AppEnvironment::Test);

        store.fail_next(3);
        let err = blobs.put(b"bytes").await.unwrap_err();

        assert_eq!(store.calls(), 3);
        assert_matches!(err, CoreError::Infrastructure { resource: "blob storage" });
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_all_clears_bucket_in_test_environment() {
        let store = Arc::new(MemoryObjectStore::new());
        let blobs = gateway(store.clone(), AppEnvironment::Test);
        for _ in 0..3 {
            blobs.put(b"x").await.unwrap();
        }

        assert_eq!(blobs.empty_all().await.unwrap(), 3);
        assert!(store.is_empty());
        assert_eq!(blobs.empty_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_all_refused_outside_test_environment() {
        for environment in [AppEnvironment::Production, AppEnvironment::Development] {
            let store = Arc::new(MemoryObjectStore::new());
            let blobs = gateway(store.clone(), environment);
            blobs.put(b"keep me").await.unwrap();
            let calls_before = store.calls();

            let err = blobs.empty_all().await.unwrap_err();

            assert_matches!(err, CoreError::Forbidden(_));
            assert_eq!(store.len(), 1);
            assert_eq!(store.calls(), calls_before, "no provider call may be made");
        }
    }

    #[tokio::test]
    async fn empty_all_fails_when_a_key_cannot_be_deleted() {
        let store = Arc::new(MemoryObjectStore::new());
        let blobs = gateway(store.clone(), AppEnvironment::Test);
        let stuck = blobs.put(b"stuck").await.unwrap();
        blobs.put(b"x").await.unwrap();
        blobs.put(b"y").await.unwrap();
        store.lock_key(&stuck);
        let calls_before = store.calls();

        let err = blobs.empty_all().await.unwrap_err();

        assert_matches!(err, CoreError::Infrastructure { resource: "blob storage" });
        assert_eq!(store.len(), 1);
        assert_eq!(blobs.get(&stuck).await.unwrap().bytes, b"stuck");
        // One listing plus three bulk-delete attempts, then the fetch.
        assert_eq!(store.calls() - calls_before, 5);
    }

    #[tokio::test]
    async fn empty_all_only_clears_one_listing_page() {
        let store = Arc::new(MemoryObjectStore::with_page_size(2));
        let blobs = gateway(store.clone(), AppEnvironment::Test);
        for _ in 0..5 {
            blobs.put(b"x").await.unwrap();
        }

        assert_eq!(blobs.empty_all().await.unwrap(), 2);
        assert_eq!(store.len(), 3);
    }
}
