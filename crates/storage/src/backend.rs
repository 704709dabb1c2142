//! Provider-neutral object storage interface.

use async_trait::async_trait;

/// Error type for a single object-store request.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The key does not exist in the bucket.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The request failed (network, throttling, provider fault).
    #[error("object store request failed: {0}")]
    Request(String),
}

impl ObjectStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

/// A stored object with its content-type metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Bucket-scoped object storage.
///
/// Implementations make one provider request per call; retrying is the
/// gateway's job.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn get_object(&self, key: &str) -> Result<Blob, ObjectStoreError>;

    /// Remove a key. Providers may treat a missing key as success.
    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Keys from a single listing page (not every key in large buckets).
    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError>;

    /// Remove several keys in one batch request and return how many went
    /// away. Any key the provider refuses fails the whole call with
    /// [`ObjectStoreError::Request`]; the others may already be gone.
    async fn delete_keys(&self, keys: &[String]) -> Result<usize, ObjectStoreError>;
}
