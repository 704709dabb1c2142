//! Amazon S3 object store provider.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, Error as S3Error, ObjectIdentifier};
use aws_sdk_s3::Client;

use crate::backend::{Blob, ObjectStore, ObjectStoreError};
use crate::config::{StorageConfig, DEFAULT_CONTENT_TYPE};

/// [`ObjectStore`] backed by one S3 bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS environment plus `config`'s
    /// endpoint override and addressing style.
    pub async fn connect(config: &StorageConfig) -> Self {
        let shared = aws_config::load_from_env().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.force_path_style);

        tracing::info!(
            bucket = %config.bucket,
            endpoint = config.endpoint.as_deref().unwrap_or("aws-default"),
            "S3 client configured",
        );

        Self::new(Client::from_conf(builder.build()), config.bucket.clone())
    }
}

fn request_error(err: impl std::error::Error) -> ObjectStoreError {
    ObjectStoreError::Request(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Blob, ObjectStoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    request_error(err)
                }
            })?;

        let content_type = output
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        // Drain the body inside the attempt so a dropped stream is retried too.
        let bytes = output
            .body
            .collect()
            .await
            .map_err(request_error)?
            .into_bytes()
            .to_vec();

        Ok(Blob {
            content_type,
            bytes,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(request_error)?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize, ObjectStoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(request_error)?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(request_error)?;

        // Quiet mode lists only the failures; a 200 may still carry some.
        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(request_error)?;
        batch_outcome(keys.len(), output.errors())
    }
}

/// Turn the per-key failures of a quiet `DeleteObjects` into a result.
fn batch_outcome(requested: usize, errors: &[S3Error]) -> Result<usize, ObjectStoreError> {
    if errors.is_empty() {
        return Ok(requested);
    }

    let failed = errors
        .iter()
        .map(|err| {
            format!(
                "{} ({})",
                err.key().unwrap_or("?"),
                err.code().unwrap_or("unknown"),
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    Err(ObjectStoreError::Request(format!(
        "{} of {requested} keys not deleted: {failed}",
        errors.len()
    )))
}
