/// Default object key extension for stored résumés.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Default content type recorded with each object.
pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// Blob storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket that holds every blob.
    pub bucket: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    pub endpoint: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    pub force_path_style: bool,
    /// Extension appended to generated keys.
    pub extension: String,
    /// Content type stored with each object.
    pub content_type: String,
}

impl StorageConfig {
    /// Load storage configuration from environment variables.
    ///
    /// | Env Var               | Required | Default           |
    /// |-----------------------|----------|-------------------|
    /// | `S3_BUCKET`           | **yes**  | --                |
    /// | `S3_ENDPOINT`         | no       | AWS default       |
    /// | `S3_FORCE_PATH_STYLE` | no       | `false`           |
    /// | `BLOB_EXTENSION`      | no       | `pdf`             |
    /// | `BLOB_CONTENT_TYPE`   | no       | `application/pdf` |
    ///
    /// Region and credentials come from the standard AWS environment.
    ///
    /// # Panics
    ///
    /// Panics if `S3_BUCKET` is not set or `S3_FORCE_PATH_STYLE` is not a bool.
    pub fn from_env() -> Self {
        let bucket = std::env::var("S3_BUCKET").expect("S3_BUCKET must be set in the environment");

        let endpoint = std::env::var("S3_ENDPOINT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let force_path_style: bool = std::env::var("S3_FORCE_PATH_STYLE")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("S3_FORCE_PATH_STYLE must be true or false");

        let extension =
            std::env::var("BLOB_EXTENSION").unwrap_or_else(|_| DEFAULT_EXTENSION.into());
        let content_type =
            std::env::var("BLOB_CONTENT_TYPE").unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.into());

        Self {
            bucket,
            endpoint,
            force_path_style,
            extension,
            content_type,
        }
    }
}
