//! Blob storage for résumé uploads.
//!
//! - [`backend`] -- the [`ObjectStore`] seam implemented by each provider.
//! - [`s3`] -- Amazon S3 (or S3-compatible) provider.
//! - [`memory`] -- in-process provider for local runs and tests.
//! - [`gateway`] -- retry-wrapped [`BlobStore`] used by the application.

pub mod backend;
pub mod config;
pub mod gateway;
pub mod memory;
pub mod s3;

pub use backend::{Blob, ObjectStore, ObjectStoreError};
pub use config::StorageConfig;
pub use gateway::BlobStore;
