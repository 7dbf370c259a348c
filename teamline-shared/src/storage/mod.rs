/// Object storage
///
/// Attachments live in an S3-compatible object store (MinIO in
/// development). The store is reached through the [`ObjectStore`]
/// trait; [`s3::S3ObjectStore`] implements it with SigV4-signed
/// requests and query-signed presigned download URLs, so no storage
/// SDK is needed.

pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use s3::{S3Config, S3ObjectStore};

/// Object-store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store rejected the request
    #[error("Object store returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Transport-level failure
    #[error("Object store request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Transport(err.to_string())
    }
}

/// Blob operations Teamline needs from the object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores an object under the given key
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Issues a time-limited download URL for an object
    async fn presigned_get_url(&self, key: &str) -> Result<String, StorageError>;

    /// Removes an object
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}
