use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageError;
use super::key::BlobKey;
use super::metadata::{BlobEntry, BlobInfo, BlobMetadata};

/// Keyed binary object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key` together with their metadata.
    async fn put(
        &self,
        key: &BlobKey,
        data: &[u8],
        metadata: &BlobMetadata,
    ) -> Result<(), StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>, StorageError>;

    /// Fetch size and metadata without the payload.
    async fn head(&self, key: &BlobKey) -> Result<BlobInfo, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError>;

    /// List every blob whose key starts with `prefix`. An empty prefix lists
    /// the whole store.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError>;

    /// Derive a URL granting read access to `key` until `ttl` elapses.
    ///
    /// This never mutates the store; expiry is a property of the URL itself.
    async fn presign_get(&self, key: &BlobKey, ttl: Duration) -> Result<String, StorageError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<(), StorageError>;
}
