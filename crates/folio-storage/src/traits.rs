//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Not a URL issued by this store: {0}")]
    InvalidReference(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Callback receiving integer percent complete (0-100) during a transfer.
pub type TransferProgress<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// Keys are produced by [`crate::keys::generate_storage_key`]; backends never
/// invent their own.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload `data` under `storage_key` and return its public URL.
    ///
    /// The payload is sent in chunks; `progress` is called with the percent
    /// complete after each chunk the backend acknowledges and always ends
    /// with 100 on success. No retries happen here.
    async fn upload(
        &self,
        storage_key: &str,
        content_type: &str,
        data: Bytes,
        progress: TransferProgress<'_>,
    ) -> StorageResult<String>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a file by its storage key. Deleting a missing key succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Public download URL for a key.
    fn public_url(&self, storage_key: &str) -> String;

    /// Recover the storage key from a URL previously returned by
    /// [`Storage::upload`] or [`Storage::public_url`].
    ///
    /// Fails with [`StorageError::InvalidReference`] for URLs that do not
    /// belong to this store.
    fn key_from_url(&self, url: &str) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
