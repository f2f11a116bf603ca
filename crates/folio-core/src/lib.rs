//! Folio Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! progress hooks shared by the storage, processing and CLI crates.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{CategoryPolicy, StorageConfig, UploadPolicy};
pub use error::{ErrorMetadata, LogLevel, MediaError, MediaResult};
pub use hooks::{NoOpProgress, UploadProgress, UploadStage};
pub use models::{MediaCategory, MediaFile, MediaUrls, StorageObject, UploadRequest};
pub use storage_types::StorageBackend;
