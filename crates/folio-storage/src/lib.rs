//! Folio Storage Library
//!
//! Object-store abstraction for uploaded media, with an S3 backend (via
//! `object_store`) and a local filesystem backend.
//!
//! # Storage key format
//!
//! Keys are `{folder}/{timestamp_ms}_{token}.{ext}`, generated by
//! [`keys::generate_storage_key`]. Keys must not contain `..` or a leading
//! `/`. Public URLs are `{base_url}/{percent-encoded key}`, so a key can be
//! recovered from any URL this crate handed out.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use folio_core::StorageBackend;
pub use keys::{generate_storage_key, validate_folder};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, TransferProgress};
