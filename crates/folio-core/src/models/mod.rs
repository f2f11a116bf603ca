//! Data models for the upload pipeline

mod media;
mod media_urls;
mod storage;

// Re-export all models for convenient imports
pub use media::*;
pub use media_urls::*;
pub use storage::*;
