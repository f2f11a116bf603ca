//! Configuration module
//!
//! Two halves: the upload policy (size ceilings, MIME allow-lists, JPEG
//! quality) is fixed in code, while the object-store connection is read from
//! the environment.

use std::env;

use crate::models::MediaCategory;
use crate::storage_types::StorageBackend;

// Common constants
const BYTES_PER_MB: u64 = 1024 * 1024;
const MAX_IMAGE_SIZE_MB: u64 = 10;
const MAX_VIDEO_SIZE_MB: u64 = 50;
const JPEG_QUALITY: u8 = 90;
/// S3 rejects multipart parts below 5 MiB (except the last one).
const MIN_CHUNK_SIZE_MB: usize = 5;
const DEFAULT_CHUNK_SIZE_MB: usize = 8;

const IMAGE_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

const VIDEO_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
];

/// Raster formats browsers cannot render. The extension decides here because
/// browsers often report these with a generic or wrong MIME type.
const BLOCKED_IMAGE_EXTENSIONS: &[&str] = &[
    "tiff", "tif", "bmp", "raw", "cr2", "cr3", "nef", "arw", "dng", "orf", "rw2", "raf",
];

/// Size and type rules for one upload category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub blocked_extensions: Vec<String>,
}

impl CategoryPolicy {
    pub fn new(max_bytes: u64, allowed_content_types: &[&str], blocked_extensions: &[&str]) -> Self {
        Self {
            max_bytes,
            allowed_content_types: allowed_content_types.iter().map(|s| s.to_string()).collect(),
            blocked_extensions: blocked_extensions.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Upload policy for both categories plus the HEIC conversion quality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    pub image: CategoryPolicy,
    pub video: CategoryPolicy,
    /// JPEG quality (0-100) used when converting HEIC/HEIF photos.
    pub jpeg_quality: u8,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            image: CategoryPolicy::new(
                MAX_IMAGE_SIZE_MB * BYTES_PER_MB,
                IMAGE_CONTENT_TYPES,
                BLOCKED_IMAGE_EXTENSIONS,
            ),
            video: CategoryPolicy::new(MAX_VIDEO_SIZE_MB * BYTES_PER_MB, VIDEO_CONTENT_TYPES, &[]),
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl UploadPolicy {
    pub fn for_category(&self, category: MediaCategory) -> &CategoryPolicy {
        match category {
            MediaCategory::Image => &self.image,
            MediaCategory::Video => &self.video,
        }
    }
}

/// Object-store connection settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    /// Overrides the URL prefix handed out for stored objects (e.g. a CDN).
    pub s3_public_base_url: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// Size of each transferred chunk; also the multipart part size on S3.
    pub chunk_size_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            s3_public_base_url: None,
            local_storage_path: None,
            local_storage_base_url: None,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_MB * BYTES_PER_MB as usize,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match non_empty_var("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let chunk_size_mb = env::var("UPLOAD_CHUNK_SIZE_MB")
            .unwrap_or_else(|_| DEFAULT_CHUNK_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(DEFAULT_CHUNK_SIZE_MB)
            .max(MIN_CHUNK_SIZE_MB);

        Ok(StorageConfig {
            storage_backend,
            s3_bucket: non_empty_var("S3_BUCKET"),
            s3_region: non_empty_var("S3_REGION").or_else(|| non_empty_var("AWS_REGION")),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
            s3_public_base_url: non_empty_var("S3_PUBLIC_BASE_URL"),
            local_storage_path: non_empty_var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty_var("LOCAL_STORAGE_BASE_URL"),
            chunk_size_bytes: chunk_size_mb * BYTES_PER_MB as usize,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when STORAGE_BACKEND=s3"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL"
                    ));
                }
            }
        }

        if self.chunk_size_bytes < MIN_CHUNK_SIZE_MB * BYTES_PER_MB as usize {
            return Err(anyhow::anyhow!(
                "Upload chunk size must be at least {}MB",
                MIN_CHUNK_SIZE_MB
            ));
        }

        for url in [&self.s3_public_base_url, &self.local_storage_base_url]
            .into_iter()
            .flatten()
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("Base URL must be http(s): {}", url));
            }
        }

        Ok(())
    }
}
