use crate::keys::{key_from_public_url, public_url, validate_key};
use crate::traits::{Storage, StorageError, StorageResult, TransferProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use folio_core::hooks::percent_complete;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, MultipartUpload, ObjectStore, ObjectStoreExt, PutMultipartOptions,
    PutOptions, PutPayload, Result as ObjectResult,
};
use std::sync::Arc;

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// S3 storage implementation
///
/// Any `object_store` backend can sit behind it; production builds an
/// `AmazonS3`, tests use `InMemory`.
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_url: String,
    chunk_size: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `public_base_url` - Optional URL prefix for handed-out URLs (e.g. a CDN in
    ///   front of the bucket); defaults to the bucket's own URL
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let base_url = public_base_url
            .unwrap_or_else(|| default_base_url(&bucket, &region, endpoint_url.as_deref()));

        Ok(Self::with_store(Arc::new(store), bucket, base_url))
    }

    /// Wrap an already-built object store.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: String, base_url: String) -> Self {
        S3Storage {
            store,
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Multipart part size; payloads no larger than this go up in a single put.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn put_single(
        &self,
        location: &Path,
        content_type: &str,
        data: Bytes,
    ) -> ObjectResult<()> {
        let options = PutOptions {
            attributes: content_type_attributes(content_type),
            ..Default::default()
        };
        self.store
            .put_opts(location, PutPayload::from(data), options)
            .await?;
        Ok(())
    }

    /// Send `data` part by part, reporting after each acknowledged part.
    /// A failed upload is aborted so no orphaned parts stay behind.
    async fn put_chunked(
        &self,
        location: &Path,
        content_type: &str,
        data: Bytes,
        progress: TransferProgress<'_>,
    ) -> ObjectResult<()> {
        let total = data.len() as u64;
        let options = PutMultipartOptions {
            attributes: content_type_attributes(content_type),
            ..Default::default()
        };
        let mut upload = self.store.put_multipart_opts(location, options).await?;

        let mut sent = 0usize;
        while sent < data.len() {
            let end = (sent + self.chunk_size).min(data.len());
            let part = data.slice(sent..end);
            if let Err(e) = upload.put_part(PutPayload::from(part)).await {
                abort_quietly(upload.as_mut(), location).await;
                return Err(e);
            }
            sent = end;
            progress(percent_complete(sent as u64, total));
        }

        if let Err(e) = upload.complete().await {
            abort_quietly(upload.as_mut(), location).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Object attributes carrying the declared MIME type, so the public URL is
/// served with it.
fn content_type_attributes(content_type: &str) -> Attributes {
    let mut attributes = Attributes::new();
    if !content_type.is_empty() {
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
    }
    attributes
}

async fn abort_quietly(upload: &mut dyn MultipartUpload, location: &Path) {
    if let Err(e) = upload.abort().await {
        tracing::warn!(error = %e, key = %location, "Failed to abort multipart upload");
    }
}

/// Standard bucket URL: virtual-hosted style on AWS, path style
/// (`{endpoint}/{bucket}`) for S3-compatible providers.
fn default_base_url(bucket: &str, region: &str, endpoint_url: Option<&str>) -> String {
    match endpoint_url {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(
        &self,
        storage_key: &str,
        content_type: &str,
        data: Bytes,
        progress: TransferProgress<'_>,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let size = data.len() as u64;
        let location = Path::from(storage_key);
        let multipart = data.len() > self.chunk_size;

        let start = std::time::Instant::now();

        let result = if multipart {
            self.put_chunked(&location, content_type, data, progress).await
        } else {
            self.put_single(&location, content_type, data).await
        };

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                multipart,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        if !multipart {
            progress(100);
        }

        let url = self.public_url(storage_key);

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            multipart,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(url)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let location = Path::from(storage_key);

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        let start = std::time::Instant::now();
        let location = Path::from(storage_key);

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Path::from(storage_key);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn public_url(&self, storage_key: &str) -> String {
        public_url(&self.base_url, storage_key)
    }

    fn key_from_url(&self, url: &str) -> StorageResult<String> {
        key_from_public_url(&self.base_url, url)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(all(test, feature = "storage-s3"))]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::sync::Mutex;

    const BASE_URL: &str = "https://portfolio-media.s3.eu-west-1.amazonaws.com";

    fn storage(chunk_size: usize) -> S3Storage {
        S3Storage::with_store(
            Arc::new(InMemory::new()),
            "portfolio-media".to_string(),
            BASE_URL.to_string(),
        )
        .with_chunk_size(chunk_size)
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(
            default_base_url("bucket", "us-east-1", None),
            "https://bucket.s3.us-east-1.amazonaws.com"
        );
        assert_eq!(
            default_base_url("bucket", "auto", Some("http://localhost:9000/")),
            "http://localhost:9000/bucket"
        );
    }

    #[tokio::test]
    async fn test_small_upload_is_single_put() {
        let storage = storage(1024);
        let events = Mutex::new(Vec::new());

        let url = storage
            .upload(
                "images/1700000000000_abc123.jpg",
                "image/jpeg",
                Bytes::from_static(b"jpeg bytes"),
                &|p: u8| events.lock().unwrap().push(p),
            )
            .await
            .unwrap();

        assert_eq!(url, format!("{}/images/1700000000000_abc123.jpg", BASE_URL));
        assert_eq!(*events.lock().unwrap(), vec![100]);
        assert_eq!(
            storage.download("images/1700000000000_abc123.jpg").await.unwrap(),
            b"jpeg bytes".to_vec()
        );
    }

    #[tokio::test]
    async fn test_large_upload_goes_multipart_with_progress() {
        let storage = storage(4);
        let events = Mutex::new(Vec::new());
        let payload: Vec<u8> = (0u8..10).collect();

        storage
            .upload(
                "videos/1_tok.mp4",
                "video/mp4",
                Bytes::from(payload.clone()),
                &|p: u8| events.lock().unwrap().push(p),
            )
            .await
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec![40, 80, 100]);
        assert_eq!(storage.download("videos/1_tok.mp4").await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_content_type_stored_for_single_and_multipart() {
        let store = Arc::new(InMemory::new());
        let storage = S3Storage::with_store(
            store.clone(),
            "portfolio-media".to_string(),
            BASE_URL.to_string(),
        )
        .with_chunk_size(4);

        for (key, payload) in [
            ("videos/1_big.mp4", &b"0123456789"[..]),
            ("videos/1_small.mp4", &b"012"[..]),
        ] {
            storage
                .upload(key, "video/mp4", Bytes::copy_from_slice(payload), &|_: u8| {})
                .await
                .unwrap();
        }

        for key in ["videos/1_big.mp4", "videos/1_small.mp4"] {
            let stored = store.get(&Path::from(key)).await.unwrap();
            assert_eq!(
                stored
                    .attributes
                    .get(&Attribute::ContentType)
                    .map(|v| AsRef::<str>::as_ref(v)),
                Some("video/mp4"),
                "{key}"
            );
        }
    }

    #[tokio::test]
    async fn test_delete_via_url() {
        let storage = storage(1024);
        let url = storage
            .upload("images/1_tok.png", "image/png", Bytes::from_static(b"png"), &|_: u8| {})
            .await
            .unwrap();

        let key = storage.key_from_url(&url).unwrap();
        assert!(storage.exists(&key).await.unwrap());
        storage.delete(&key).await.unwrap();
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let storage = storage(1024);
        assert!(matches!(
            storage.download("images/missing.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_foreign_url_rejected() {
        let storage = storage(1024);
        assert!(matches!(
            storage.key_from_url("https://other-bucket.s3.eu-west-1.amazonaws.com/images/a.png"),
            Err(StorageError::InvalidReference(_))
        ));
    }
}
