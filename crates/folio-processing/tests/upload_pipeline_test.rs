//! Upload pipeline integration tests.
//!
//! Run with: `cargo test -p folio-processing --test upload_pipeline_test`

use async_trait::async_trait;
use bytes::Bytes;
use folio_core::{
    ErrorMetadata, MediaCategory, MediaError, MediaFile, NoOpProgress, StorageBackend,
    UploadPolicy, UploadRequest, UploadStage,
};
use folio_processing::{prepare_file, HeicConverter, HeicDecoder, MediaUploader};
use folio_storage::keys::{key_from_public_url, public_url};
use folio_storage::{LocalStorage, Storage, StorageError, StorageResult, TransferProgress};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MB: usize = 1024 * 1024;
const BASE_URL: &str = "https://media.example.com";

/// In-memory store that counts uploads and can be told to fail them.
#[derive(Default)]
struct RecordingStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    uploads: AtomicUsize,
    fail_uploads: bool,
}

impl RecordingStorage {
    fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    fn upload_calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn upload(
        &self,
        storage_key: &str,
        _content_type: &str,
        data: Bytes,
        progress: TransferProgress<'_>,
    ) -> StorageResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(StorageError::UploadFailed("connection reset by peer".to_string()));
        }
        progress(50);
        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), data);
        progress(100);
        Ok(self.public_url(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .map(|b| b.to_vec())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        public_url(BASE_URL, storage_key)
    }

    fn key_from_url(&self, url: &str) -> StorageResult<String> {
        key_from_public_url(BASE_URL, url)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Decodes PNG payloads in place of libheif and counts its calls.
#[derive(Default)]
struct PngAsHeicDecoder {
    calls: AtomicUsize,
}

impl HeicDecoder for PngAsHeicDecoder {
    fn decode_first_frame(&self, data: &[u8]) -> anyhow::Result<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(image::load_from_memory(data)?)
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

fn uploader(storage: Arc<dyn Storage>, decoder: Arc<PngAsHeicDecoder>) -> MediaUploader {
    let policy = UploadPolicy::default();
    let converter = HeicConverter::new(decoder, policy.jpeg_quality);
    MediaUploader::new(storage, policy).with_converter(converter)
}

fn recorder() -> Arc<Mutex<Vec<(UploadStage, u8)>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn test_heic_photo_is_converted_and_stored_as_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(dir.path(), BASE_URL.to_string())
            .await
            .unwrap(),
    );
    let decoder = Arc::new(PngAsHeicDecoder::default());
    let uploader = uploader(storage.clone(), decoder.clone());

    let events = recorder();
    let sink = events.clone();
    let request = UploadRequest::new(
        MediaFile::new("photo.HEIC", "image/heic", png_bytes(64, 48)),
        MediaCategory::Image,
    );

    let stored = uploader
        .upload(request, &move |stage: UploadStage, percent: u8| {
            sink.lock().unwrap().push((stage, percent))
        })
        .await
        .unwrap();

    assert!(stored.path.starts_with("images/"), "{}", stored.path);
    assert!(stored.path.ends_with(".jpg"), "{}", stored.path);
    assert!(stored.url.contains(&stored.path));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

    let saved = storage.download(&stored.path).await.unwrap();
    assert_eq!(image::guess_format(&saved).unwrap(), ImageFormat::Jpeg);

    let events = events.lock().unwrap();
    assert_eq!(events[0], (UploadStage::Converting, 10));
    assert_eq!(events[1], (UploadStage::Converting, 100));
    assert_eq!(events.last(), Some(&(UploadStage::Transferring, 100)));
}

#[tokio::test]
async fn test_oversized_video_never_reaches_storage() {
    let storage = Arc::new(RecordingStorage::default());
    let uploader = uploader(storage.clone(), Arc::new(PngAsHeicDecoder::default()));

    let request = UploadRequest::new(
        MediaFile::new("interview.mp4", "video/mp4", vec![0u8; 80 * MB]),
        MediaCategory::Video,
    );

    let err = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::SizeExceeded { .. }));
    assert!(err.to_string().contains("50MB"), "{err}");
    assert_eq!(storage.upload_calls(), 0);
}

#[tokio::test]
async fn test_bmp_rejected_without_conversion_or_upload() {
    let storage = Arc::new(RecordingStorage::default());
    let decoder = Arc::new(PngAsHeicDecoder::default());
    let uploader = uploader(storage.clone(), decoder.clone());

    let request = UploadRequest::new(
        MediaFile::new("scan.bmp", "image/bmp", vec![1u8; 2048]),
        MediaCategory::Image,
    );

    let err = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::UnsupportedFormat(_)));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(storage.upload_calls(), 0);
}

#[tokio::test]
async fn test_failed_conversion_aborts_before_upload() {
    let storage = Arc::new(RecordingStorage::default());
    let uploader = uploader(storage.clone(), Arc::new(PngAsHeicDecoder::default()));

    let request = UploadRequest::new(
        MediaFile::new("IMG_0042.heic", "image/heic", b"ftypheic garbage".to_vec()),
        MediaCategory::Image,
    );

    let err = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Conversion { .. }));
    assert_eq!(storage.upload_calls(), 0);
}

#[tokio::test]
async fn test_heic_named_video_is_not_converted() {
    let storage = Arc::new(RecordingStorage::default());
    let decoder = Arc::new(PngAsHeicDecoder::default());
    let uploader = uploader(storage.clone(), decoder.clone());

    let request = UploadRequest::new(
        MediaFile::new("clip.heic", "image/heic", vec![1u8; 16]),
        MediaCategory::Video,
    );

    let err = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::UnsupportedFormat(_)));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_failure_surfaces_as_upload_error() {
    let storage = Arc::new(RecordingStorage::failing());
    let uploader = uploader(storage.clone(), Arc::new(PngAsHeicDecoder::default()));

    let request = UploadRequest::new(
        MediaFile::new("cover.png", "image/png", png_bytes(4, 4)),
        MediaCategory::Image,
    )
    .with_folder("blog/covers");

    let err = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MediaError::Upload("connection reset by peer".to_string())
    );
    assert_eq!(storage.upload_calls(), 1);
}

#[tokio::test]
async fn test_custom_folder_is_used() {
    let storage = Arc::new(RecordingStorage::default());
    let uploader = uploader(storage.clone(), Arc::new(PngAsHeicDecoder::default()));

    let request = UploadRequest::new(
        MediaFile::new("cover.PNG", "image/png", png_bytes(4, 4)),
        MediaCategory::Image,
    )
    .with_folder("/blog/covers/");

    let stored = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap();

    assert!(stored.path.starts_with("blog/covers/"), "{}", stored.path);
    assert!(stored.path.ends_with(".png"), "{}", stored.path);
}

#[tokio::test]
async fn test_delete_round_trip_and_foreign_url() {
    let storage = Arc::new(RecordingStorage::default());
    let uploader = uploader(storage.clone(), Arc::new(PngAsHeicDecoder::default()));

    let request = UploadRequest::new(
        MediaFile::new("clip.webm", "video/webm", vec![7u8; 1024]),
        MediaCategory::Video,
    );
    let stored = uploader
        .upload(request, &NoOpProgress)
        .await
        .unwrap();
    assert!(storage.exists(&stored.path).await.unwrap());

    uploader.delete(&stored.url).await.unwrap();
    assert!(!storage.exists(&stored.path).await.unwrap());

    let err = uploader
        .delete("https://unrelated.example.org/some/file.jpg")
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::InvalidReference(_)));

    let err = uploader.delete("definitely not a url").await.unwrap_err();
    assert!(matches!(err, MediaError::InvalidReference(_)));
}

#[tokio::test]
async fn test_upload_all_keeps_results_independent_and_ordered() {
    let storage = Arc::new(RecordingStorage::default());
    let uploader = uploader(storage.clone(), Arc::new(PngAsHeicDecoder::default()));

    let requests = vec![
        UploadRequest::new(
            MediaFile::new("a.png", "image/png", png_bytes(2, 2)),
            MediaCategory::Image,
        ),
        UploadRequest::new(
            MediaFile::new("b.tiff", "image/tiff", vec![1u8; 64]),
            MediaCategory::Image,
        ),
        UploadRequest::new(
            MediaFile::new("c.png", "image/png", png_bytes(2, 2)),
            MediaCategory::Image,
        ),
    ];

    let completed = Mutex::new(Vec::new());
    let results = uploader
        .upload_all(requests, &|index: usize, stage: UploadStage, percent: u8| {
            if stage == UploadStage::Transferring && percent == 100 {
                completed.lock().unwrap().push(index);
            }
        })
        .await;

    assert_eq!(results.len(), 3);
    let first = results[0].as_ref().unwrap();
    assert!(matches!(results[1], Err(MediaError::UnsupportedFormat(_))));
    let third = results[2].as_ref().unwrap();
    assert_ne!(first.path, third.path);
    assert_eq!(storage.upload_calls(), 2);

    let mut completed = completed.into_inner().unwrap();
    completed.sort_unstable();
    assert_eq!(completed, vec![0, 2]);
}

#[tokio::test]
async fn test_invalid_folder_is_rejected_before_any_work() {
    let storage = Arc::new(RecordingStorage::default());
    let decoder = Arc::new(PngAsHeicDecoder::default());
    let uploader = uploader(storage.clone(), decoder.clone());

    for folder in ["blog//covers", "../x"] {
        let request = UploadRequest::new(
            MediaFile::new("photo.heic", "image/heic", png_bytes(4, 4)),
            MediaCategory::Image,
        )
        .with_folder(folder);

        let err = uploader.upload(request, &NoOpProgress).await.unwrap_err();

        assert!(matches!(err, MediaError::InvalidFolder(_)), "{folder}: {err:?}");
        assert!(!err.is_recoverable());
        assert_eq!(err.error_code(), "INVALID_FOLDER");
    }

    assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(storage.upload_calls(), 0);
}

#[tokio::test]
async fn test_prepare_file_converts_and_validates_without_storage() {
    let policy = UploadPolicy::default();
    let decoder = Arc::new(PngAsHeicDecoder::default());
    let converter = HeicConverter::new(decoder.clone(), policy.jpeg_quality);

    let prepared = prepare_file(
        &policy,
        &converter,
        MediaFile::new("IMG_0042.HEIC", "image/heic", png_bytes(8, 8)),
        MediaCategory::Image,
        &NoOpProgress,
    )
    .await
    .unwrap();
    assert_eq!(prepared.name, "IMG_0042.jpg");
    assert_eq!(prepared.content_type, "image/jpeg");
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

    let err = prepare_file(
        &policy,
        &converter,
        MediaFile::new("scan.bmp", "image/bmp", vec![1u8; 64]),
        MediaCategory::Image,
        &NoOpProgress,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MediaError::UnsupportedFormat(_)));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
}
