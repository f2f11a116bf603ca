//! Upload pipeline: convert → validate → generate key → store.
//!
//! Each step gates the next and the first failure is returned as-is; nothing
//! is retried. Every call is independent, so any number of uploads can run
//! at once against the same [`MediaUploader`].

use futures::future::join_all;
use std::sync::Arc;

use folio_core::{
    MediaCategory, MediaError, MediaFile, MediaResult, StorageObject, UploadPolicy,
    UploadProgress, UploadRequest, UploadStage,
};
use folio_storage::{generate_storage_key, validate_folder, Storage, StorageError};

use crate::heic::{default_decoder, is_heic, HeicConverter};
use crate::validator::MediaValidator;

/// Runs uploads end to end against one object store.
#[derive(Clone)]
pub struct MediaUploader {
    storage: Arc<dyn Storage>,
    policy: UploadPolicy,
    converter: HeicConverter,
}

impl MediaUploader {
    /// Uploader using the HEIC decoder compiled into this build.
    pub fn new(storage: Arc<dyn Storage>, policy: UploadPolicy) -> Self {
        let converter = HeicConverter::new(default_decoder(), policy.jpeg_quality);
        Self {
            storage,
            policy,
            converter,
        }
    }

    pub fn with_converter(mut self, converter: HeicConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Steps 1 and 2 with this uploader's policy and converter. Touches no
    /// storage.
    pub async fn prepare(
        &self,
        file: MediaFile,
        category: MediaCategory,
        progress: &dyn UploadProgress,
    ) -> MediaResult<MediaFile> {
        prepare_file(&self.policy, &self.converter, file, category, progress).await
    }

    /// Upload one file and return where it was stored.
    pub async fn upload(
        &self,
        request: UploadRequest,
        progress: &dyn UploadProgress,
    ) -> MediaResult<StorageObject> {
        let start = std::time::Instant::now();
        let folder = request.destination_folder().to_string();
        let category = request.category;
        let original_name = request.file.name.clone();

        validate_folder(&folder).map_err(|e| {
            tracing::debug!(folder = %folder, error = %e, "Rejected destination folder");
            MediaError::InvalidFolder(folder.clone())
        })?;

        let file = match self.prepare(request.file, category, progress).await {
            Ok(file) => file,
            Err(e) => {
                tracing::info!(
                    file = %original_name,
                    category = %category,
                    error_code = folio_core::ErrorMetadata::error_code(&e),
                    "Upload rejected"
                );
                return Err(e);
            }
        };

        let path = generate_storage_key(&folder, &file.name).map_err(|e| match e {
            StorageError::InvalidKey(_) => MediaError::InvalidFolder(folder.clone()),
            other => MediaError::Upload(other.to_string()),
        })?;

        let report = |percent: u8| progress.report(UploadStage::Transferring, percent);
        let url = self
            .storage
            .upload(&path, &file.content_type, file.data.clone(), &report)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %path,
                    size_bytes = file.size(),
                    "Upload to object store failed"
                );
                MediaError::Upload(upload_error_text(e))
            })?;

        tracing::info!(
            file = %original_name,
            key = %path,
            content_type = %file.content_type,
            size_bytes = file.size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload completed"
        );

        Ok(StorageObject { path, url })
    }

    /// Run several uploads concurrently. Results come back in input order;
    /// one failure does not affect the others. `progress` receives the
    /// index of the request each event belongs to.
    pub async fn upload_all(
        &self,
        requests: Vec<UploadRequest>,
        progress: &(dyn Fn(usize, UploadStage, u8) + Send + Sync),
    ) -> Vec<MediaResult<StorageObject>> {
        let uploads = requests.into_iter().enumerate().map(|(index, request)| async move {
            let report = move |stage: UploadStage, percent: u8| progress(index, stage, percent);
            self.upload(request, &report).await
        });
        join_all(uploads).await
    }

    /// Delete an object given the URL a previous upload returned.
    pub async fn delete(&self, url: &str) -> MediaResult<()> {
        let key = self.storage.key_from_url(url).map_err(|e| {
            tracing::debug!(url = %url, error = %e, "Rejected delete for foreign URL");
            MediaError::InvalidReference(url.to_string())
        })?;

        self.storage.delete(&key).await.map_err(|e| {
            tracing::error!(error = %e, key = %key, "Delete from object store failed");
            MediaError::Delete(e.to_string())
        })?;

        tracing::info!(key = %key, "Media deleted");
        Ok(())
    }
}

/// Steps 1 and 2 of an upload: convert HEIC images to JPEG, then validate
/// the result against the category policy. Returns the file that would be
/// stored.
pub async fn prepare_file(
    policy: &UploadPolicy,
    converter: &HeicConverter,
    file: MediaFile,
    category: MediaCategory,
    progress: &dyn UploadProgress,
) -> MediaResult<MediaFile> {
    let file = if category == MediaCategory::Image && is_heic(&file.name, &file.content_type) {
        tracing::debug!(file = %file.name, "HEIC image detected, converting to JPEG");
        let report = |percent: u8| progress.report(UploadStage::Converting, percent);
        converter.convert(&file, &report).await?
    } else {
        file
    };

    MediaValidator::for_category(policy, category).validate_all(&file)?;
    Ok(file)
}

/// Transport text without the storage layer's own prefix.
fn upload_error_text(err: StorageError) -> String {
    match err {
        StorageError::UploadFailed(message) => message,
        other => other.to_string(),
    }
}
