use folio_core::models::file_extension;
use folio_core::{CategoryPolicy, MediaCategory, MediaError, MediaFile, MediaResult, UploadPolicy};

use crate::heic::is_heic;

/// Media file validator
///
/// Enforces one category's size ceiling, extension blocklist and MIME
/// allow-list. Runs on the file that will actually be stored, i.e. after any
/// HEIC conversion.
pub struct MediaValidator {
    category: MediaCategory,
    policy: CategoryPolicy,
}

impl MediaValidator {
    pub fn new(category: MediaCategory, policy: CategoryPolicy) -> Self {
        Self { category, policy }
    }

    /// Create validator for a category from the upload policy
    pub fn for_category(policy: &UploadPolicy, category: MediaCategory) -> Self {
        Self::new(category, policy.for_category(category).clone())
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: u64) -> MediaResult<()> {
        if size == 0 {
            return Err(MediaError::UnsupportedFormat(
                "The selected file is empty. Please choose another file.".to_string(),
            ));
        }

        if size > self.policy.max_bytes {
            return Err(MediaError::SizeExceeded {
                category: self.category,
                size_bytes: size,
                limit_bytes: self.policy.max_bytes,
            });
        }

        Ok(())
    }

    /// Reject extensions on the blocklist, whatever MIME type was declared.
    pub fn validate_extension(&self, filename: &str) -> MediaResult<()> {
        let Some(extension) = file_extension(filename) else {
            return Ok(());
        };

        if self.policy.blocked_extensions.contains(&extension) {
            return Err(MediaError::UnsupportedFormat(format!(
                "{} files are not supported. Please convert the file to one of: {} and try again.",
                extension.to_uppercase(),
                self.supported_formats()
            )));
        }

        Ok(())
    }

    /// Validate declared content type against the allow-list
    pub fn validate_content_type(&self, filename: &str, content_type: &str) -> MediaResult<()> {
        let normalized = content_type.trim().to_lowercase();

        if self.policy.allowed_content_types.contains(&normalized) {
            return Ok(());
        }

        if is_heic(filename, &normalized) {
            return Err(MediaError::UnsupportedFormat(
                "HEIC/HEIF photos could not be processed automatically. Please convert the photo \
                 to JPEG (on iPhone: Settings > Camera > Formats > Most Compatible) and upload it again."
                    .to_string(),
            ));
        }

        let declared = if normalized.is_empty() {
            "unknown"
        } else {
            normalized.as_str()
        };
        Err(MediaError::UnsupportedFormat(format!(
            "Unsupported file type \"{}\". Allowed types are: {}.",
            declared,
            self.policy.allowed_content_types.join(", ")
        )))
    }

    /// Validate all aspects of a file: size, then extension, then MIME type
    pub fn validate_all(&self, file: &MediaFile) -> MediaResult<()> {
        self.validate_file_size(file.size())?;
        self.validate_extension(&file.name)?;
        self.validate_content_type(&file.name, &file.content_type)?;
        Ok(())
    }

    /// Allow-list rendered as short names, e.g. `JPEG, PNG, GIF, WEBP`.
    fn supported_formats(&self) -> String {
        let mut names: Vec<String> = Vec::new();
        for content_type in &self.policy.allowed_content_types {
            let name = content_type
                .rsplit('/')
                .next()
                .unwrap_or(content_type)
                .trim_start_matches("x-")
                .replace("jpg", "jpeg")
                .to_uppercase();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.join(", ")
    }
}

/// Best-effort MIME type for a file name, for callers with no declared type.
pub fn content_type_for_extension(filename: &str) -> Option<&'static str> {
    let extension = file_extension(filename)?;
    let content_type = match extension.as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" | "hif" => "image/heif",
        // Videos
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => {
            tracing::debug!(extension = %extension, "Unknown extension, no content type guessed");
            return None;
        }
    };
    Some(content_type)
}
