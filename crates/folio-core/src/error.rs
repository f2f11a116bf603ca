//! Error types module
//!
//! Every failure the upload pipeline can surface is a [`MediaError`]. The
//! `Display` text of each variant is phrased for direct display to the person
//! who picked the file; [`ErrorMetadata`] adds the machine-readable side
//! (code, log level, whether retrying the same action can help) so a
//! presentation layer can render it without matching on variants.

use crate::models::MediaCategory;

/// Instruction appended to every HEIC conversion failure.
pub const HEIC_MANUAL_REMEDY: &str = "Please convert the photo to JPEG before uploading \
    (on iPhone: Settings > Camera > Formats > Most Compatible, or share/export it as JPEG), \
    then try again.";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like conversion problems
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "SIZE_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same action unchanged may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    /// HEIC/HEIF decode or JPEG re-encode failed.
    #[error("Could not convert the HEIC/HEIF photo ({reason}). {remedy}")]
    Conversion { reason: String, remedy: String },

    /// File is larger than the category ceiling.
    #[error("{category} file is too large ({}). Maximum size is {}.", megabytes(.size_bytes), megabytes(.limit_bytes))]
    SizeExceeded {
        category: MediaCategory,
        size_bytes: u64,
        limit_bytes: u64,
    },

    /// Extension or MIME type not accepted for the category. The message is
    /// already complete.
    #[error("{0}")]
    UnsupportedFormat(String),

    /// Transport failure while sending the file to the object store.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The caller-supplied destination folder cannot form a storage key.
    #[error("Invalid destination folder \"{0}\". Use names separated by single slashes, without \"..\".")]
    InvalidFolder(String),

    /// A URL handed in for deletion does not point into the object store.
    #[error("Invalid storage reference: {0}")]
    InvalidReference(String),

    /// Transport failure while deleting an object.
    #[error("Delete failed: {0}")]
    Delete(String),
}

/// Result type for pipeline operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    pub fn conversion(reason: impl Into<String>) -> Self {
        MediaError::Conversion {
            reason: reason.into(),
            remedy: HEIC_MANUAL_REMEDY.to_string(),
        }
    }

    /// The limit named in a size error, e.g. `"50MB"`.
    pub fn limit_display(&self) -> Option<String> {
        match self {
            MediaError::SizeExceeded { limit_bytes, .. } => Some(format_megabytes(*limit_bytes)),
            _ => None,
        }
    }
}

/// Render a byte count as megabytes: whole numbers without decimals
/// (`50MB`), everything else with one decimal (`2.5MB`).
pub fn format_megabytes(bytes: u64) -> String {
    if bytes % BYTES_PER_MB == 0 {
        format!("{}MB", bytes / BYTES_PER_MB)
    } else {
        format!("{:.1}MB", bytes as f64 / BYTES_PER_MB as f64)
    }
}

fn megabytes(bytes: &u64) -> String {
    format_megabytes(*bytes)
}

fn metadata_for(err: &MediaError) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        MediaError::Conversion { .. } => (
            "CONVERSION_ERROR",
            false,
            Some("Convert the photo to JPEG and upload it again"),
            LogLevel::Warn,
        ),
        MediaError::SizeExceeded { .. } => (
            "SIZE_EXCEEDED",
            false,
            Some("Choose a smaller file or compress it first"),
            LogLevel::Debug,
        ),
        MediaError::UnsupportedFormat(_) => (
            "UNSUPPORTED_FORMAT",
            false,
            Some("Choose a file in one of the supported formats"),
            LogLevel::Debug,
        ),
        MediaError::Upload(_) => (
            "UPLOAD_ERROR",
            true,
            Some("Check your connection and retry the upload"),
            LogLevel::Error,
        ),
        MediaError::InvalidReference(_) => (
            "INVALID_REFERENCE",
            false,
            Some("Verify the URL was returned by a previous upload"),
            LogLevel::Debug,
        ),
        MediaError::InvalidFolder(_) => (
            "INVALID_FOLDER",
            false,
            Some("Choose a different destination folder"),
            LogLevel::Debug,
        ),
        MediaError::Delete(_) => (
            "DELETE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for MediaError {
    fn error_code(&self) -> &'static str {
        metadata_for(self).0
    }

    fn is_recoverable(&self) -> bool {
        metadata_for(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        metadata_for(self).2
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn log_level(&self) -> LogLevel {
        metadata_for(self).3
    }
}
