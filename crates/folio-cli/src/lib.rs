use folio_core::{ErrorMetadata, MediaError, UploadStage};
use folio_processing::content_type_for_extension;
use serde::Serialize;
use std::path::Path;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Declared type for a local file: the explicit one if given, otherwise a
/// guess from the extension.
pub fn resolve_content_type(path: &Path, explicit: Option<&str>) -> String {
    if let Some(content_type) = explicit.map(str::trim).filter(|ct| !ct.is_empty()) {
        return content_type.to_string();
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    content_type_for_extension(name)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

/// One progress line, e.g. `[2] photo.heic converting 10%`.
pub fn progress_line(index: usize, name: &str, stage: UploadStage, percent: u8) -> String {
    let stage = match stage {
        UploadStage::Converting => "converting",
        UploadStage::Transferring => "uploading",
    };
    format!("[{}] {} {} {}%", index + 1, name, stage, percent)
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub code: &'static str,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
}

impl From<&MediaError> for ErrorReport {
    fn from(err: &MediaError) -> Self {
        Self {
            error: err.client_message(),
            code: err.error_code(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
        }
    }
}
