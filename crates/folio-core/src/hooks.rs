//! Progress hooks
//!
//! The pipeline never renders anything itself. Callers that want to show
//! progress pass an [`UploadProgress`] implementation; any
//! `Fn(UploadStage, u8)` closure qualifies.

/// Which step of an upload a progress value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    /// HEIC/HEIF to JPEG conversion (reports 10 then 100).
    Converting,
    /// Transfer to the object store (reports after every acknowledged chunk).
    Transferring,
}

/// Receiver for percent-complete events (0-100).
pub trait UploadProgress: Send + Sync {
    fn report(&self, stage: UploadStage, percent: u8);
}

impl<F> UploadProgress for F
where
    F: Fn(UploadStage, u8) + Send + Sync,
{
    fn report(&self, stage: UploadStage, percent: u8) {
        self(stage, percent)
    }
}

/// No-op implementation for callers that do not track progress
pub struct NoOpProgress;

impl UploadProgress for NoOpProgress {
    fn report(&self, _stage: UploadStage, _percent: u8) {}
}

/// Integer percentage of `done` over `total`, clamped to 100. An empty
/// payload counts as complete.
pub fn percent_complete(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
