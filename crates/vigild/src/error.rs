use thiserror::Error;
use vigil_store::StoreError;

/// Failures surfaced to callers of the detection service.
///
/// Decision-relevant outcomes (no face in a detection image, no plate
/// candidate) are absorbed into the event/alert pipeline and never appear
/// here; these variants cover infrastructure failures and enrollment-time
/// validation.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("image could not be decoded: {0}")]
    InvalidImageFormat(String),
    /// Remote extraction failed before producing an outcome (network error,
    /// timeout, non-success response). No event is recorded for the request.
    #[error("extraction worker unavailable: {0}")]
    ExtractorUnavailable(String),
    /// Local extraction pipeline error during enrollment.
    #[error("feature extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("no face detected in enrollment image")]
    NoFaceDetected,
    #[error("owner not found: {0}")]
    OwnerNotFound(String),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("owner {0} already has an active profile")]
    DuplicateActiveProfile(String),
    /// Profile image upload failed. Aborts enrollment only; detection
    /// events degrade to a null image reference instead.
    #[error("image upload failed: {0}")]
    StorageUploadFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
