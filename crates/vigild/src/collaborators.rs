//! Interfaces the detection engine requires from its external collaborators.
//!
//! The feature extractor, OCR recognizer, blob store, and the registries
//! owned by the surrounding administration application are all injected at
//! startup; tests substitute in-memory fakes.

use thiserror::Error;
use vigil_core::{Embedding, PlateCandidate};

/// Error from an in-process extractor or recognizer pipeline.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ExtractorError(pub String);

/// Outcome of running face extraction over an image. `NoFace` and
/// `NoEmbedding` are normal outcomes — extraction itself completed.
#[derive(Debug, Clone)]
pub enum FaceExtraction {
    Embedding(Embedding),
    /// No face located in the image.
    NoFace,
    /// A face was located but no usable embedding could be produced.
    NoEmbedding,
}

/// Biometric feature extractor: image bytes in, embedding out.
pub trait FeatureExtractor: Send {
    fn extract(&self, image: &[u8]) -> Result<FaceExtraction, ExtractorError>;
}

/// OCR text recognizer: image bytes in, ordered text candidates out.
/// Bounding boxes are dropped before candidates reach the decision logic.
pub trait OcrRecognizer: Send {
    fn read(&self, image: &[u8]) -> Result<Vec<PlateCandidate>, ExtractorError>;
}

/// Reference to an uploaded image.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub path: String,
    pub public_url: String,
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Image blob storage. Uploads of detection images may fail without
/// blocking event persistence; deletion is best-effort.
pub trait BlobStore: Send {
    fn upload(&self, bytes: &[u8], folder: &str, prefix: &str) -> Result<StoredImage, BlobError>;
    fn delete(&self, path: &str) -> bool;
}

/// A vehicle row from the registry owned by the surrounding application.
#[derive(Debug, Clone)]
pub struct VehicleRecord {
    pub id: String,
    pub description: String,
    pub active: bool,
}

/// Read-only vehicle lookup by plate code (case-insensitive exact match).
pub trait VehicleRegistry: Send {
    fn find_by_plate(&self, plate: &str) -> Option<VehicleRecord>;
}

/// A resident row from the user registry.
#[derive(Debug, Clone)]
pub struct Resident {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Read-only resident lookup by owner id.
pub trait ResidentDirectory: Send {
    fn find_owner(&self, owner_id: &str) -> Option<Resident>;
}
