//! Extraction gateway: local or remote dispatch to the feature extractor
//! and OCR recognizer.
//!
//! The two strategies deliberately differ in failure semantics. Locally,
//! "no face" or "no usable embedding" are completed extractions and flow
//! into the event recorder. Remotely, a network failure, timeout, or
//! non-success response means extraction never completed: the request
//! cannot be attributed to an outcome, no event is recorded, and the caller
//! gets a service-unavailable error.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use vigil_core::{Embedding, PlateCandidate};

use crate::collaborators::{FaceExtraction, FeatureExtractor, OcrRecognizer};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Local pipeline error. Extraction ran and broke; recorded as an
    /// error-status event.
    #[error("extraction failed: {0}")]
    Extraction(String),
    /// Remote worker unreachable, timed out, or returned a non-success
    /// status. Not recorded as an event.
    #[error("extraction worker unavailable: {0}")]
    Unavailable(String),
}

/// Uniform interface over the two extraction strategies.
pub trait ExtractionGateway: Send {
    fn extract_face(&self, image: &[u8]) -> Result<FaceExtraction, GatewayError>;
    fn read_plate(&self, image: &[u8]) -> Result<Vec<PlateCandidate>, GatewayError>;
}

/// In-process extraction via the wrapped extractor/recognizer libraries.
pub struct LocalGateway {
    extractor: Box<dyn FeatureExtractor>,
    recognizer: Box<dyn OcrRecognizer>,
}

impl LocalGateway {
    pub fn new(extractor: Box<dyn FeatureExtractor>, recognizer: Box<dyn OcrRecognizer>) -> Self {
        Self {
            extractor,
            recognizer,
        }
    }
}

impl ExtractionGateway for LocalGateway {
    fn extract_face(&self, image: &[u8]) -> Result<FaceExtraction, GatewayError> {
        self.extractor
            .extract(image)
            .map_err(|e| GatewayError::Extraction(e.to_string()))
    }

    fn read_plate(&self, image: &[u8]) -> Result<Vec<PlateCandidate>, GatewayError> {
        self.recognizer
            .read(image)
            .map_err(|e| GatewayError::Extraction(e.to_string()))
    }
}

// --- Remote worker wire format ---

#[derive(Deserialize)]
struct RemoteFaceResponse {
    face_found: bool,
    embedding: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct RemoteCandidate {
    text: String,
    confidence: f32,
}

#[derive(Deserialize)]
struct RemotePlateResponse {
    candidates: Vec<RemoteCandidate>,
}

/// Remote extraction worker reached over HTTP with a fixed timeout.
/// An in-flight call is abandoned on timeout, never retried here.
pub struct RemoteGateway {
    client: reqwest::blocking::Client,
    base_url: String,
}

/// Default remote worker timeout.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(60);

impl RemoteGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn post_image(&self, endpoint: &str, image: &[u8]) -> Result<reqwest::blocking::Response, GatewayError> {
        let part = reqwest::blocking::multipart::Part::bytes(image.to_vec()).file_name("capture");
        let form = reqwest::blocking::multipart::Form::new().part("image", part);
        let url = format!("{}/{endpoint}", self.base_url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "extraction worker request failed");
                GatewayError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url = %url, %status, "extraction worker returned non-success");
            return Err(GatewayError::Unavailable(format!(
                "{endpoint} returned {status}"
            )));
        }
        Ok(response)
    }
}

impl ExtractionGateway for RemoteGateway {
    fn extract_face(&self, image: &[u8]) -> Result<FaceExtraction, GatewayError> {
        let body: RemoteFaceResponse = self
            .post_image("extract_face", image)?
            .json()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(match (body.face_found, body.embedding) {
            // An empty vector is not a usable embedding, whatever the
            // worker claims.
            (true, Some(values)) if !values.is_empty() => {
                FaceExtraction::Embedding(Embedding::new(values))
            }
            (true, _) => FaceExtraction::NoEmbedding,
            (false, _) => FaceExtraction::NoFace,
        })
    }

    fn read_plate(&self, image: &[u8]) -> Result<Vec<PlateCandidate>, GatewayError> {
        let body: RemotePlateResponse = self
            .post_image("read_plate", image)?
            .json()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(body
            .candidates
            .into_iter()
            .map(|c| PlateCandidate {
                text: c.text,
                confidence: c.confidence,
            })
            .collect())
    }
}
