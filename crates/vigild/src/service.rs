//! Detection service: orchestrates extraction, matching, authorization,
//! event recording, and escalation for one service instance.
//!
//! Every request that completes extraction persists exactly one event, even
//! when nothing was detected or the image upload failed. Infrastructure
//! failures that prevent extraction from completing surface as typed errors
//! and leave no event behind.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;
use vigil_core::{plate, DistanceMatcher, MatchResult, Matcher, SelectionStrategy};
use vigil_store::{
    AccessType, DetectionStats, FaceEvent, FaceStatus, PlateEvent, PlateStatus, SqliteStore,
};

use crate::cache::EmbeddingCache;
use crate::collaborators::{
    BlobStore, FaceExtraction, ResidentDirectory, StoredImage, VehicleRegistry,
};
use crate::error::ServiceError;
use crate::escalation;
use crate::gateway::{ExtractionGateway, GatewayError};

/// Tunables resolved from configuration.
pub struct ServiceOptions {
    /// Face-match distance tolerance τ.
    pub tolerance: f32,
    /// Minimum OCR confidence for a plate candidate (exclusive).
    pub plate_confidence_threshold: f32,
    pub plate_strategy: SelectionStrategy,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            tolerance: vigil_core::types::DEFAULT_TOLERANCE,
            plate_confidence_threshold: plate::DEFAULT_CONFIDENCE_THRESHOLD,
            plate_strategy: SelectionStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleInfo {
    pub id: String,
    pub description: String,
    pub status: String,
}

/// Response envelope for one face recognition attempt.
#[derive(Debug, Serialize)]
pub struct FaceDetectionResponse {
    pub id: String,
    pub is_resident: bool,
    pub user: Option<UserInfo>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub camera_location: String,
    pub status: FaceStatus,
    pub image_url: Option<String>,
}

/// Response envelope for one plate detection attempt.
#[derive(Debug, Serialize)]
pub struct PlateDetectionResponse {
    pub id: String,
    pub plate: Option<String>,
    pub is_authorized: bool,
    pub vehicle: Option<VehicleInfo>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub camera_location: String,
    pub access_type: AccessType,
    pub status: PlateStatus,
    pub image_url: Option<String>,
}

/// Result of a successful profile enrollment.
#[derive(Debug, Serialize)]
pub struct ProfileRegistration {
    pub profile_id: String,
    pub owner: UserInfo,
    pub image_url: Option<String>,
}

pub struct DetectionService {
    store: SqliteStore,
    cache: EmbeddingCache,
    gateway: Box<dyn ExtractionGateway>,
    blobs: Box<dyn BlobStore>,
    vehicles: Box<dyn VehicleRegistry>,
    residents: Box<dyn ResidentDirectory>,
    matcher: DistanceMatcher,
    plate_confidence_threshold: f32,
    plate_strategy: SelectionStrategy,
}

impl DetectionService {
    /// Wire a service instance and perform the initial cache load.
    pub fn new(
        store: SqliteStore,
        cache: EmbeddingCache,
        gateway: Box<dyn ExtractionGateway>,
        blobs: Box<dyn BlobStore>,
        vehicles: Box<dyn VehicleRegistry>,
        residents: Box<dyn ResidentDirectory>,
        options: ServiceOptions,
    ) -> Result<Self, ServiceError> {
        cache.reload(&store)?;
        Ok(Self {
            store,
            cache,
            gateway,
            blobs,
            vehicles,
            residents,
            matcher: DistanceMatcher {
                tolerance: options.tolerance,
            },
            plate_confidence_threshold: options.plate_confidence_threshold,
            plate_strategy: options.plate_strategy,
        })
    }

    /// Audit access to the underlying store (alert review, statistics).
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    // --- Face path ---

    /// Recognize a face in a captured image and decide access.
    pub fn recognize_face(
        &self,
        image: &[u8],
        camera_location: &str,
    ) -> Result<FaceDetectionResponse, ServiceError> {
        decode_check(image)?;

        let extraction = match self.gateway.extract_face(image) {
            Ok(extraction) => extraction,
            Err(GatewayError::Unavailable(msg)) => {
                // Extraction never completed; nothing to attribute, no event.
                return Err(ServiceError::ExtractorUnavailable(msg));
            }
            Err(GatewayError::Extraction(msg)) => {
                tracing::error!(camera_location, error = %msg, "face extraction pipeline failed");
                return self.record_face_event(None, FaceStatus::Error, image, camera_location);
            }
        };

        let (matched, status) = match extraction {
            FaceExtraction::Embedding(embedding) => {
                let snapshot = self.cache.snapshot();
                let result = self.matcher.compare(&embedding, &snapshot);
                tracing::info!(
                    camera_location,
                    matched = result.matched,
                    distance = result.distance,
                    "face compared against gallery"
                );
                if result.matched {
                    (Some(result), FaceStatus::Permitted)
                } else {
                    (None, FaceStatus::Denied)
                }
            }
            FaceExtraction::NoFace => (None, FaceStatus::Denied),
            FaceExtraction::NoEmbedding => (None, FaceStatus::UnderReview),
        };

        self.record_face_event(matched, status, image, camera_location)
    }

    /// Persist the face event, escalate if warranted, build the envelope.
    fn record_face_event(
        &self,
        matched: Option<MatchResult>,
        status: FaceStatus,
        image: &[u8],
        camera_location: &str,
    ) -> Result<FaceDetectionResponse, ServiceError> {
        let stored = self.upload_detection_image(
            image,
            "facial",
            &format!("detection_{}", slug(camera_location)),
        );

        let event = FaceEvent {
            id: Uuid::new_v4().to_string(),
            owner_id: matched.as_ref().and_then(|m| m.owner_id.clone()),
            confidence: matched.as_ref().map_or(0.0, |m| m.confidence),
            is_resident: status == FaceStatus::Permitted,
            status,
            camera_location: camera_location.to_string(),
            timestamp: Utc::now(),
            image_path: stored.as_ref().map(|s| s.path.clone()),
            image_url: stored.as_ref().map(|s| s.public_url.clone()),
        };
        self.store.insert_face_event(&event)?;
        escalation::escalate_face(&self.store, &event)?;

        let user = event
            .owner_id
            .as_deref()
            .and_then(|id| self.residents.find_owner(id))
            .map(|r| UserInfo {
                id: r.id,
                name: r.name,
                email: r.email,
            });

        Ok(FaceDetectionResponse {
            id: event.id,
            is_resident: event.is_resident,
            user,
            confidence: round2(event.confidence),
            timestamp: event.timestamp,
            camera_location: event.camera_location,
            status: event.status,
            image_url: event.image_url,
        })
    }

    // --- Plate path ---

    /// Detect a vehicle plate in a captured image and decide authorization.
    pub fn detect_plate(
        &self,
        image: &[u8],
        camera_location: &str,
        access_type: AccessType,
    ) -> Result<PlateDetectionResponse, ServiceError> {
        decode_check(image)?;

        let candidates = match self.gateway.read_plate(image) {
            Ok(candidates) => candidates,
            Err(GatewayError::Unavailable(msg)) => {
                return Err(ServiceError::ExtractorUnavailable(msg));
            }
            Err(GatewayError::Extraction(msg)) => {
                tracing::error!(camera_location, error = %msg, "plate OCR pipeline failed");
                return self.record_plate_event(
                    None,
                    None,
                    PlateStatus::Error,
                    image,
                    camera_location,
                    access_type,
                );
            }
        };

        let read = plate::select_plate(
            &candidates,
            self.plate_confidence_threshold,
            self.plate_strategy,
        );

        let (vehicle, status) = match &read {
            Some(read) => {
                let vehicle = self.vehicles.find_by_plate(&read.normalized);
                let authorized = vehicle.as_ref().is_some_and(|v| v.active);
                tracing::info!(
                    camera_location,
                    plate = %read.normalized,
                    authorized,
                    "plate validated against vehicle registry"
                );
                let status = if authorized {
                    PlateStatus::Authorized
                } else {
                    PlateStatus::NotAuthorized
                };
                (vehicle, status)
            }
            // No plate detected is unauthorized by definition.
            None => (None, PlateStatus::NotAuthorized),
        };

        self.record_plate_event(read, vehicle, status, image, camera_location, access_type)
    }

    fn record_plate_event(
        &self,
        read: Option<plate::PlateRead>,
        vehicle: Option<crate::collaborators::VehicleRecord>,
        status: PlateStatus,
        image: &[u8],
        camera_location: &str,
        access_type: AccessType,
    ) -> Result<PlateDetectionResponse, ServiceError> {
        let stored = self.upload_detection_image(
            image,
            "plates",
            &format!("{}_{}", access_type.as_str(), slug(camera_location)),
        );

        let event = PlateEvent {
            id: Uuid::new_v4().to_string(),
            raw_text: read.as_ref().map(|r| r.raw_text.clone()),
            plate: read.as_ref().map(|r| r.normalized.clone()),
            vehicle_id: vehicle.as_ref().map(|v| v.id.clone()),
            confidence: read.as_ref().map_or(0.0, |r| r.confidence * 100.0),
            is_authorized: status == PlateStatus::Authorized,
            status,
            access_type,
            camera_location: camera_location.to_string(),
            timestamp: Utc::now(),
            image_path: stored.as_ref().map(|s| s.path.clone()),
            image_url: stored.as_ref().map(|s| s.public_url.clone()),
        };
        self.store.insert_plate_event(&event)?;
        escalation::escalate_plate(&self.store, &event)?;

        Ok(PlateDetectionResponse {
            id: event.id,
            plate: event.plate,
            is_authorized: event.is_authorized,
            vehicle: vehicle.map(|v| VehicleInfo {
                id: v.id,
                description: v.description,
                status: if v.active { "active" } else { "inactive" }.to_string(),
            }),
            confidence: round2(event.confidence),
            timestamp: event.timestamp,
            camera_location: event.camera_location,
            access_type: event.access_type,
            status: event.status,
            image_url: event.image_url,
        })
    }

    // --- Profile lifecycle ---

    /// Enroll (or, with `replace`, re-enroll) a face profile for an owner.
    /// Reloads the embedding cache before returning.
    pub fn register_profile(
        &self,
        owner_id: &str,
        image: &[u8],
        replace: bool,
    ) -> Result<ProfileRegistration, ServiceError> {
        let resident = self
            .residents
            .find_owner(owner_id)
            .ok_or_else(|| ServiceError::OwnerNotFound(owner_id.to_string()))?;
        decode_check(image)?;

        let existing = self.store.find_active_profile_by_owner(owner_id)?;
        if existing.is_some() && !replace {
            return Err(ServiceError::DuplicateActiveProfile(owner_id.to_string()));
        }

        let embedding = match self.gateway.extract_face(image) {
            Ok(FaceExtraction::Embedding(embedding)) => embedding,
            Ok(FaceExtraction::NoFace | FaceExtraction::NoEmbedding) => {
                return Err(ServiceError::NoFaceDetected);
            }
            Err(GatewayError::Unavailable(msg)) => {
                return Err(ServiceError::ExtractorUnavailable(msg));
            }
            Err(GatewayError::Extraction(msg)) => {
                return Err(ServiceError::ExtractionFailed(msg));
            }
        };

        // Unlike detection events, enrollment requires the image upload.
        let stored = self
            .blobs
            .upload(image, "profiles", &format!("user_{owner_id}"))
            .map_err(|e| ServiceError::StorageUploadFailed(e.to_string()))?;

        // Purge the superseded profile image, best effort.
        if let Some(prior) = existing {
            if let Some(path) = prior.image_path.as_deref() {
                self.blobs.delete(path);
            }
        }

        let profile = self.store.upsert_profile(
            owner_id,
            &embedding,
            Some(&stored.path),
            Some(&stored.public_url),
        )?;
        self.cache.reload(&self.store)?;

        Ok(ProfileRegistration {
            profile_id: profile.id,
            owner: UserInfo {
                id: resident.id,
                name: resident.name,
                email: resident.email,
            },
            image_url: profile.image_url,
        })
    }

    /// Logically remove a profile and reload the embedding cache.
    pub fn revoke_profile(&self, profile_id: &str) -> Result<(), ServiceError> {
        let prior = self
            .store
            .deactivate_profile(profile_id)?
            .ok_or_else(|| ServiceError::ProfileNotFound(profile_id.to_string()))?;

        if let Some(path) = prior.image_path.as_deref() {
            self.blobs.delete(path);
        }
        self.cache.reload(&self.store)?;
        Ok(())
    }

    // --- Statistics ---

    /// Aggregate counters over the trailing `window`.
    pub fn detection_stats(&self, window: Duration) -> Result<DetectionStats, ServiceError> {
        Ok(self.store.detection_stats(Utc::now() - window)?)
    }

    /// Upload a detection image; failure degrades to a null reference so
    /// the event is still recorded.
    fn upload_detection_image(
        &self,
        image: &[u8],
        folder: &str,
        prefix: &str,
    ) -> Option<StoredImage> {
        match self.blobs.upload(image, folder, prefix) {
            Ok(stored) => Some(stored),
            Err(err) => {
                tracing::warn!(folder, error = %err, "image upload failed; recording event without image reference");
                None
            }
        }
    }
}

/// Reject payloads that are not a decodable image before extraction runs.
fn decode_check(image: &[u8]) -> Result<(), ServiceError> {
    image::load_from_memory(image)
        .map(|_| ())
        .map_err(|e| ServiceError::InvalidImageFormat(e.to_string()))
}

fn slug(location: &str) -> String {
    location.to_lowercase().replace(' ', "_")
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_replaces_spaces() {
        assert_eq!(slug("North Gate"), "north_gate");
        assert_eq!(slug("Parking"), "parking");
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(66.666_67), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn garbage_bytes_fail_the_decode_check() {
        assert!(matches!(
            decode_check(b"definitely not an image"),
            Err(ServiceError::InvalidImageFormat(_))
        ));
    }
}
