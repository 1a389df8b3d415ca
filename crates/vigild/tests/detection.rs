//! End-to-end detection scenarios over in-memory collaborators.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use vigil_core::{Embedding, PlateCandidate};
use vigil_store::{AccessType, AlertKind, FaceStatus, PlateStatus, Severity, SqliteStore};
use vigild::cache::EmbeddingCache;
use vigild::collaborators::{
    BlobError, BlobStore, ExtractorError, FaceExtraction, FeatureExtractor, OcrRecognizer,
    Resident, ResidentDirectory, StoredImage, VehicleRecord, VehicleRegistry,
};
use vigild::gateway::{ExtractionGateway, GatewayError, LocalGateway};
use vigild::service::{DetectionService, ServiceOptions};
use vigild::ServiceError;

// --- Fakes ---

/// Extractor fed a script of outcomes, consumed one per call.
struct ScriptedExtractor {
    script: Mutex<VecDeque<Result<FaceExtraction, ExtractorError>>>,
}

impl ScriptedExtractor {
    fn new(script: Vec<Result<FaceExtraction, ExtractorError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

impl FeatureExtractor for ScriptedExtractor {
    fn extract(&self, _image: &[u8]) -> Result<FaceExtraction, ExtractorError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(FaceExtraction::NoFace))
    }
}

struct FixedOcr {
    candidates: Vec<PlateCandidate>,
}

impl OcrRecognizer for FixedOcr {
    fn read(&self, _image: &[u8]) -> Result<Vec<PlateCandidate>, ExtractorError> {
        Ok(self.candidates.clone())
    }
}

/// Gateway standing in for an unreachable remote worker.
struct UnavailableGateway;

impl ExtractionGateway for UnavailableGateway {
    fn extract_face(&self, _image: &[u8]) -> Result<FaceExtraction, GatewayError> {
        Err(GatewayError::Unavailable("worker timed out".into()))
    }
    fn read_plate(&self, _image: &[u8]) -> Result<Vec<PlateCandidate>, GatewayError> {
        Err(GatewayError::Unavailable("worker timed out".into()))
    }
}

#[derive(Clone, Default)]
struct MemoryBlobStore {
    fail_uploads: bool,
    uploads: Arc<Mutex<Vec<String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, _bytes: &[u8], folder: &str, prefix: &str) -> Result<StoredImage, BlobError> {
        if self.fail_uploads {
            return Err(BlobError::Upload("bucket unreachable".into()));
        }
        let path = format!("{folder}/{prefix}.png");
        self.uploads.lock().unwrap().push(path.clone());
        Ok(StoredImage {
            public_url: format!("https://blobs.example/{path}"),
            path,
        })
    }

    fn delete(&self, path: &str) -> bool {
        self.deleted.lock().unwrap().push(path.to_string());
        true
    }
}

struct StaticVehicles {
    vehicles: Vec<(String, VehicleRecord)>,
}

impl VehicleRegistry for StaticVehicles {
    fn find_by_plate(&self, plate: &str) -> Option<VehicleRecord> {
        self.vehicles
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(plate))
            .map(|(_, v)| v.clone())
    }
}

struct StaticResidents;

impl ResidentDirectory for StaticResidents {
    fn find_owner(&self, owner_id: &str) -> Option<Resident> {
        match owner_id {
            "u1" => Some(Resident {
                id: "u1".into(),
                name: "Ana Flores".into(),
                email: "ana@example.com".into(),
            }),
            _ => None,
        }
    }
}

// --- Harness ---

#[derive(Default)]
struct Fixture {
    extractions: Vec<Result<FaceExtraction, ExtractorError>>,
    ocr_candidates: Vec<PlateCandidate>,
    vehicles: Vec<(String, VehicleRecord)>,
    fail_uploads: bool,
}

impl Fixture {
    fn build(self) -> (DetectionService, MemoryBlobStore) {
        let blobs = MemoryBlobStore {
            fail_uploads: self.fail_uploads,
            ..MemoryBlobStore::default()
        };
        let gateway = LocalGateway::new(
            Box::new(ScriptedExtractor::new(self.extractions)),
            Box::new(FixedOcr {
                candidates: self.ocr_candidates,
            }),
        );
        let service = DetectionService::new(
            SqliteStore::open_in_memory().unwrap(),
            EmbeddingCache::new(),
            Box::new(gateway),
            Box::new(blobs.clone()),
            Box::new(StaticVehicles {
                vehicles: self.vehicles,
            }),
            Box::new(StaticResidents),
            ServiceOptions::default(),
        )
        .unwrap();
        (service, blobs)
    }
}

fn embedding(values: &[f32]) -> Result<FaceExtraction, ExtractorError> {
    Ok(FaceExtraction::Embedding(Embedding::new(values.to_vec())))
}

fn vehicle(plate: &str, active: bool) -> (String, VehicleRecord) {
    (
        plate.to_string(),
        VehicleRecord {
            id: format!("v-{plate}"),
            description: "Gray sedan".into(),
            active,
        },
    )
}

fn png() -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn alerts(service: &DetectionService) -> Vec<vigil_store::SecurityAlert> {
    service
        .store()
        .alerts_since(chrono::Utc::now() - Duration::hours(1))
        .unwrap()
}

// --- Face scenarios ---

#[test]
fn enrolled_resident_is_permitted_with_full_confidence() {
    let (service, _) = Fixture {
        extractions: vec![embedding(&[0.1, 0.2, 0.3]), embedding(&[0.1, 0.2, 0.3])],
        ..Fixture::default()
    }
    .build();

    let registration = service.register_profile("u1", &png(), false).unwrap();
    assert_eq!(registration.owner.name, "Ana Flores");
    assert!(registration.image_url.is_some());

    let response = service.recognize_face(&png(), "North Gate").unwrap();
    assert_eq!(response.status, FaceStatus::Permitted);
    assert!(response.is_resident);
    assert_eq!(response.confidence, 100.0);
    assert_eq!(response.user.as_ref().unwrap().id, "u1");
    assert!(response.image_url.is_some());
    assert!(alerts(&service).is_empty());
}

#[test]
fn unknown_face_is_denied_and_raises_intruder_alert() {
    let (service, _) = Fixture {
        extractions: vec![embedding(&[0.0, 0.0]), embedding(&[1.0, 0.0])],
        ..Fixture::default()
    }
    .build();

    service.register_profile("u1", &png(), false).unwrap();
    // Probe at distance 1.0 from the only enrolled embedding.
    let response = service.recognize_face(&png(), "North Gate").unwrap();
    assert_eq!(response.status, FaceStatus::Denied);
    assert!(!response.is_resident);
    assert_eq!(response.confidence, 0.0);
    assert!(response.user.is_none());

    let alerts = alerts(&service);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::IntruderDetected);
    assert_eq!(alerts[0].severity, Severity::High);
    assert_eq!(alerts[0].face_event_id.as_deref(), Some(response.id.as_str()));
}

#[test]
fn truncated_probe_embedding_never_matches() {
    let (service, _) = Fixture {
        extractions: vec![embedding(&[0.1, 0.2, 0.3]), embedding(&[])],
        ..Fixture::default()
    }
    .build();

    service.register_profile("u1", &png(), false).unwrap();
    // A zero-length probe must not collapse to distance 0 against the
    // enrolled gallery.
    let response = service.recognize_face(&png(), "North Gate").unwrap();
    assert_eq!(response.status, FaceStatus::Denied);
    assert_eq!(response.confidence, 0.0);
    assert!(response.user.is_none());
}

#[test]
fn no_face_in_image_is_denied() {
    let (service, _) = Fixture {
        extractions: vec![Ok(FaceExtraction::NoFace)],
        ..Fixture::default()
    }
    .build();

    let response = service.recognize_face(&png(), "Lobby").unwrap();
    assert_eq!(response.status, FaceStatus::Denied);
    assert_eq!(alerts(&service).len(), 1);
}

#[test]
fn unusable_embedding_goes_under_review_without_alert() {
    let (service, _) = Fixture {
        extractions: vec![Ok(FaceExtraction::NoEmbedding)],
        ..Fixture::default()
    }
    .build();

    let response = service.recognize_face(&png(), "Lobby").unwrap();
    assert_eq!(response.status, FaceStatus::UnderReview);
    assert!(alerts(&service).is_empty());
}

#[test]
fn local_pipeline_error_records_error_event_without_alert() {
    let (service, _) = Fixture {
        extractions: vec![Err(ExtractorError("model crashed".into()))],
        ..Fixture::default()
    }
    .build();

    let response = service.recognize_face(&png(), "Lobby").unwrap();
    assert_eq!(response.status, FaceStatus::Error);
    assert!(alerts(&service).is_empty());

    let stats = service.detection_stats(Duration::hours(24)).unwrap();
    assert_eq!(stats.face_recognitions, 1);
}

#[test]
fn revoked_profile_no_longer_matches() {
    let (service, blobs) = Fixture {
        extractions: vec![embedding(&[0.5, 0.5]), embedding(&[0.5, 0.5])],
        ..Fixture::default()
    }
    .build();

    let registration = service.register_profile("u1", &png(), false).unwrap();
    service.revoke_profile(&registration.profile_id).unwrap();
    assert_eq!(blobs.deleted.lock().unwrap().len(), 1);

    let response = service.recognize_face(&png(), "North Gate").unwrap();
    assert_eq!(response.status, FaceStatus::Denied);
}

#[test]
fn storage_failure_still_records_the_event() {
    let (service, _) = Fixture {
        extractions: vec![Ok(FaceExtraction::NoFace)],
        fail_uploads: true,
        ..Fixture::default()
    }
    .build();

    let response = service.recognize_face(&png(), "Lobby").unwrap();
    assert_eq!(response.status, FaceStatus::Denied);
    assert!(response.image_url.is_none());

    let stats = service.detection_stats(Duration::hours(24)).unwrap();
    assert_eq!(stats.face_recognitions, 1);
}

#[test]
fn undecodable_image_is_rejected_before_extraction() {
    let (service, _) = Fixture::default().build();

    let err = service.recognize_face(b"not an image", "Lobby").unwrap_err();
    assert!(matches!(err, ServiceError::InvalidImageFormat(_)));

    // Rejected pre-extraction: no event was recorded.
    let stats = service.detection_stats(Duration::hours(24)).unwrap();
    assert_eq!(stats.face_recognitions, 0);
}

// --- Plate scenarios ---

#[test]
fn active_vehicle_plate_is_authorized_without_alert() {
    let (service, _) = Fixture {
        ocr_candidates: vec![PlateCandidate {
            text: "ABC1234".into(),
            confidence: 0.8,
        }],
        vehicles: vec![vehicle("ABC-1234", true)],
        ..Fixture::default()
    }
    .build();

    let response = service
        .detect_plate(&png(), "Parking", AccessType::Entry)
        .unwrap();
    assert_eq!(response.plate.as_deref(), Some("ABC-1234"));
    assert!(response.is_authorized);
    assert_eq!(response.status, PlateStatus::Authorized);
    assert_eq!(response.confidence, 80.0);
    assert_eq!(response.vehicle.as_ref().unwrap().status, "active");
    assert!(alerts(&service).is_empty());
}

#[test]
fn inactive_vehicle_is_unauthorized_and_raises_plate_alert() {
    let (service, _) = Fixture {
        ocr_candidates: vec![PlateCandidate {
            text: "ABC1234".into(),
            confidence: 0.8,
        }],
        vehicles: vec![vehicle("ABC-1234", false)],
        ..Fixture::default()
    }
    .build();

    let response = service
        .detect_plate(&png(), "Parking", AccessType::Entry)
        .unwrap();
    assert!(!response.is_authorized);
    assert_eq!(response.status, PlateStatus::NotAuthorized);
    assert_eq!(response.vehicle.as_ref().unwrap().status, "inactive");

    let alerts = alerts(&service);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::PlateNotAuthorized);
    assert_eq!(alerts[0].severity, Severity::Medium);
    assert_eq!(
        alerts[0].plate_event_id.as_deref(),
        Some(response.id.as_str())
    );
}

#[test]
fn unreadable_plate_records_event_but_no_alert() {
    let (service, _) = Fixture {
        ocr_candidates: vec![PlateCandidate {
            text: "%% parking only %%".into(),
            confidence: 0.9,
        }],
        ..Fixture::default()
    }
    .build();

    let response = service
        .detect_plate(&png(), "Parking", AccessType::Exit)
        .unwrap();
    assert!(response.plate.is_none());
    assert!(!response.is_authorized);
    assert_eq!(response.confidence, 0.0);
    assert!(alerts(&service).is_empty());

    let stats = service.detection_stats(Duration::hours(24)).unwrap();
    assert_eq!(stats.plate_detections, 1);
    assert_eq!(stats.unauthorized_plates, 1);
}

// --- Remote failure semantics ---

#[test]
fn unavailable_worker_surfaces_error_and_records_nothing() {
    let service = DetectionService::new(
        SqliteStore::open_in_memory().unwrap(),
        EmbeddingCache::new(),
        Box::new(UnavailableGateway),
        Box::new(MemoryBlobStore::default()),
        Box::new(StaticVehicles { vehicles: vec![] }),
        Box::new(StaticResidents),
        ServiceOptions::default(),
    )
    .unwrap();

    let err = service.recognize_face(&png(), "Lobby").unwrap_err();
    assert!(matches!(err, ServiceError::ExtractorUnavailable(_)));
    let err = service
        .detect_plate(&png(), "Parking", AccessType::Entry)
        .unwrap_err();
    assert!(matches!(err, ServiceError::ExtractorUnavailable(_)));

    let stats = service.detection_stats(Duration::hours(24)).unwrap();
    assert_eq!(stats.face_recognitions, 0);
    assert_eq!(stats.plate_detections, 0);
}

// --- Enrollment ---

#[test]
fn duplicate_active_profile_requires_replace() {
    let (service, blobs) = Fixture {
        extractions: vec![
            embedding(&[0.1]),
            embedding(&[0.2]),
            embedding(&[0.3]),
        ],
        ..Fixture::default()
    }
    .build();

    let first = service.register_profile("u1", &png(), false).unwrap();

    let err = service.register_profile("u1", &png(), false).unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateActiveProfile(_)));

    let second = service.register_profile("u1", &png(), true).unwrap();
    assert_eq!(first.profile_id, second.profile_id);
    // The superseded profile image was purged.
    assert_eq!(blobs.deleted.lock().unwrap().len(), 1);
}

#[test]
fn enrollment_rejects_unknown_owner_and_missing_face() {
    let (service, _) = Fixture {
        extractions: vec![Ok(FaceExtraction::NoFace)],
        ..Fixture::default()
    }
    .build();

    let err = service.register_profile("ghost", &png(), false).unwrap_err();
    assert!(matches!(err, ServiceError::OwnerNotFound(_)));

    let err = service.register_profile("u1", &png(), false).unwrap_err();
    assert!(matches!(err, ServiceError::NoFaceDetected));
    assert!(service
        .store()
        .find_active_profile_by_owner("u1")
        .unwrap()
        .is_none());
}

#[test]
fn enrollment_aborts_when_profile_upload_fails() {
    let (service, _) = Fixture {
        extractions: vec![embedding(&[0.1])],
        fail_uploads: true,
        ..Fixture::default()
    }
    .build();

    let err = service.register_profile("u1", &png(), false).unwrap_err();
    assert!(matches!(err, ServiceError::StorageUploadFailed(_)));
}

#[test]
fn revoking_unknown_profile_fails() {
    let (service, _) = Fixture::default().build();
    let err = service.revoke_profile("nope").unwrap_err();
    assert!(matches!(err, ServiceError::ProfileNotFound(_)));
}

// --- Engine ---

#[tokio::test]
async fn engine_handle_round_trips_requests() {
    let (service, _) = Fixture {
        extractions: vec![embedding(&[0.4, 0.4]), embedding(&[0.4, 0.4])],
        ..Fixture::default()
    }
    .build();
    let engine = vigild::spawn_engine(service);

    let registration = engine
        .register_profile("u1".into(), png(), false)
        .await
        .unwrap();
    assert!(!registration.profile_id.is_empty());

    let response = engine
        .recognize_face(png(), "North Gate".into())
        .await
        .unwrap();
    assert_eq!(response.status, FaceStatus::Permitted);

    let stats = engine.detection_stats(24).await.unwrap();
    assert_eq!(stats.face_recognitions, 1);
    assert_eq!(stats.enrolled_profiles, 1);
}
