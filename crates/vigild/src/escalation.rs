//! Security escalation: the rule table mapping negative detection outcomes
//! to alerts.
//!
//! Alerts are written after the event row they reference, so the foreign
//! key always resolves. No deduplication: every qualifying event produces
//! its own alert, and flood control belongs to the review workflow.

use chrono::Utc;
use uuid::Uuid;
use vigil_store::{
    AlertKind, FaceEvent, FaceStatus, PlateEvent, PlateStatus, SecurityAlert, Severity,
    SqliteStore, StoreError,
};

/// Denied face event ⇒ `intruder_detected`, severity high.
pub fn escalate_face(
    store: &SqliteStore,
    event: &FaceEvent,
) -> Result<Option<SecurityAlert>, StoreError> {
    if event.status != FaceStatus::Denied {
        return Ok(None);
    }

    let alert = SecurityAlert {
        id: Uuid::new_v4().to_string(),
        kind: AlertKind::IntruderDetected,
        face_event_id: Some(event.id.clone()),
        plate_event_id: None,
        severity: Severity::High,
        description: format!(
            "Unidentified person detected at {}",
            event.camera_location
        ),
        reviewed: false,
        reviewer: None,
        timestamp: Utc::now(),
    };
    store.insert_alert(&alert)?;
    tracing::warn!(
        event_id = %event.id,
        camera_location = %event.camera_location,
        "intruder alert raised"
    );
    Ok(Some(alert))
}

/// Unauthorized plate event ⇒ `plate_not_authorized`, severity medium.
/// A detection with no plate at all does not escalate — the absence of a
/// vehicle is not itself suspicious.
pub fn escalate_plate(
    store: &SqliteStore,
    event: &PlateEvent,
) -> Result<Option<SecurityAlert>, StoreError> {
    let Some(plate) = event.plate.as_deref() else {
        return Ok(None);
    };
    if event.status != PlateStatus::NotAuthorized {
        return Ok(None);
    }

    let alert = SecurityAlert {
        id: Uuid::new_v4().to_string(),
        kind: AlertKind::PlateNotAuthorized,
        face_event_id: None,
        plate_event_id: Some(event.id.clone()),
        severity: Severity::Medium,
        description: format!(
            "Unauthorized plate detected: {plate} at {}",
            event.camera_location
        ),
        reviewed: false,
        reviewer: None,
        timestamp: Utc::now(),
    };
    store.insert_alert(&alert)?;
    tracing::warn!(
        event_id = %event.id,
        plate,
        camera_location = %event.camera_location,
        "unauthorized plate alert raised"
    );
    Ok(Some(alert))
}
