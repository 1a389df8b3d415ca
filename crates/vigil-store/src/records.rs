use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One enrolled face profile. At most one active profile exists per owner;
/// re-enrollment overwrites the active row, revocation clears the flag.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub owner_id: String,
    pub embedding_json: String,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

/// Decision status of a face detection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceStatus {
    Permitted,
    Denied,
    UnderReview,
    Error,
}

impl FaceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permitted => "permitted",
            Self::Denied => "denied",
            Self::UnderReview => "under_review",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "permitted" => Some(Self::Permitted),
            "denied" => Some(Self::Denied),
            "under_review" => Some(Self::UnderReview),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Decision status of a plate detection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateStatus {
    Authorized,
    NotAuthorized,
    Error,
}

impl PlateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::NotAuthorized => "not_authorized",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorized" => Some(Self::Authorized),
            "not_authorized" => Some(Self::NotAuthorized),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Direction of a vehicle-gate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Entry,
    Exit,
}

impl AccessType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(Self::Entry),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Append-only record of one face recognition attempt.
#[derive(Debug, Clone)]
pub struct FaceEvent {
    pub id: String,
    pub owner_id: Option<String>,
    /// 0–100.
    pub confidence: f32,
    pub is_resident: bool,
    pub status: FaceStatus,
    pub camera_location: String,
    pub timestamp: DateTime<Utc>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
}

/// Append-only record of one plate detection attempt.
#[derive(Debug, Clone)]
pub struct PlateEvent {
    pub id: String,
    pub raw_text: Option<String>,
    pub plate: Option<String>,
    pub vehicle_id: Option<String>,
    /// 0–100.
    pub confidence: f32,
    pub is_authorized: bool,
    pub status: PlateStatus,
    pub access_type: AccessType,
    pub camera_location: String,
    pub timestamp: DateTime<Utc>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
}

/// Kind of a security escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    IntruderDetected,
    PlateNotAuthorized,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntruderDetected => "intruder_detected",
            Self::PlateNotAuthorized => "plate_not_authorized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intruder_detected" => Some(Self::IntruderDetected),
            "plate_not_authorized" => Some(Self::PlateNotAuthorized),
            _ => None,
        }
    }
}

/// Alert severity, reviewed later by a human workflow outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A security escalation raised from a negative detection outcome.
/// Exactly one of `face_event_id` / `plate_event_id` is set.
#[derive(Debug, Clone)]
pub struct SecurityAlert {
    pub id: String,
    pub kind: AlertKind,
    pub face_event_id: Option<String>,
    pub plate_event_id: Option<String>,
    pub severity: Severity,
    pub description: String,
    pub reviewed: bool,
    pub reviewer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate counters over a rolling window.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionStats {
    pub face_recognitions: i64,
    pub residents_detected: i64,
    pub plate_detections: i64,
    pub unauthorized_plates: i64,
    /// High and critical alerts only.
    pub security_alerts: i64,
    pub enrolled_profiles: i64,
}
