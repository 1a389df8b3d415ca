//! SQLite-backed store for profiles, detection events, and alerts.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;
use vigil_core::{Embedding, GalleryEntry};

use crate::records::{
    AlertKind, DetectionStats, FaceEvent, PlateEvent, Profile, SecurityAlert, Severity,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("embedding serialization: {0}")]
    Embedding(#[from] serde_json::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    id            TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    embedding     TEXT NOT NULL,
    image_path    TEXT,
    image_url     TEXT,
    active        INTEGER NOT NULL DEFAULT 1,
    registered_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_one_active
    ON profiles(owner_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS face_events (
    id              TEXT PRIMARY KEY,
    owner_id        TEXT,
    confidence      REAL NOT NULL,
    is_resident     INTEGER NOT NULL,
    status          TEXT NOT NULL,
    camera_location TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    image_path      TEXT,
    image_url       TEXT
);
CREATE INDEX IF NOT EXISTS idx_face_events_timestamp ON face_events(timestamp);

CREATE TABLE IF NOT EXISTS plate_events (
    id              TEXT PRIMARY KEY,
    raw_text        TEXT,
    plate           TEXT,
    vehicle_id      TEXT,
    confidence      REAL NOT NULL,
    is_authorized   INTEGER NOT NULL,
    status          TEXT NOT NULL,
    access_type     TEXT NOT NULL,
    camera_location TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    image_path      TEXT,
    image_url       TEXT
);
CREATE INDEX IF NOT EXISTS idx_plate_events_timestamp ON plate_events(timestamp);

CREATE TABLE IF NOT EXISTS security_alerts (
    id             TEXT PRIMARY KEY,
    kind           TEXT NOT NULL,
    face_event_id  TEXT REFERENCES face_events(id),
    plate_event_id TEXT REFERENCES plate_events(id),
    severity       TEXT NOT NULL,
    description    TEXT NOT NULL,
    reviewed       INTEGER NOT NULL DEFAULT 0,
    reviewer       TEXT,
    timestamp      TEXT NOT NULL,
    CHECK ((face_event_id IS NULL) <> (plate_event_id IS NULL))
);
CREATE INDEX IF NOT EXISTS idx_security_alerts_timestamp ON security_alerts(timestamp);
";

/// Store handle over a single SQLite connection.
///
/// Event inserts are independent, append-only writes; no transaction spans
/// an event and its alert, but the service always writes the event first so
/// the alert's foreign key resolves.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // --- Profiles ---

    /// Enroll or re-enroll an owner. An existing active profile is
    /// overwritten in place; otherwise a new row is created. Returns the
    /// stored profile. Callers must reload the embedding cache afterwards.
    pub fn upsert_profile(
        &self,
        owner_id: &str,
        embedding: &Embedding,
        image_path: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<Profile, StoreError> {
        let embedding_json = serde_json::to_string(&embedding.values)?;
        let now = Utc::now();

        if let Some(existing) = self.find_active_profile_by_owner(owner_id)? {
            self.conn.execute(
                "UPDATE profiles
                 SET embedding = ?1, image_path = ?2, image_url = ?3, registered_at = ?4
                 WHERE id = ?5",
                params![embedding_json, image_path, image_url, rfc3339(now), existing.id],
            )?;
            tracing::info!(owner_id, profile_id = %existing.id, "profile re-enrolled");
            return Ok(Profile {
                embedding_json,
                image_path: image_path.map(str::to_owned),
                image_url: image_url.map(str::to_owned),
                registered_at: now,
                ..existing
            });
        }

        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            embedding_json,
            image_path: image_path.map(str::to_owned),
            image_url: image_url.map(str::to_owned),
            active: true,
            registered_at: now,
        };
        self.conn.execute(
            "INSERT INTO profiles (id, owner_id, embedding, image_path, image_url, active, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
            params![
                profile.id,
                profile.owner_id,
                profile.embedding_json,
                profile.image_path,
                profile.image_url,
                rfc3339(now),
            ],
        )?;
        tracing::info!(owner_id, profile_id = %profile.id, "profile enrolled");
        Ok(profile)
    }

    /// The active profile for an owner, if any.
    pub fn find_active_profile_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Option<Profile>, StoreError> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, owner_id, embedding, image_path, image_url, active, registered_at
                 FROM profiles WHERE owner_id = ?1 AND active = 1",
                params![owner_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// Look up a profile by id regardless of active flag.
    pub fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, StoreError> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, owner_id, embedding, image_path, image_url, active, registered_at
                 FROM profiles WHERE id = ?1",
                params![profile_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// Clear the active flag on a profile (logical removal). Returns the
    /// prior record so the caller can purge its stored image, or `None` if
    /// no such active profile exists.
    pub fn deactivate_profile(&self, profile_id: &str) -> Result<Option<Profile>, StoreError> {
        let Some(profile) = self.get_profile(profile_id)? else {
            return Ok(None);
        };
        if !profile.active {
            return Ok(None);
        }
        self.conn.execute(
            "UPDATE profiles SET active = 0 WHERE id = ?1",
            params![profile_id],
        )?;
        tracing::info!(profile_id, owner_id = %profile.owner_id, "profile revoked");
        Ok(Some(profile))
    }

    /// All active profiles as gallery entries for the embedding cache.
    /// Rows with an unparsable embedding are skipped with a warning rather
    /// than failing the whole reload.
    pub fn gallery(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, embedding FROM profiles WHERE active = 1 ORDER BY registered_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (profile_id, owner_id, embedding_json) = row?;
            match serde_json::from_str::<Vec<f32>>(&embedding_json) {
                Ok(values) => entries.push(GalleryEntry {
                    profile_id,
                    owner_id,
                    embedding: Embedding::new(values),
                }),
                Err(err) => {
                    tracing::warn!(profile_id, error = %err, "skipping profile with corrupt embedding");
                }
            }
        }
        Ok(entries)
    }

    // --- Detection events (append-only) ---

    pub fn insert_face_event(&self, event: &FaceEvent) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO face_events
                 (id, owner_id, confidence, is_resident, status, camera_location,
                  timestamp, image_path, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.owner_id,
                event.confidence as f64,
                event.is_resident,
                event.status.as_str(),
                event.camera_location,
                rfc3339(event.timestamp),
                event.image_path,
                event.image_url,
            ],
        )?;
        Ok(())
    }

    pub fn insert_plate_event(&self, event: &PlateEvent) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO plate_events
                 (id, raw_text, plate, vehicle_id, confidence, is_authorized, status,
                  access_type, camera_location, timestamp, image_path, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                event.id,
                event.raw_text,
                event.plate,
                event.vehicle_id,
                event.confidence as f64,
                event.is_authorized,
                event.status.as_str(),
                event.access_type.as_str(),
                event.camera_location,
                rfc3339(event.timestamp),
                event.image_path,
                event.image_url,
            ],
        )?;
        Ok(())
    }

    // --- Security alerts ---

    pub fn insert_alert(&self, alert: &SecurityAlert) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO security_alerts
                 (id, kind, face_event_id, plate_event_id, severity, description,
                  reviewed, reviewer, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                alert.id,
                alert.kind.as_str(),
                alert.face_event_id,
                alert.plate_event_id,
                alert.severity.as_str(),
                alert.description,
                alert.reviewed,
                alert.reviewer,
                rfc3339(alert.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Alerts raised at or after `since`, newest first. Consumed by the
    /// external review workflow.
    pub fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityAlert>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, face_event_id, plate_event_id, severity, description,
                    reviewed, reviewer, timestamp
             FROM security_alerts WHERE timestamp >= ?1 ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map(params![rfc3339(since)], alert_from_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    // --- Statistics ---

    /// Aggregate counters for detections at or after `since`.
    pub fn detection_stats(&self, since: DateTime<Utc>) -> Result<DetectionStats, StoreError> {
        let since = rfc3339(since);
        let count = |sql: &str| -> Result<i64, StoreError> {
            Ok(self
                .conn
                .query_row(sql, params![since], |row| row.get(0))?)
        };

        Ok(DetectionStats {
            face_recognitions: count(
                "SELECT COUNT(*) FROM face_events WHERE timestamp >= ?1",
            )?,
            residents_detected: count(
                "SELECT COUNT(*) FROM face_events WHERE timestamp >= ?1 AND is_resident = 1",
            )?,
            plate_detections: count(
                "SELECT COUNT(*) FROM plate_events WHERE timestamp >= ?1",
            )?,
            unauthorized_plates: count(
                "SELECT COUNT(*) FROM plate_events WHERE timestamp >= ?1 AND is_authorized = 0",
            )?,
            security_alerts: count(
                "SELECT COUNT(*) FROM security_alerts
                 WHERE timestamp >= ?1 AND severity IN ('high', 'critical')",
            )?,
            enrolled_profiles: self
                .conn
                .query_row("SELECT COUNT(*) FROM profiles WHERE active = 1", [], |row| {
                    row.get(0)
                })?,
        })
    }
}

/// RFC 3339 in UTC; lexicographic order matches chronological order, which
/// the timestamp-range queries rely on.
fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        embedding_json: row.get(2)?,
        image_path: row.get(3)?,
        image_url: row.get(4)?,
        active: row.get(5)?,
        registered_at: parse_ts(6, row.get(6)?)?,
    })
}

fn alert_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecurityAlert> {
    let kind: String = row.get(1)?;
    let severity: String = row.get(4)?;
    Ok(SecurityAlert {
        id: row.get(0)?,
        kind: AlertKind::parse(&kind).ok_or_else(|| bad_text(1, &kind))?,
        face_event_id: row.get(2)?,
        plate_event_id: row.get(3)?,
        severity: Severity::parse(&severity).ok_or_else(|| bad_text(4, &severity))?,
        description: row.get(5)?,
        reviewed: row.get(6)?,
        reviewer: row.get(7)?,
        timestamp: parse_ts(8, row.get(8)?)?,
    })
}

fn bad_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unrecognized value: {value}").into(),
    )
}
