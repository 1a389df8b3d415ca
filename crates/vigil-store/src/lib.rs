//! vigil-store — SQLite persistence for the detection engine.
//!
//! Owns the enrolled profile store and the append-only audit tables
//! (face events, plate events, security alerts). The embedding cache in
//! the daemon is a derived projection of this store and holds no
//! independent truth.

pub mod records;
pub mod store;

pub use records::{
    AccessType, AlertKind, DetectionStats, FaceEvent, FaceStatus, PlateEvent, PlateStatus,
    Profile, SecurityAlert, Severity,
};
pub use store::{SqliteStore, StoreError};
