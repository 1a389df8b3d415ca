//! Read-only lookups into the registries owned by the surrounding
//! administration application.
//!
//! The vehicle and resident tables are written by the admin CRUD layer;
//! this module only reads them, over its own connection so the detection
//! store's connection stays single-owner. A missing table or failed query
//! degrades to "not found" with a warning rather than failing the
//! detection request.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::collaborators::{Resident, ResidentDirectory, VehicleRecord, VehicleRegistry};

pub struct SqliteVehicleRegistry {
    conn: Connection,
}

impl SqliteVehicleRegistry {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }
}

impl VehicleRegistry for SqliteVehicleRegistry {
    fn find_by_plate(&self, plate: &str) -> Option<VehicleRecord> {
        let result = self
            .conn
            .query_row(
                "SELECT id, description, active FROM vehicles WHERE plate = ?1 COLLATE NOCASE",
                params![plate],
                |row| {
                    Ok(VehicleRecord {
                        id: row.get(0)?,
                        description: row.get(1)?,
                        active: row.get(2)?,
                    })
                },
            )
            .optional();
        match result {
            Ok(vehicle) => vehicle,
            Err(err) => {
                tracing::warn!(plate, error = %err, "vehicle registry lookup failed");
                None
            }
        }
    }
}

pub struct SqliteResidentDirectory {
    conn: Connection,
}

impl SqliteResidentDirectory {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }
}

impl ResidentDirectory for SqliteResidentDirectory {
    fn find_owner(&self, owner_id: &str) -> Option<Resident> {
        let result = self
            .conn
            .query_row(
                "SELECT id, name, email FROM residents WHERE id = ?1",
                params![owner_id],
                |row| {
                    Ok(Resident {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional();
        match result {
            Ok(resident) => resident,
            Err(err) => {
                tracing::warn!(owner_id, error = %err, "resident directory lookup failed");
                None
            }
        }
    }
}
