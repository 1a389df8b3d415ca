//! vigild — Access-control detection and decision engine.
//!
//! Takes a captured image, derives a face-match or plate candidate, decides
//! whether to grant access, persists an auditable detection event, and
//! escalates a security alert on a negative outcome. Feature extraction and
//! OCR are external collaborators, reached either in-process or through a
//! remote worker.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod gateway;
pub mod registry;
pub mod service;
pub mod storage;

pub use cache::EmbeddingCache;
pub use engine::{spawn_engine, EngineHandle};
pub use error::ServiceError;
pub use service::{DetectionService, ServiceOptions};
