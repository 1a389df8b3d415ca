use std::path::PathBuf;

use thiserror::Error;
use vigil_core::SelectionStrategy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("VIGIL_EXTRACTION_MODE must be 'local' or 'remote', got {0:?}")]
    InvalidExtractionMode(String),
    #[error("VIGIL_PLATE_STRATEGY must be 'first' or 'best', got {0:?}")]
    InvalidPlateStrategy(String),
    #[error("VIGIL_EXTRACTION_MODE=remote requires VIGIL_WORKER_URL")]
    MissingWorkerUrl,
}

/// Which extraction strategy the daemon dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// In-process extractor/recognizer libraries supplied by the embedder.
    Local,
    /// Remote extraction worker over HTTP.
    Remote,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Path to the application database holding the vehicle and resident
    /// registries. Defaults to `db_path` for single-database deployments.
    pub registry_db_path: PathBuf,
    /// Root directory for the filesystem blob store.
    pub blob_root: PathBuf,
    pub extraction_mode: ExtractionMode,
    /// Base URL of the remote extraction worker.
    pub worker_url: Option<String>,
    /// Timeout for one remote extraction call, in seconds.
    pub worker_timeout_secs: u64,
    /// Face-match distance tolerance τ.
    pub face_tolerance: f32,
    /// Minimum OCR confidence for a plate candidate (exclusive).
    pub plate_confidence_threshold: f32,
    pub plate_strategy: SelectionStrategy,
}

impl Config {
    /// Load configuration from `VIGIL_*` environment variables.
    ///
    /// Fails fast on an unusable combination instead of silently disabling
    /// a capability: remote mode without a worker URL is a startup error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("VIGIL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share/vigil")
            });

        let db_path = std::env::var("VIGIL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("detections.db"));
        let registry_db_path = std::env::var("VIGIL_REGISTRY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| db_path.clone());
        let blob_root = std::env::var("VIGIL_BLOB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("images"));

        let extraction_mode = match std::env::var("VIGIL_EXTRACTION_MODE")
            .unwrap_or_else(|_| "remote".to_string())
            .as_str()
        {
            "local" => ExtractionMode::Local,
            "remote" => ExtractionMode::Remote,
            other => return Err(ConfigError::InvalidExtractionMode(other.to_string())),
        };

        let worker_url = std::env::var("VIGIL_WORKER_URL").ok();
        if extraction_mode == ExtractionMode::Remote && worker_url.is_none() {
            return Err(ConfigError::MissingWorkerUrl);
        }

        let plate_strategy = match std::env::var("VIGIL_PLATE_STRATEGY") {
            Ok(raw) => SelectionStrategy::parse(&raw)
                .ok_or_else(|| ConfigError::InvalidPlateStrategy(raw.clone()))?,
            Err(_) => SelectionStrategy::default(),
        };

        Ok(Self {
            db_path,
            registry_db_path,
            blob_root,
            extraction_mode,
            worker_url,
            worker_timeout_secs: env_u64("VIGIL_WORKER_TIMEOUT_SECS", 60),
            face_tolerance: env_f32("VIGIL_FACE_TOLERANCE", 0.6),
            plate_confidence_threshold: env_f32("VIGIL_PLATE_CONFIDENCE_THRESHOLD", 0.5),
            plate_strategy,
        })
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
