use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;
use vigil_store::SqliteStore;
use vigild::cache::EmbeddingCache;
use vigild::config::{Config, ExtractionMode};
use vigild::gateway::{ExtractionGateway, RemoteGateway};
use vigild::registry::{SqliteResidentDirectory, SqliteVehicleRegistry};
use vigild::service::{DetectionService, ServiceOptions};
use vigild::storage::FsBlobStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("vigild starting");

    let config = Config::from_env().context("invalid configuration")?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }

    // Wire collaborators up front and fail fast on an unusable configuration.
    let gateway: Box<dyn ExtractionGateway> =
        match (config.extraction_mode, config.worker_url.as_deref()) {
            (ExtractionMode::Remote, Some(url)) => {
                tracing::info!(
                    worker_url = url,
                    timeout_secs = config.worker_timeout_secs,
                    "using remote extraction worker"
                );
                Box::new(RemoteGateway::new(
                    url,
                    Duration::from_secs(config.worker_timeout_secs),
                )?)
            }
            (ExtractionMode::Remote, None) => bail!("remote extraction requires VIGIL_WORKER_URL"),
            (ExtractionMode::Local, _) => bail!(
                "local extraction requires embedding vigild as a library with in-process \
                 extractors; the standalone daemon supports VIGIL_EXTRACTION_MODE=remote"
            ),
        };

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
    let vehicles = SqliteVehicleRegistry::open(&config.registry_db_path)
        .context("failed to open vehicle registry")?;
    let residents = SqliteResidentDirectory::open(&config.registry_db_path)
        .context("failed to open resident directory")?;

    let service = DetectionService::new(
        store,
        EmbeddingCache::new(),
        gateway,
        Box::new(FsBlobStore::new(&config.blob_root)),
        Box::new(vehicles),
        Box::new(residents),
        ServiceOptions {
            tolerance: config.face_tolerance,
            plate_confidence_threshold: config.plate_confidence_threshold,
            plate_strategy: config.plate_strategy,
        },
    )?;

    // The engine handle is what a transport layer (HTTP, D-Bus, queue
    // consumer) clones to serve requests; wiring a transport is the
    // embedding application's job.
    let _engine = vigild::spawn_engine(service);
    tracing::info!("vigild ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("vigild shutting down");

    Ok(())
}
