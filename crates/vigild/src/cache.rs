//! In-memory mirror of active profile embeddings.
//!
//! A derived, disposable projection of the profile store: `reload` replaces
//! the snapshot with an atomic swap, so concurrent readers always observe
//! either the old or the new gallery, never a partial one. The cache is not
//! auto-invalidated — every mutating profile operation must call `reload`
//! afterwards, and other service instances converge only when they reload
//! their own caches. That staleness window is an accepted trade-off: access
//! decisions are transient and corrected on the next detection attempt.

use std::sync::{Arc, PoisonError, RwLock};

use vigil_core::GalleryEntry;
use vigil_store::{SqliteStore, StoreError};

/// Clone-safe, injectable cache handle. Clones share one snapshot.
#[derive(Clone, Default)]
pub struct EmbeddingCache {
    snapshot: Arc<RwLock<Arc<Vec<GalleryEntry>>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repopulate the cache from all active profiles, replacing the
    /// previous snapshot atomically. Returns the number of entries loaded.
    pub fn reload(&self, store: &SqliteStore) -> Result<usize, StoreError> {
        let entries = Arc::new(store.gallery()?);
        let count = entries.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = entries;
        tracing::info!(profiles = count, "embedding cache reloaded");
        Ok(count)
    }

    /// Current gallery snapshot. Read-only and safe to call concurrently;
    /// the returned `Arc` stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<Vec<GalleryEntry>> {
        Arc::clone(
            &self
                .snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
