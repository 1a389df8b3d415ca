//! Filesystem-backed blob store.
//!
//! Default [`BlobStore`] for standalone deployments: images land under a
//! root directory, one subdirectory per folder, named
//! `{prefix}_{uuid}.{ext}`. The public URL is a `file://` reference;
//! deployments fronting the directory with a web server substitute their
//! own base URL at the reverse proxy.

use std::fs;
use std::path::PathBuf;

use uuid::Uuid;

use crate::collaborators::{BlobError, BlobStore, StoredImage};

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, bytes: &[u8], folder: &str, prefix: &str) -> Result<StoredImage, BlobError> {
        let ext = image::guess_format(bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin");
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).map_err(|e| BlobError::Upload(e.to_string()))?;

        let name = format!("{prefix}_{}.{ext}", Uuid::new_v4());
        let path = dir.join(&name);
        fs::write(&path, bytes).map_err(|e| BlobError::Upload(e.to_string()))?;

        let path = path.to_string_lossy().into_owned();
        tracing::debug!(path = %path, "image stored");
        Ok(StoredImage {
            public_url: format!("file://{path}"),
            path,
        })
    }

    fn delete(&self, path: &str) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path, error = %err, "blob delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_then_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let stored = store.upload(b"not an image", "facial", "detection_gate").unwrap();
        assert!(stored.path.ends_with(".bin"));
        assert!(stored.public_url.starts_with("file://"));
        assert_eq!(fs::read(&stored.path).unwrap(), b"not an image");

        assert!(store.delete(&stored.path));
        assert!(!store.delete(&stored.path));
    }

    #[test]
    fn upload_detects_png_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let mut png = Vec::new();
        let img = image::RgbImage::new(1, 1);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let stored = store.upload(&png, "profiles", "user_1").unwrap();
        assert!(stored.path.ends_with(".png"));
    }
}
