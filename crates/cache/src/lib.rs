//! Disk cache for cover images and the last fetched catalog listing.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/cover_images/<id>.img
//! <root>/roms_list.json
//! ```
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed into place, so readers never observe a partially written entry.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rommend_protocol::CatalogItem;
use rommend_protocol::constants::{CATALOG_LIST_FILE, COVER_IMAGES_DIR};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Errors from cache writes. Reads never fail; they miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The catalog listing as last saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub saved_at: DateTime<Utc>,
    pub items: Vec<CatalogItem>,
}

/// Id-keyed content cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    /// Opens the cache at `root`, creating its directory structure if
    /// possible. A cache that cannot be created simply misses.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let cache = Self { root: root.into() };
        if let Err(e) = cache.ensure_layout() {
            warn!(root = %cache.root.display(), error = %e, "cannot create cache directory");
        }
        cache
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn covers_dir(&self) -> PathBuf {
        self.root.join(COVER_IMAGES_DIR)
    }

    /// File holding the cover for catalog item `id`.
    pub fn cover_path(&self, id: u64) -> PathBuf {
        self.covers_dir().join(format!("{id}.img"))
    }

    /// Returns the cached bytes for `id`, or `None` on any miss or read error.
    pub fn get(&self, id: u64) -> Option<Vec<u8>> {
        let path = self.cover_path(id);
        match std::fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(id, error = %e, "cache miss");
                None
            }
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.cover_path(id).is_file()
    }

    /// Stores `data` for `id`, replacing any previous entry atomically.
    pub fn put(&self, id: u64, data: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.cover_path(id);
        write_atomic(&path, data)?;
        debug!(id, bytes = data.len(), "cached");
        Ok(path)
    }

    /// Removes every cached entry and recreates the empty layout.
    /// Failures are logged and otherwise ignored.
    pub fn clear(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(root = %self.root.display(), error = %e, "failed to clear cache");
            }
        }
        if let Err(e) = self.ensure_layout() {
            warn!(root = %self.root.display(), error = %e, "failed to recreate cache");
        }
    }

    /// Total bytes stored under the cache root.
    pub fn size(&self) -> u64 {
        let mut size = 0u64;
        walk_dir(&self.root, &mut size);
        size
    }

    /// Persists the catalog listing with the current timestamp.
    pub fn save_catalog(&self, items: &[CatalogItem]) -> Result<(), CacheError> {
        let snapshot = CatalogSnapshot {
            saved_at: Utc::now(),
            items: items.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(&self.root.join(CATALOG_LIST_FILE), &json)?;
        debug!(items = items.len(), "catalog listing cached");
        Ok(())
    }

    /// Loads the last saved listing. Missing or malformed files yield `None`.
    pub fn load_catalog(&self) -> Option<CatalogSnapshot> {
        let path = self.root.join(CATALOG_LIST_FILE);
        let data = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed catalog cache");
                None
            }
        }
    }

    fn ensure_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.covers_dir())
    }
}

/// Writes through a temp file in the same directory, then renames.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Recursively sums file sizes.
fn walk_dir(dir: &Path, size: &mut u64) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_dir(&path, size);
        } else if let Ok(meta) = entry.metadata() {
            *size += meta.len();
        }
    }
}
