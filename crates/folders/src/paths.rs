//! Download root and per-platform directory helpers.

use std::path::{Path, PathBuf};

use crate::{FolderError, PlatformFolderMap};

/// Resolves the default download root: `$HOME/ROMs`.
pub fn default_download_root() -> PathBuf {
    crate::home_dir().join(crate::DEFAULT_DOWNLOAD_DIR)
}

/// Directory downloads for `platform_slug` land in under `root`.
pub fn platform_dir(root: &Path, folders: &PlatformFolderMap, platform_slug: &str) -> PathBuf {
    root.join(folders.resolve(platform_slug))
}

/// Ensures the directory exists, creating it if necessary.
///
/// Returns the canonicalized path.
pub fn ensure_dir(path: &Path) -> Result<PathBuf, FolderError> {
    std::fs::create_dir_all(path)?;
    Ok(std::fs::canonicalize(path)?)
}

/// Expands `~` prefix to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        crate::home_dir().join(rest)
    } else if path == "~" {
        crate::home_dir()
    } else {
        PathBuf::from(path)
    }
}
