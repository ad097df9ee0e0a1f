//! Platform folder resolution and download path helpers.
//!
//! Maps catalog platform slugs to the folder names a user's emulator
//! frontend expects, and builds the local paths downloads land in.

mod map;
mod paths;

pub use map::PlatformFolderMap;
pub use paths::{default_download_root, ensure_dir, expand_home, platform_dir};

/// Default download directory name under `$HOME`.
pub const DEFAULT_DOWNLOAD_DIR: &str = "ROMs";

/// Errors from loading the override file or preparing directories.
#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed platform folder file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the user's home directory.
fn home_dir() -> std::path::PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("/tmp"))
}
