//! Materializes downloaded ZIP containers into per-title folders.
//!
//! Entry paths are sanitized before anything touches the disk: absolute
//! entries, symbolic links and anything resolving outside the destination
//! are skipped and reported instead of written.

mod error;
mod extract;
mod sanitize;

use std::path::{Path, PathBuf};

use rommend_protocol::constants::CONTAINER_EXTENSION;

pub use error::ExtractionError;
pub use extract::extract;

/// One container to unpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionJob {
    /// The downloaded container.
    pub source: PathBuf,
    /// Directory the entries are written under. Created if missing.
    pub destination: PathBuf,
    /// File name used for a single-entry container whose entry has no
    /// extension. Must be a single path component.
    pub base_name: String,
}

/// What an extraction wrote and what it refused to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub written: Vec<PathBuf>,
    /// Raw names of entries skipped as unsafe.
    pub skipped: Vec<String>,
}

/// Whether `path` names a container the materializer can unpack.
pub fn is_container(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}
