//! Shared types for the ROMMend media-library client.
//!
//! Holds the catalog wire type, the transfer request/progress records that
//! flow through the materialization pipeline, and the progress-sink seam
//! every pipeline stage reports through.

pub mod constants;
pub mod format;
pub mod progress;
pub mod types;

// Re-export primary types for convenience.
pub use progress::{NoProgress, ProgressSink};
pub use types::{CatalogItem, TransferProgress, TransferRequest};
