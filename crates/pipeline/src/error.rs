//! Pipeline error types.

/// Errors produced while materializing a catalog item.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("another item is already being materialized")]
    Busy,

    #[error("unsafe file or folder name: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Transfer(#[from] rommend_transfer::TransferError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] rommend_archive::ExtractionError),

    #[error("extraction task failed: {0}")]
    Task(String),
}
