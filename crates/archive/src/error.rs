/// Errors that abort an extraction.
///
/// Unsafe entries are not errors; they end up in
/// [`ExtractionReport::skipped`](crate::ExtractionReport).
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive contains no files")]
    Empty,

    #[error("invalid base name: {0}")]
    InvalidBaseName(String),

    #[error("extraction cancelled")]
    Cancelled,
}
