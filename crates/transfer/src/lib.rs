//! Streaming single-payload transfer with bounded retry and progress tracking.
//!
//! The [`TransferEngine`] pulls a remote payload through a [`PayloadSource`]
//! and writes it chunk by chunk to a local file, emitting one
//! [`TransferProgress`](rommend_protocol::TransferProgress) per chunk.
//! Transient read errors are retried in place on the same stream; the engine
//! never restarts a payload from byte 0 once bytes have been written.

mod engine;
mod progress;
mod source;

pub use engine::{RetryPolicy, TransferEngine, TransferOutcome};
pub use progress::{ProgressMeter, percentage};
pub use source::{OpenedPayload, PayloadBody, PayloadSource};

/// Default chunk size: 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Smallest chunk the engine will read and write at a time: 64 KiB.
pub const MIN_CHUNK_SIZE: usize = 64 * 1024;

/// Errors reported by a [`PayloadSource`] while opening a payload.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The server answered with a non-success status. Not retried.
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// The connection could not be established. Retried.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Reasons a transfer ends in [`TransferOutcome::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("connection error: {0}")]
    Network(String),

    #[error("read failed after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("connection closed after {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
