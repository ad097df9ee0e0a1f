//! Progress reporting seam shared by every pipeline stage.

use crate::types::TransferProgress;

/// Receives progress updates from the transfer and extraction stages.
///
/// Calls happen synchronously on the task doing the I/O, so implementations
/// must return quickly and hand heavier work off to another thread.
pub trait ProgressSink: Send + Sync {
    /// Reports a percentage (-1 when unknown) and a human-readable status.
    fn report(&self, percentage: i32, status: &str);

    /// Reports a full transfer snapshot. Defaults to [`report`](Self::report).
    fn transfer_progress(&self, progress: &TransferProgress) {
        self.report(progress.percentage, &progress.status);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(i32, &str) + Send + Sync,
{
    fn report(&self, percentage: i32, status: &str) {
        self(percentage, status)
    }
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percentage: i32, _status: &str) {}
}
