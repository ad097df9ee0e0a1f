use std::time::{Duration, Instant};

use rommend_protocol::TransferProgress;
use rommend_protocol::format::{format_eta, format_megabytes, format_rate};

/// Percentage of `total` covered by `transferred`, floored and capped at 100.
///
/// Returns -1 when the total is unknown.
pub fn percentage(transferred: u64, total: Option<u64>) -> i32 {
    match total {
        Some(0) => 100,
        Some(total) => (transferred.saturating_mul(100) / total).min(100) as i32,
        None => -1,
    }
}

/// Derives progress snapshots for one transfer.
///
/// The rate is the average since the transfer started, and the remaining
/// time extrapolates that rate over the bytes still missing.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    started: Instant,
    total: Option<u64>,
}

impl ProgressMeter {
    /// Starts measuring now.
    pub fn start(total: Option<u64>) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    /// Total announced by the server, if any.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Snapshot for `transferred` bytes at the current instant.
    pub fn snapshot(&self, transferred: u64) -> TransferProgress {
        self.snapshot_at(transferred, self.started.elapsed())
    }

    /// Snapshot for `transferred` bytes after `elapsed`.
    pub fn snapshot_at(&self, transferred: u64, elapsed: Duration) -> TransferProgress {
        let secs = elapsed.as_secs_f64();
        let bytes_per_second = if secs > 0.0 {
            transferred as f64 / secs
        } else {
            0.0
        };

        let remaining = match self.total {
            Some(total) if bytes_per_second > 0.0 => {
                let missing = total.saturating_sub(transferred) as f64;
                Some(Duration::from_secs_f64(missing / bytes_per_second))
            }
            _ => None,
        };

        let percentage = percentage(transferred, self.total);
        let status = if percentage >= 0 {
            let eta = remaining.map_or_else(|| "--".to_string(), format_eta);
            format!(
                "{percentage}% - {} - ETA: {eta}",
                format_rate(bytes_per_second)
            )
        } else {
            format!(
                "{} - {}",
                format_megabytes(transferred),
                format_rate(bytes_per_second)
            )
        };

        TransferProgress {
            percentage,
            transferred,
            bytes_per_second,
            remaining,
            status,
        }
    }
}
