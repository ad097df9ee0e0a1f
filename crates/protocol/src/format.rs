//! Human-readable formatting for status strings.

use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Formats a remaining-time estimate: `"1h 5m"`, `"3m 20s"` or `"42s"`.
pub fn format_eta(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else if minutes >= 1 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Formats a transfer rate in MB/s with one decimal.
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{:.1} MB/s", bytes_per_second / MIB)
}

/// Formats a byte count in MB with one decimal.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / MIB)
}
