//! Terminal progress rendering for pipeline reports.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rommend_protocol::ProgressSink;

const BAR_TEMPLATE: &str = "{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {wide_msg}";
const BAR_CHARS: &str = "=>-";

/// Progress sink drawing one indicatif bar per item.
///
/// Percentages map to the bar position; `-1` (unknown total) leaves the
/// bar where it is and only updates the status text.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(title: &str) -> Self {
        Self::with_bar(ProgressBar::new(100), title)
    }

    fn with_bar(bar: ProgressBar, title: &str) -> Self {
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars(BAR_CHARS));
        }
        bar.set_prefix(title.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Removes the bar so the final status line can be printed cleanly.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn report(&self, percentage: i32, status: &str) {
        if percentage >= 0 {
            self.bar.set_position(percentage.min(100) as u64);
        }
        self.bar.set_message(status.to_string());
    }
}
