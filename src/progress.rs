//! Progress reporting by compressed bytes consumed.
//!
//! Percent and ETA are best-effort: the bz2 stream does not compress evenly.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub struct BuildProgress {
    bar: ProgressBar,
    start: Instant,
}

impl BuildProgress {
    /// A bar over `total_bytes` of compressed input, or a spinner when the
    /// size is unknown.
    pub fn new(total_bytes: Option<u64>, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else if let Some(total) = total_bytes {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% ETA {eta} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        };
        BuildProgress { bar, start: Instant::now() }
    }

    pub fn hidden() -> Self {
        BuildProgress { bar: ProgressBar::hidden(), start: Instant::now() }
    }

    pub fn update(&self, bytes_consumed: u64, pages: u64, kept: u64) {
        if self.bar.is_hidden() {
            return;
        }
        let elapsed = self.start.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { pages as f64 / elapsed } else { 0.0 };
        self.bar.set_position(bytes_consumed);
        self.bar.set_message(format!("pages {} kept {} rate {:.0}/s", pages, kept, rate));
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// `3725s` -> `1h02m05s`.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod progress_tests {
    use super::*;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(7)), "7s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h02m05s");
    }

    #[test]
    fn hidden_bar_ignores_updates() {
        let progress = BuildProgress::new(Some(100), true);
        progress.update(50, 10, 1);
        progress.finish();
    }
}
