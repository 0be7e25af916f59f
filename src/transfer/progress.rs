//! Progress samples derived from raw byte counts.
//!
//! Everything here is a pure function of its inputs so the same numbers can be
//! reproduced in tests and log output.

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lower bound for the elapsed-time divisor in throughput math.
pub const ELAPSED_EPSILON_SECS: f64 = 1e-3;

/// Percentage reported when nothing is expected to move.
pub const EMPTY_TRANSFER_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Bytes that arrived during this session (destination growth over baseline)
    pub bytes_transferred: u64,
    /// Current destination subtree size
    pub bytes_done: u64,
    /// Source snapshot size measured at session start
    pub bytes_expected: u64,
    pub percent: f64,
    pub throughput_bytes_per_sec: f64,
    pub elapsed: Duration,
}

impl ProgressSample {
    /// Elapsed time as `H:MM:SS`.
    pub fn elapsed_hms(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

impl fmt::Display for ProgressSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} | {:.2}% @ {}/s | {} elapsed",
            HumanBytes(self.bytes_done),
            HumanBytes(self.bytes_expected),
            self.percent,
            HumanBytes(self.throughput_bytes_per_sec as u64),
            self.elapsed_hms()
        )
    }
}

/// Compute one progress sample.
///
/// A destination that shrank below its baseline reports zero transferred
/// bytes rather than underflowing.
pub fn sample(
    bytes_done_now: u64,
    bytes_baseline: u64,
    bytes_expected: u64,
    elapsed: Duration,
) -> ProgressSample {
    let bytes_transferred = bytes_done_now.saturating_sub(bytes_baseline);
    let secs = elapsed.as_secs_f64().max(ELAPSED_EPSILON_SECS);
    let throughput = bytes_transferred as f64 / secs;

    let percent = if bytes_expected == 0 {
        EMPTY_TRANSFER_PERCENT
    } else {
        bytes_done_now as f64 * 100.0 / bytes_expected as f64
    };

    ProgressSample {
        bytes_transferred,
        bytes_done: bytes_done_now,
        bytes_expected,
        percent,
        throughput_bytes_per_sec: throughput,
        elapsed,
    }
}

/// `H:MM:SS` with unpadded hours.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Receives every progress sample of a session.
pub trait ProgressSink: Send + Sync {
    fn on_sample(&self, snapshot: &str, sample: &ProgressSample);

    /// Called once after both pipeline processes are terminal.
    fn on_finish(&self, _snapshot: &str) {}
}

/// Logs each sample as a structured `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_sample(&self, snapshot: &str, sample: &ProgressSample) {
        tracing::info!(
            snapshot,
            bytes_done = sample.bytes_done,
            bytes_total = sample.bytes_expected,
            percent = format_args!("{:.2}", sample.percent),
            throughput = format_args!("{:.0}", sample.throughput_bytes_per_sec),
            elapsed = %sample.elapsed_hms(),
            "{}: {}",
            snapshot,
            sample
        );
    }
}

/// Interactive progress bar, one per session.
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBarSink {
    fn on_sample(&self, snapshot: &str, sample: &ProgressSample) {
        self.bar.set_prefix(snapshot.to_string());
        self.bar.set_length(sample.bytes_expected.max(sample.bytes_done));
        self.bar.set_position(sample.bytes_done);
        self.bar.set_message(format!(
            "{:.2}% @ {}/s {}",
            sample.percent,
            HumanBytes(sample.throughput_bytes_per_sec as u64),
            sample.elapsed_hms()
        ));
    }

    fn on_finish(&self, _snapshot: &str) {
        self.bar.finish_and_clear();
        self.bar.reset();
    }
}
