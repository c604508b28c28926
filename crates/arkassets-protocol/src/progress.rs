//! Aggregate progress for a download batch
//!
//! Lanes bump three counters (`total`, `unzip`, `unpack`), each exactly once per
//! file whether the file succeeded or not, so a failing file never stalls the
//! visible progress. A short rolling log keeps the most recent status lines for
//! front ends that render their own view.

#![allow(clippy::cast_precision_loss)] // Display-only size formatting

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of lines kept in the rolling log
pub const DEFAULT_LOG_CAPACITY: usize = 64;

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Format a byte count in base 1024 with two decimals, e.g. `12.35MB`.
///
/// A unit is only left once the value exceeds 1024, so exactly 1024 bytes is
/// `1024.00B`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}

/// Batch stage tracked by a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// File finished, any outcome
    Total,
    /// Raw bytes saved
    Unzip,
    /// Extraction finished
    Unpack,
}

#[derive(Debug, Default)]
struct Counter {
    done: AtomicU64,
    target: AtomicU64,
}

/// Shared progress state
#[derive(Debug)]
pub struct Progress {
    total: Counter,
    unzip: Counter,
    unpack: Counter,
    downloaded_bytes: AtomicU64,
    log: Mutex<VecDeque<String>>,
    log_capacity: usize,
}

/// Point-in-time copy of [`Progress`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Files finished, any outcome
    pub total: u64,
    /// Files in the batch
    pub total_target: u64,
    /// Files past the save stage
    pub unzip: u64,
    /// Target for `unzip`
    pub unzip_target: u64,
    /// Files past the extraction stage
    pub unpack: u64,
    /// Target for `unpack`
    pub unpack_target: u64,
    /// Body bytes received so far
    pub downloaded_bytes: u64,
    /// Most recent log lines, oldest first
    pub recent: Vec<String>,
}

impl ProgressSnapshot {
    /// True once every counter reached its target
    pub fn is_complete(&self) -> bool {
        self.total >= self.total_target
            && self.unzip >= self.unzip_target
            && self.unpack >= self.unpack_target
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl Progress {
    /// Progress with a rolling log of `capacity` lines
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            total: Counter::default(),
            unzip: Counter::default(),
            unpack: Counter::default(),
            downloaded_bytes: AtomicU64::new(0),
            log: Mutex::new(VecDeque::with_capacity(capacity)),
            log_capacity: capacity,
        }
    }

    fn counter(&self, stage: Stage) -> &Counter {
        match stage {
            Stage::Total => &self.total,
            Stage::Unzip => &self.unzip,
            Stage::Unpack => &self.unpack,
        }
    }

    /// Start a batch of `files` files, resetting all counters
    pub fn begin(&self, files: u64) {
        for stage in [Stage::Total, Stage::Unzip, Stage::Unpack] {
            let counter = self.counter(stage);
            counter.done.store(0, Ordering::Relaxed);
            counter.target.store(files, Ordering::Relaxed);
        }
        self.downloaded_bytes.store(0, Ordering::Relaxed);
    }

    /// Count one file as finished for `stage`
    pub fn advance(&self, stage: Stage) {
        self.counter(stage).done.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to the downloaded byte count
    pub fn add_bytes(&self, bytes: u64) {
        self.downloaded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Current value of one counter
    pub fn get(&self, stage: Stage) -> u64 {
        self.counter(stage).done.load(Ordering::Relaxed)
    }

    /// Append a line to the rolling log, dropping the oldest when full
    pub fn log(&self, line: impl Into<String>) {
        if self.log_capacity == 0 {
            return;
        }
        let mut log = self.log.lock();
        if log.len() == self.log_capacity {
            log.pop_front();
        }
        log.push_back(line.into());
    }

    /// Copy the current state
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.get(Stage::Total),
            total_target: self.total.target.load(Ordering::Relaxed),
            unzip: self.get(Stage::Unzip),
            unzip_target: self.unzip.target.load(Ordering::Relaxed),
            unpack: self.get(Stage::Unpack),
            unpack_target: self.unpack.target.load(Ordering::Relaxed),
            downloaded_bytes: self.downloaded_bytes.load(Ordering::Relaxed),
            recent: self.log.lock().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00B");
        assert_eq!(format_size(1023), "1023.00B");
        assert_eq!(format_size(1024), "1024.00B");
        assert_eq!(format_size(1025), "1.00KB");
        assert_eq!(format_size(1024 * 1024), "1024.00KB");
        assert_eq!(format_size(12_949_135), "12.35MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00GB");
        assert_eq!(format_size(u64::MAX), "16.00EB");
    }

    #[test]
    fn test_counters_and_snapshot() {
        let progress = Progress::default();
        progress.begin(2);
        progress.advance(Stage::Unzip);
        progress.advance(Stage::Total);
        progress.add_bytes(500);

        let snap = progress.snapshot();
        assert_eq!(snap.total, 1);
        assert_eq!(snap.unzip, 1);
        assert_eq!(snap.unpack, 0);
        assert_eq!(snap.total_target, 2);
        assert_eq!(snap.downloaded_bytes, 500);
        assert!(!snap.is_complete());

        for stage in [Stage::Total, Stage::Unpack, Stage::Unpack, Stage::Unzip] {
            progress.advance(stage);
        }
        assert!(progress.snapshot().is_complete());
    }

    #[test]
    fn test_rolling_log_is_bounded() {
        let progress = Progress::with_log_capacity(3);
        for i in 0..5 {
            progress.log(format!("line {i}"));
        }
        assert_eq!(progress.snapshot().recent, vec!["line 2", "line 3", "line 4"]);
    }
}
