//! Synthetic progress for conversions.
//!
//! The service reports nothing until a conversion finishes, so progress is
//! estimated from the declared file size under a fixed throughput assumption.
//! The first 10% is credited as soon as the request is sent and the estimate
//! never passes 90%; only a confirmed result moves an item to 100%.

use std::time::Duration;

/// Credited the moment a conversion request is issued.
pub const REQUEST_SENT_PERCENT: f64 = 10.0;

/// Highest value an estimate may reach.
pub const ESTIMATE_CEILING_PERCENT: f64 = 90.0;

/// Assumed service throughput in MB/s.
pub const ASSUMED_THROUGHPUT_MB_PER_SEC: f64 = 0.5;

/// Shortest total duration any estimate assumes.
pub const MIN_ESTIMATED_SECONDS: f64 = 1.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub percent: f64,
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
}

/// Expected total conversion time for a file of `declared_size` bytes.
pub fn estimated_total_seconds(declared_size: u64) -> f64 {
    let megabytes = declared_size as f64 / BYTES_PER_MB;
    (megabytes / ASSUMED_THROUGHPUT_MB_PER_SEC).max(MIN_ESTIMATED_SECONDS)
}

pub fn estimate(declared_size: u64, elapsed: Duration) -> Estimate {
    let total = estimated_total_seconds(declared_size);
    let elapsed_seconds = elapsed.as_secs_f64();
    let filled = (elapsed_seconds / total) * (ESTIMATE_CEILING_PERCENT - REQUEST_SENT_PERCENT);

    Estimate {
        percent: (REQUEST_SENT_PERCENT + filled).min(ESTIMATE_CEILING_PERCENT),
        elapsed_seconds,
        remaining_seconds: (total - elapsed_seconds).max(0.0),
    }
}

/// Source of progress estimates for in-flight conversions.
pub trait ProgressModel: Send + Sync {
    fn estimate(&self, declared_size: u64, elapsed: Duration) -> Estimate;
}

/// Linear fill at [`ASSUMED_THROUGHPUT_MB_PER_SEC`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearEstimate;

impl ProgressModel for LinearEstimate {
    fn estimate(&self, declared_size: u64, elapsed: Duration) -> Estimate {
        estimate(declared_size, elapsed)
    }
}
