//! Hour-bucket alignment and rolling-window definitions.
//!
//! All bucket math operates on epoch milliseconds (absolute instants), never
//! on wall-clock components, so bucket boundaries are identical across
//! deployments regardless of host timezone.

use chrono::{DateTime, Duration, Utc};

// ============================================
// Constants
// ============================================

/// Milliseconds in one hour, the width of an aggregation bucket.
pub const HOUR_MILLIS: i64 = 3_600_000;

// ============================================
// Rolling Windows
// ============================================

/// Named rolling windows over which bucket totals are summed.
///
/// This list is a closed contract shared by the aggregator, the pair volume
/// fields and the persisted rollup records. Adding a window requires a
/// coordinated change to all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Hour1,
    Hour24,
    Day7,
    Day30,
    Year1,
}

impl Window {
    /// Fixed ordered list of all windows, shortest first.
    pub const ALL: [Window; 5] = [
        Window::Hour1,
        Window::Hour24,
        Window::Day7,
        Window::Day30,
        Window::Year1,
    ];

    /// Window length in hours.
    pub fn hours(self) -> u32 {
        match self {
            Window::Hour1 => 1,
            Window::Hour24 => 24,
            Window::Day7 => 168,
            Window::Day30 => 720,
            Window::Year1 => 8760,
        }
    }

    /// Window length as a chrono duration.
    pub fn duration(self) -> Duration {
        Duration::hours(self.hours() as i64)
    }

    /// Inclusive lower bound of the window relative to an anchor instant.
    pub fn start(self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        anchor - self.duration()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Hour1 => "1h",
            Window::Hour24 => "24h",
            Window::Day7 => "7d",
            Window::Day30 => "30d",
            Window::Year1 => "1y",
        }
    }
}

// ============================================
// Bucket Alignment
// ============================================

/// Floor an instant to the start of its hour bucket.
///
/// Truncates on epoch milliseconds, so the result is timezone-independent
/// and stable for instants before the epoch as well.
///
/// # Arguments
/// * `t` - The instant to align
///
/// # Returns
/// * The same instant with minutes, seconds and sub-seconds zeroed
pub fn floor_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let millis = t.timestamp_millis();
    let floored = millis - millis.rem_euclid(HOUR_MILLIS);
    DateTime::from_timestamp_millis(floored).unwrap_or(t)
}

/// Whether two instants fall into the same hour bucket.
///
/// Diagnostics only; aggregation correctness never depends on this.
pub fn is_same_hour(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    floor_to_hour(a) == floor_to_hour(b)
}
