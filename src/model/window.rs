use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Half-open interval `[start, end)` aligned to a multiple of its length
/// since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// The window that `now` falls into.
    pub fn containing(now: DateTime<Utc>, length: Duration) -> Self {
        let length_ms = length.as_millis() as i64;
        assert!(length_ms > 0, "window length must be > 0");

        let offset_ms = now.timestamp_millis().rem_euclid(length_ms);
        let sub_ms_nanos = i64::from(now.timestamp_subsec_nanos() % 1_000_000);
        let start =
            now - TimeDelta::milliseconds(offset_ms) - TimeDelta::nanoseconds(sub_ms_nanos);
        Self {
            start,
            end: start + TimeDelta::milliseconds(length_ms),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m-%d %H:%M"))
    }
}
