// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Half-open aggregation windows.

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

use super::time::{Timestamp, MINUTE_MS};

/// Granularity of the quarter-hour rollup schedule.
pub const GRANULARITY_QUARTER_HOUR: u32 = 15;
/// Granularity of the hourly rollup schedule.
pub const GRANULARITY_HOUR: u32 = 60;
/// Granularity of the daily rollup schedule.
pub const GRANULARITY_DAY: u32 = 1440;

/// A half-open interval `[start, end)` of ingestion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    /// Create a window, rejecting an end before the start.
    pub fn new(start: Timestamp, end: Timestamp) -> TelemetryResult<Self> {
        if end < start {
            return Err(TelemetryError::invalid(
                "windowEnd",
                format!("window end {end} precedes window start {start}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// The boundary-aligned window of `granularity_min` minutes containing `ts`.
    ///
    /// The aggregator never aligns windows itself; this is for schedulers and
    /// tooling that pick which window to aggregate.
    pub fn aligned_containing(ts: Timestamp, granularity_min: u32) -> TelemetryResult<Self> {
        let width = granularity_width_ms(granularity_min)?;
        let start = ts.div_euclid(width) * width;
        Ok(Self {
            start,
            end: start + width,
        })
    }

    /// The most recent fully elapsed aligned window before `now`.
    pub fn last_completed(now: Timestamp, granularity_min: u32) -> TelemetryResult<Self> {
        let current = Self::aligned_containing(now, granularity_min)?;
        let width = current.end - current.start;
        Ok(Self {
            start: current.start - width,
            end: current.start,
        })
    }

    /// Whether `ts` falls inside the window.
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Width of the window in milliseconds.
    pub fn width_ms(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Validate a granularity and return its width in milliseconds.
pub fn granularity_width_ms(granularity_min: u32) -> TelemetryResult<i64> {
    if granularity_min == 0 {
        return Err(TelemetryError::invalid(
            "granularityMin",
            "granularity must be at least one minute",
        ));
    }
    Ok(i64::from(granularity_min) * MINUTE_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::time::HOUR_MS;

    #[test]
    fn test_window_half_open() {
        let window = TimeWindow::new(1_000, 2_000).unwrap();
        assert!(window.contains(1_000));
        assert!(window.contains(1_999));
        assert!(!window.contains(2_000));
        assert!(!window.contains(999));
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let err = TimeWindow::new(2_000, 1_000).unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_zero_width_window_is_empty() {
        let window = TimeWindow::new(5, 5).unwrap();
        assert!(window.is_empty());
        assert!(!window.contains(5));
    }

    #[test]
    fn test_aligned_containing() {
        let ts = 3 * HOUR_MS + 22 * MINUTE_MS;
        let window = TimeWindow::aligned_containing(ts, GRANULARITY_QUARTER_HOUR).unwrap();
        assert_eq!(window.start, 3 * HOUR_MS + 15 * MINUTE_MS);
        assert_eq!(window.end, 3 * HOUR_MS + 30 * MINUTE_MS);

        let hour = TimeWindow::aligned_containing(ts, GRANULARITY_HOUR).unwrap();
        assert_eq!(hour.start, 3 * HOUR_MS);
        assert_eq!(hour.width_ms(), HOUR_MS);
    }

    #[test]
    fn test_last_completed() {
        let now = 3 * HOUR_MS + 22 * MINUTE_MS;
        let window = TimeWindow::last_completed(now, GRANULARITY_HOUR).unwrap();
        assert_eq!(window.start, 2 * HOUR_MS);
        assert_eq!(window.end, 3 * HOUR_MS);
    }

    #[test]
    fn test_zero_granularity_rejected() {
        assert!(TimeWindow::aligned_containing(0, 0).is_err());
        assert!(granularity_width_ms(0).is_err());
    }
}
