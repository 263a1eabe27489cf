// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Retention tiers.

use chrono::Duration;

use crate::error::{TelemetryError, TelemetryResult};
use crate::model::Timestamp;

/// How long each class of row is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Spans that are `ok` or still `open`.
    pub success_spans: Duration,
    /// Spans that ended in `error`, `timeout`, or `cancelled`.
    pub failed_spans: Duration,
    /// `debug` and `info` events.
    pub low_severity_events: Duration,
    /// `warn` and `error` events.
    pub high_severity_events: Duration,
    /// Rollups, measured from their window start.
    pub rollups: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            success_spans: Duration::days(7),
            failed_spans: Duration::days(30),
            low_severity_events: Duration::days(7),
            high_severity_events: Duration::days(30),
            rollups: Duration::days(180),
        }
    }
}

impl RetentionPolicy {
    /// Build a policy from whole-day thresholds.
    pub fn from_days(
        success_spans: u32,
        failed_spans: u32,
        low_severity_events: u32,
        high_severity_events: u32,
        rollups: u32,
    ) -> TelemetryResult<Self> {
        let days = |field: &'static str, n: u32| {
            if n == 0 {
                Err(TelemetryError::invalid(field, "retention must be at least one day"))
            } else {
                Ok(Duration::days(i64::from(n)))
            }
        };

        Ok(Self {
            success_spans: days("successSpanDays", success_spans)?,
            failed_spans: days("failedSpanDays", failed_spans)?,
            low_severity_events: days("lowSeverityEventDays", low_severity_events)?,
            high_severity_events: days("highSeverityEventDays", high_severity_events)?,
            rollups: days("rollupDays", rollups)?,
        })
    }

    /// Per-tier cutoffs relative to `now`. Rows strictly older are expired.
    pub fn cutoffs(&self, now: Timestamp) -> RetentionCutoffs {
        let before = |ttl: Duration| now.saturating_sub(ttl.num_milliseconds());
        RetentionCutoffs {
            success_spans: before(self.success_spans),
            failed_spans: before(self.failed_spans),
            low_severity_events: before(self.low_severity_events),
            high_severity_events: before(self.high_severity_events),
            rollups: before(self.rollups),
        }
    }
}

/// Absolute cutoff timestamps for one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionCutoffs {
    pub success_spans: Timestamp,
    pub failed_spans: Timestamp,
    pub low_severity_events: Timestamp,
    pub high_severity_events: Timestamp,
    pub rollups: Timestamp,
}
