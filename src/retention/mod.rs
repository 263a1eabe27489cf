// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Retention sweeper.
//!
//! Each tier is one indexed range delete (`recorded_at < cutoff`, or
//! `window_start < cutoff` for rollups), all inside one transaction. Rows
//! are compared against their own timestamp, so a sweep running beside
//! ingestion never removes a freshly recorded row.

mod policy;

pub use policy::{RetentionCutoffs, RetentionPolicy};

#[cfg(feature = "telemetry")]
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TelemetryResult;
use crate::model::{Severity, SpanStatus, Timestamp};
use crate::store::{delete_events_before, delete_rollups_before, delete_spans_before, TelemetryStore};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepOutcome {
    pub deleted_spans: u64,
    pub deleted_events: u64,
    pub deleted_rollups: u64,
}

impl SweepOutcome {
    pub fn total(&self) -> u64 {
        self.deleted_spans + self.deleted_events + self.deleted_rollups
    }
}

impl TelemetryStore {
    /// Sweep with the default retention tiers.
    pub fn sweep(&mut self, now: Timestamp) -> TelemetryResult<SweepOutcome> {
        self.sweep_with(now, &RetentionPolicy::default())
    }

    /// Delete every row older than its tier's threshold relative to `now`.
    pub fn sweep_with(
        &mut self,
        now: Timestamp,
        policy: &RetentionPolicy,
    ) -> TelemetryResult<SweepOutcome> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let cutoffs = policy.cutoffs(now);

        let outcome = self.write(|tx| {
            let success_spans = delete_spans_before(tx, &SpanStatus::SUCCESS, cutoffs.success_spans)?;
            let failed_spans = delete_spans_before(tx, &SpanStatus::FAILURE, cutoffs.failed_spans)?;
            let low_events = delete_events_before(tx, &Severity::LOW, cutoffs.low_severity_events)?;
            let high_events = delete_events_before(tx, &Severity::HIGH, cutoffs.high_severity_events)?;
            let rollups = delete_rollups_before(tx, cutoffs.rollups)?;

            debug!(
                success_spans,
                failed_spans,
                low_events,
                high_events,
                rollups,
                "retention tiers swept"
            );

            Ok(SweepOutcome {
                deleted_spans: success_spans + failed_spans,
                deleted_events: low_events + high_events,
                deleted_rollups: rollups,
            })
        })?;

        info!(
            now,
            deleted_spans = outcome.deleted_spans,
            deleted_events = outcome.deleted_events,
            deleted_rollups = outcome.deleted_rollups,
            "retention sweep complete"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("retention.sweep", start.elapsed());
            GLOBAL_METRICS.record_rows_swept(outcome.total());
        }

        Ok(outcome)
    }
}
