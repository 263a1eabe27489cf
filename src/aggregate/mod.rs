// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rollup aggregation.
//!
//! An aggregation run recomputes every `(source, operation)` rollup of one
//! window from the raw store and upserts it. Runs never read previous
//! rollups, so re-running a window after late spans arrive simply replaces
//! the stored statistics.
//!
//! Window membership uses `recorded_at`, read through an indexed range query.

mod percentile;

pub use percentile::{percentile, DurationStats};

use std::collections::{BTreeMap, HashMap};
#[cfg(feature = "telemetry")]
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TelemetryResult;
use crate::model::{granularity_width_ms, RollupInput, SpanRecord, TimeWindow};
use crate::store::{count_events_by_source, spans_recorded_between, upsert_rollup, TelemetryStore};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Result of one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationOutcome {
    /// Rollups created or replaced, one per group with at least one span.
    pub rollups_created: u64,
}

#[derive(Default)]
struct GroupAccumulator {
    span_count: u64,
    error_count: u64,
    durations: Vec<i64>,
    orchestration_id: Option<String>,
    phase_number: Option<u32>,
}

impl GroupAccumulator {
    fn add(&mut self, span: &SpanRecord) {
        self.span_count += 1;
        if span.is_failure() {
            self.error_count += 1;
        }
        if let Some(duration) = span.duration_ms {
            self.durations.push(duration);
        }
        // Spans arrive oldest first, so the last one carrying a value wins.
        if span.envelope.orchestration_id.is_some() {
            self.orchestration_id.clone_from(&span.envelope.orchestration_id);
        }
        if span.envelope.phase_number.is_some() {
            self.phase_number = span.envelope.phase_number;
        }
    }
}

/// Build one rollup per `(source, operation)` group present in `spans`.
///
/// `events_by_source` counts every event in the window by source; each
/// group takes the count for its source regardless of operation. Sources
/// with events but no spans produce nothing.
pub fn compute_rollups(
    window: &TimeWindow,
    granularity_min: u32,
    spans: &[SpanRecord],
    events_by_source: &HashMap<String, u64>,
) -> Vec<RollupInput> {
    let mut groups: BTreeMap<(&str, &str), GroupAccumulator> = BTreeMap::new();
    for span in spans {
        groups
            .entry((span.source.as_str(), span.operation.as_str()))
            .or_default()
            .add(span);
    }

    groups
        .into_iter()
        .map(|((source, operation), mut group)| {
            let stats = DurationStats::from_durations(&mut group.durations);
            RollupInput {
                window_start: window.start,
                window_end: window.end,
                granularity_min,
                source: source.to_string(),
                operation: operation.to_string(),
                orchestration_id: group.orchestration_id,
                phase_number: group.phase_number,
                span_count: group.span_count,
                error_count: group.error_count,
                event_count: events_by_source.get(source).copied().unwrap_or(0),
                p95_duration_ms: stats.p95_duration_ms,
                max_duration_ms: stats.max_duration_ms,
            }
        })
        .collect()
}

impl TelemetryStore {
    /// Aggregate the spans and events recorded in `[window.start, window.end)`.
    ///
    /// The read and every upsert share one transaction. An empty window
    /// writes nothing and reports zero.
    pub fn aggregate(
        &mut self,
        window: &TimeWindow,
        granularity_min: u32,
    ) -> TelemetryResult<AggregationOutcome> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let window = TimeWindow::new(window.start, window.end)?;
        granularity_width_ms(granularity_min)?;

        let outcome = self.write(|tx| {
            let spans = spans_recorded_between(tx, &window)?;
            if spans.is_empty() {
                return Ok(AggregationOutcome::default());
            }

            let events = count_events_by_source(tx, &window)?;
            let rollups = compute_rollups(&window, granularity_min, &spans, &events);
            for rollup in &rollups {
                let id = upsert_rollup(tx, rollup)?;
                debug!(
                    row_id = %id,
                    source = %rollup.source,
                    operation = %rollup.operation,
                    spans = rollup.span_count,
                    errors = rollup.error_count,
                    "rollup upserted"
                );
            }

            Ok(AggregationOutcome {
                rollups_created: rollups.len() as u64,
            })
        })?;

        info!(
            window_start = window.start,
            window_end = window.end,
            granularity_min,
            rollups = outcome.rollups_created,
            "aggregation complete"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("aggregate.run", start.elapsed());
            GLOBAL_METRICS.record_rollups_written(outcome.rollups_created);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrelationEnvelope, SpanRowId, SpanStatus};

    fn record(source: &str, operation: &str, status: SpanStatus, duration: Option<i64>) -> SpanRecord {
        SpanRecord {
            id: SpanRowId(0),
            span_id: format!("{source}-{operation}"),
            envelope: CorrelationEnvelope::for_trace("t-1"),
            source: source.to_string(),
            operation: operation.to_string(),
            started_at: 0,
            ended_at: None,
            duration_ms: duration,
            status,
            error_code: None,
            error_detail: None,
            attrs: None,
            recorded_at: 0,
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::new(0, 900_000).unwrap()
    }

    #[test]
    fn test_groups_by_source_and_operation() {
        let spans = vec![
            record("a", "x", SpanStatus::Ok, Some(10)),
            record("a", "x", SpanStatus::Timeout, Some(30)),
            record("a", "y", SpanStatus::Cancelled, None),
            record("b", "x", SpanStatus::Open, None),
        ];
        let events = HashMap::from([("a".to_string(), 4), ("c".to_string(), 9)]);

        let rollups = compute_rollups(&window(), 15, &spans, &events);

        assert_eq!(rollups.len(), 3);
        let ax = &rollups[0];
        assert_eq!((ax.source.as_str(), ax.operation.as_str()), ("a", "x"));
        assert_eq!(ax.span_count, 2);
        assert_eq!(ax.error_count, 1);
        assert_eq!(ax.event_count, 4);
        assert_eq!(ax.max_duration_ms, Some(30));

        let ay = &rollups[1];
        assert_eq!(ay.error_count, 1);
        // Events are scoped to the source, not the operation.
        assert_eq!(ay.event_count, 4);
        assert!(ay.p95_duration_ms.is_none());
        assert!(ay.max_duration_ms.is_none());

        let bx = &rollups[2];
        assert_eq!(bx.error_count, 0);
        assert_eq!(bx.event_count, 0);
    }

    #[test]
    fn test_last_correlation_wins() {
        let mut first = record("a", "x", SpanStatus::Ok, None);
        first.envelope = first.envelope.with_orchestration("orch-1", Some(1));
        let mut second = record("a", "x", SpanStatus::Ok, None);
        second.envelope = second.envelope.with_orchestration("orch-2", None);
        let third = record("a", "x", SpanStatus::Ok, None);

        let rollups = compute_rollups(&window(), 15, &[first, second, third], &HashMap::new());

        assert_eq!(rollups[0].orchestration_id.as_deref(), Some("orch-2"));
        assert_eq!(rollups[0].phase_number, Some(1));
    }

    #[test]
    fn test_no_spans_no_rollups() {
        let events = HashMap::from([("a".to_string(), 3)]);
        assert!(compute_rollups(&window(), 15, &[], &events).is_empty());
    }

    #[test]
    fn test_aggregate_rejects_bad_arguments() {
        let mut store = TelemetryStore::open_in_memory().unwrap();
        assert!(store.aggregate(&window(), 0).unwrap_err().is_malformed_input());

        let backwards = TimeWindow { start: 10, end: 0 };
        assert!(store.aggregate(&backwards, 15).unwrap_err().is_malformed_input());
    }

    #[test]
    fn test_aggregate_empty_window() {
        let mut store = TelemetryStore::open_in_memory().unwrap();
        let outcome = store.aggregate(&window(), 15).unwrap();
        assert_eq!(outcome.rollups_created, 0);
        assert_eq!(store.counts().unwrap().rollups, 0);
    }
}
