// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The three write primitives.
//!
//! Each call validates its input before touching the database, so a
//! malformed request has no effect, and then writes inside one transaction.

#[cfg(feature = "telemetry")]
use std::time::Instant;

use tracing::debug;

use crate::error::TelemetryResult;
use crate::model::{EventInput, EventRowId, RollupInput, RollupRowId, SpanInput, SpanRowId};
use crate::store::{insert_event, upsert_rollup, upsert_span, TelemetryStore};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

impl TelemetryStore {
    /// Record a span, merging into an existing row with the same `span_id`.
    ///
    /// Returns the row id of the first call for this `span_id`, whether this
    /// call inserted or merged.
    pub fn record_span(&mut self, input: &SpanInput) -> TelemetryResult<SpanRowId> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        input.validate()?;
        let write = self.write(|tx| upsert_span(tx, input))?;

        debug!(
            span_id = %input.span_id,
            row_id = %write.id,
            status = %input.status,
            merged = !write.created,
            "span recorded"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("ingest.record_span", start.elapsed());
            GLOBAL_METRICS.record_span_ingested(write.created);
        }

        Ok(write.id)
    }

    /// Record an event. Every call appends a new row.
    pub fn record_event(&mut self, input: &EventInput) -> TelemetryResult<EventRowId> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        input.validate()?;
        let id = self.write(|tx| insert_event(tx, input))?;

        debug!(
            row_id = %id,
            event_type = %input.event_type,
            severity = %input.severity,
            "event recorded"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("ingest.record_event", start.elapsed());
            GLOBAL_METRICS.record_event_ingested();
        }

        Ok(id)
    }

    /// Write one rollup directly, replacing any row with the same key.
    pub fn record_rollup(&mut self, input: &RollupInput) -> TelemetryResult<RollupRowId> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        input.validate()?;
        let id = self.write(|tx| upsert_rollup(tx, input))?;

        debug!(
            row_id = %id,
            window_start = input.window_start,
            source = %input.source,
            operation = %input.operation,
            "rollup recorded"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("ingest.record_rollup", start.elapsed());
            GLOBAL_METRICS.record_rollups_written(1);
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;
    use crate::model::{CorrelationEnvelope, Severity, SpanStatus};

    fn store() -> TelemetryStore {
        TelemetryStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_open_then_close_lifecycle() {
        let mut store = store();
        let envelope = CorrelationEnvelope::for_trace("t-1").with_orchestration("orch-1", Some(1));

        let open = SpanInput::new("s-1", "t-1", "orchestrator", "phase.run", 1_000, SpanStatus::Open, 1_000)
            .with_envelope(envelope)
            .with_attrs(r#"{"phase":"plan"}"#);
        let id = store.record_span(&open).unwrap();

        let close = SpanInput::new("s-1", "t-1", "orchestrator", "phase.run", 1_000, SpanStatus::Error, 1_800)
            .with_ended_at(1_800)
            .with_duration(800)
            .with_error("E_TIMEOUT", "upstream took too long");
        assert_eq!(store.record_span(&close).unwrap(), id);

        let stored = store.get_span("s-1").unwrap().unwrap();
        assert_eq!(stored.status, SpanStatus::Error);
        assert_eq!(stored.envelope.orchestration_id.as_deref(), Some("orch-1"));
        assert_eq!(stored.attrs.as_deref(), Some(r#"{"phase":"plan"}"#));
        assert_eq!(stored.error_code.as_deref(), Some("E_TIMEOUT"));
        assert_eq!(stored.duration_ms, Some(800));
    }

    #[test]
    fn test_retrying_final_call_is_safe() {
        let mut store = store();
        let done = SpanInput::new("s-2", "t-1", "worker", "task.exec", 0, SpanStatus::Ok, 10).with_duration(10);

        let first = store.record_span(&done).unwrap();
        let retry = store.record_span(&done).unwrap();

        assert_eq!(first, retry);
        assert_eq!(store.counts().unwrap().spans, 1);
    }

    #[test]
    fn test_malformed_span_writes_nothing() {
        let mut store = store();
        let bad = SpanInput::new("", "t-1", "worker", "task.exec", 0, SpanStatus::Ok, 10);

        let err = store.record_span(&bad).unwrap_err();
        assert!(matches!(err, TelemetryError::MissingField("spanId")));
        assert_eq!(store.counts().unwrap().spans, 0);
    }

    #[test]
    fn test_attrs_are_stored_verbatim() {
        let mut store = store();
        let event = EventInput::new("t-1", "reviewer", "review.note", Severity::Info, "hi", 5)
            .with_attrs("{not valid json");

        store.record_event(&event).unwrap();

        let stored = store.events_for_trace("t-1").unwrap();
        assert_eq!(stored[0].attrs.as_deref(), Some("{not valid json"));
    }

    #[test]
    fn test_malformed_event_writes_nothing() {
        let mut store = store();
        let event = EventInput::new("", "reviewer", "review.note", Severity::Info, "hi", 5);

        assert!(store.record_event(&event).unwrap_err().is_malformed_input());
        assert_eq!(store.counts().unwrap().events, 0);
    }

    #[test]
    fn test_record_rollup_validates() {
        let mut store = store();
        let rollup = RollupInput {
            window_start: 0,
            window_end: 900_000,
            granularity_min: 0,
            source: "worker".to_string(),
            operation: "task.exec".to_string(),
            orchestration_id: None,
            phase_number: None,
            span_count: 1,
            error_count: 0,
            event_count: 0,
            p95_duration_ms: None,
            max_duration_ms: None,
        };

        assert!(store.record_rollup(&rollup).unwrap_err().is_malformed_input());

        let valid = RollupInput {
            granularity_min: 15,
            ..rollup
        };
        let id = store.record_rollup(&valid).unwrap();
        assert_eq!(store.record_rollup(&valid).unwrap(), id);
    }
}
