// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client-side span recording.
//!
//! A [`SpanRecorder`] records its span as `open` when started and re-records
//! the same span id with timing and a terminal status when finished. Both
//! calls go through the normal merge-patch ingestion path, so a finish that
//! is retried after a failure is harmless.
//!
//! ```rust,ignore
//! let span = SpanRecorder::start(&service, SpanStart::new(envelope, "orchestrator", "phase.run")).await?;
//! let review = span.child("phase.review").await?;
//! review.finish_ok().await?;
//! span.finish_err("E_REVIEW", "changes requested").await?;
//! ```

use std::time::Instant;

use tracing::warn;

use crate::error::TelemetryResult;
use crate::model::{new_span_id, now_ms, CorrelationEnvelope, SpanInput, SpanRowId, SpanStatus};
use crate::service::TelemetryService;

/// What to record when a span starts.
#[derive(Debug, Clone)]
pub struct SpanStart {
    pub envelope: CorrelationEnvelope,
    pub source: String,
    pub operation: String,
    pub attrs: Option<String>,
}

impl SpanStart {
    pub fn new(
        envelope: CorrelationEnvelope,
        source: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            envelope,
            source: source.into(),
            operation: operation.into(),
            attrs: None,
        }
    }

    pub fn with_attrs(mut self, attrs: impl Into<String>) -> Self {
        self.attrs = Some(attrs.into());
        self
    }
}

/// An open span. Finish it with [`finish`](Self::finish) or one of its shorthands.
pub struct SpanRecorder {
    service: TelemetryService,
    input: SpanInput,
    row_id: SpanRowId,
    started: Instant,
    finished: bool,
}

impl SpanRecorder {
    /// Generate a span id and record the span as `open`.
    pub async fn start(service: &TelemetryService, start: SpanStart) -> TelemetryResult<Self> {
        let now = now_ms();
        let mut input = SpanInput::new(
            new_span_id(),
            start.envelope.trace_id.clone(),
            start.source,
            start.operation,
            now,
            SpanStatus::Open,
            now,
        )
        .with_envelope(start.envelope);
        input.attrs = start.attrs;

        let row_id = service.record_span(&input).await?;

        Ok(Self {
            service: service.clone(),
            input,
            row_id,
            started: Instant::now(),
            finished: false,
        })
    }

    pub fn span_id(&self) -> &str {
        &self.input.span_id
    }

    pub fn trace_id(&self) -> &str {
        &self.input.envelope.trace_id
    }

    pub fn row_id(&self) -> SpanRowId {
        self.row_id
    }

    /// Start a span under this one, in the same trace and source.
    pub async fn child(&self, operation: impl Into<String>) -> TelemetryResult<SpanRecorder> {
        let envelope = self.input.envelope.clone().with_parent(self.input.span_id.clone());
        let start = SpanStart::new(envelope, self.input.source.clone(), operation);
        SpanRecorder::start(&self.service, start).await
    }

    /// Record the terminal status with the elapsed time.
    pub async fn finish(mut self, status: SpanStatus) -> TelemetryResult<SpanRowId> {
        self.close(status, None).await
    }

    pub async fn finish_ok(self) -> TelemetryResult<SpanRowId> {
        self.finish(SpanStatus::Ok).await
    }

    pub async fn finish_err(
        mut self,
        code: impl Into<String>,
        detail: impl Into<String>,
    ) -> TelemetryResult<SpanRowId> {
        self.close(SpanStatus::Error, Some((code.into(), detail.into())))
            .await
    }

    async fn close(
        &mut self,
        status: SpanStatus,
        error: Option<(String, String)>,
    ) -> TelemetryResult<SpanRowId> {
        let elapsed = self.started.elapsed().as_millis() as i64;
        let ended_at = now_ms();

        let mut closing = self.input.clone().with_ended_at(ended_at).with_duration(elapsed);
        closing.status = status;
        closing.recorded_at = ended_at;
        if let Some((code, detail)) = error {
            closing = closing.with_error(code, detail);
        }

        let id = self.service.record_span(&closing).await?;
        self.finished = true;
        Ok(id)
    }
}

impl Drop for SpanRecorder {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                span_id = %self.input.span_id,
                operation = %self.input.operation,
                "span dropped without finishing; it stays open"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(trace: &CorrelationEnvelope) -> SpanStart {
        SpanStart::new(trace.clone(), "orchestrator", "phase.run").with_attrs(r#"{"phase":1}"#)
    }

    #[tokio::test]
    async fn test_start_records_open_span() {
        let service = TelemetryService::in_memory().unwrap();
        let trace = CorrelationEnvelope::new_trace().with_orchestration("orch-1", Some(1));

        let span = SpanRecorder::start(&service, start(&trace)).await.unwrap();

        let stored = service.get_span(span.span_id()).await.unwrap().unwrap();
        assert_eq!(stored.status, SpanStatus::Open);
        assert!(stored.duration_ms.is_none());
        assert_eq!(stored.envelope.orchestration_id.as_deref(), Some("orch-1"));
        span.finish_ok().await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_closes_same_row() {
        let service = TelemetryService::in_memory().unwrap();
        let trace = CorrelationEnvelope::new_trace();

        let span = SpanRecorder::start(&service, start(&trace)).await.unwrap();
        let span_id = span.span_id().to_string();
        let open_row = span.row_id();

        let closed_row = span.finish_err("E_PLAN", "planner failed").await.unwrap();

        assert_eq!(closed_row, open_row);
        let stored = service.get_span(&span_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SpanStatus::Error);
        assert_eq!(stored.error_code.as_deref(), Some("E_PLAN"));
        assert!(stored.duration_ms.unwrap() >= 0);
        assert!(stored.ended_at.is_some());
        assert_eq!(stored.attrs.as_deref(), Some(r#"{"phase":1}"#));
        assert_eq!(service.counts().await.unwrap().spans, 1);
    }

    #[tokio::test]
    async fn test_child_links_to_parent() {
        let service = TelemetryService::in_memory().unwrap();
        let trace = CorrelationEnvelope::new_trace();

        let parent = SpanRecorder::start(&service, start(&trace)).await.unwrap();
        let child = parent.child("phase.review").await.unwrap();

        assert_eq!(child.trace_id(), parent.trace_id());
        let stored = service.get_span(child.span_id()).await.unwrap().unwrap();
        assert_eq!(stored.envelope.parent_span_id.as_deref(), Some(parent.span_id()));
        assert_eq!(stored.operation, "phase.review");

        child.finish(SpanStatus::Cancelled).await.unwrap();
        parent.finish_ok().await.unwrap();

        let spans = service.trace(&trace.trace_id).await.unwrap().spans;
        assert_eq!(spans.len(), 2);
    }
}
