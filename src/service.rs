// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shareable async façade over the store.
//!
//! [`TelemetryService`] is cheap to clone and safe to hand to many tasks.
//! Calls serialize on the store; each one is a single transaction.
//!
//! The five callables are available as typed methods and by name through
//! [`TelemetryService::dispatch`], which speaks the camelCase JSON payloads
//! that the orchestration backend and the scheduler send.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
#[cfg(feature = "telemetry")]
use tracing::instrument;
use tracing::warn;

use crate::aggregate::AggregationOutcome;
use crate::error::{TelemetryError, TelemetryResult};
use crate::model::{
    EventInput, EventRecord, EventRowId, RollupInput, RollupRecord, RollupRowId, SpanInput,
    SpanRecord, SpanRowId, TimeWindow, Timestamp,
};
use crate::retention::{RetentionPolicy, SweepOutcome};
use crate::store::{StoreCounts, TelemetryStore};

/// Names accepted by [`TelemetryService::dispatch`].
pub const OPERATIONS: [&str; 5] = [
    "recordSpan",
    "recordEvent",
    "recordRollup",
    "aggregateSpansIntoRollups",
    "cleanupExpiredTelemetry",
];

/// Arguments of `aggregateSpansIntoRollups`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    #[serde(deserialize_with = "crate::model::deserialize_millis")]
    pub window_start: Timestamp,
    #[serde(deserialize_with = "crate::model::deserialize_millis")]
    pub window_end: Timestamp,
    pub granularity_min: u32,
}

/// Arguments of `cleanupExpiredTelemetry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    #[serde(deserialize_with = "crate::model::deserialize_millis")]
    pub current_time: Timestamp,
}

/// Everything recorded under one trace id.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceView {
    pub trace_id: String,
    pub spans: Vec<SpanRecord>,
    pub events: Vec<EventRecord>,
}

impl TraceView {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.events.is_empty()
    }
}

/// Telemetry pipeline service.
#[derive(Clone)]
pub struct TelemetryService {
    store: Arc<Mutex<TelemetryStore>>,
    policy: RetentionPolicy,
}

impl TelemetryService {
    /// Wrap a store using the default retention tiers.
    pub fn new(store: TelemetryStore) -> Self {
        Self::with_policy(store, RetentionPolicy::default())
    }

    /// Wrap a store with custom retention tiers.
    pub fn with_policy(store: TelemetryStore, policy: RetentionPolicy) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            policy,
        }
    }

    /// Service over a fresh in-memory store.
    pub fn in_memory() -> TelemetryResult<Self> {
        Ok(Self::new(TelemetryStore::open_in_memory()?))
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// `recordSpan`
    #[cfg_attr(feature = "telemetry", instrument(skip(self, input), fields(span_id = %input.span_id, status = %input.status)))]
    pub async fn record_span(&self, input: &SpanInput) -> TelemetryResult<SpanRowId> {
        self.store.lock().await.record_span(input)
    }

    /// `recordEvent`
    #[cfg_attr(feature = "telemetry", instrument(skip(self, input), fields(event_type = %input.event_type, severity = %input.severity)))]
    pub async fn record_event(&self, input: &EventInput) -> TelemetryResult<EventRowId> {
        self.store.lock().await.record_event(input)
    }

    /// `recordRollup`
    #[cfg_attr(feature = "telemetry", instrument(skip(self, input), fields(window_start = input.window_start, source = %input.source)))]
    pub async fn record_rollup(&self, input: &RollupInput) -> TelemetryResult<RollupRowId> {
        self.store.lock().await.record_rollup(input)
    }

    /// `aggregateSpansIntoRollups`
    #[cfg_attr(feature = "telemetry", instrument(skip(self)))]
    pub async fn aggregate_spans_into_rollups(
        &self,
        request: AggregateRequest,
    ) -> TelemetryResult<AggregationOutcome> {
        let window = TimeWindow::new(request.window_start, request.window_end)?;
        self.store
            .lock()
            .await
            .aggregate(&window, request.granularity_min)
    }

    /// `cleanupExpiredTelemetry`
    #[cfg_attr(feature = "telemetry", instrument(skip(self)))]
    pub async fn cleanup_expired_telemetry(
        &self,
        request: CleanupRequest,
    ) -> TelemetryResult<SweepOutcome> {
        self.store
            .lock()
            .await
            .sweep_with(request.current_time, &self.policy)
    }

    pub async fn get_span(&self, span_id: &str) -> TelemetryResult<Option<SpanRecord>> {
        self.store.lock().await.get_span(span_id)
    }

    /// Spans and events sharing `trace_id`.
    pub async fn trace(&self, trace_id: &str) -> TelemetryResult<TraceView> {
        let store = self.store.lock().await;
        Ok(TraceView {
            trace_id: trace_id.to_string(),
            spans: store.spans_for_trace(trace_id)?,
            events: store.events_for_trace(trace_id)?,
        })
    }

    pub async fn rollups_between(
        &self,
        from: Timestamp,
        to: Timestamp,
        granularity_min: Option<u32>,
    ) -> TelemetryResult<Vec<RollupRecord>> {
        self.store
            .lock()
            .await
            .rollups_between(from, to, granularity_min)
    }

    pub async fn counts(&self) -> TelemetryResult<StoreCounts> {
        self.store.lock().await.counts()
    }

    /// Invoke a callable by name with a JSON payload.
    ///
    /// Unknown names and payloads that do not match the callable's shape are
    /// rejected as malformed input before anything is written.
    #[cfg_attr(feature = "telemetry", instrument(skip(self, payload)))]
    pub async fn dispatch(&self, name: &str, payload: Value) -> TelemetryResult<Value> {
        let result = match name {
            "recordSpan" => {
                let input: SpanInput = serde_json::from_value(payload)?;
                serde_json::to_value(self.record_span(&input).await?)?
            }
            "recordEvent" => {
                let input: EventInput = serde_json::from_value(payload)?;
                serde_json::to_value(self.record_event(&input).await?)?
            }
            "recordRollup" => {
                let input: RollupInput = serde_json::from_value(payload)?;
                serde_json::to_value(self.record_rollup(&input).await?)?
            }
            "aggregateSpansIntoRollups" => {
                let request: AggregateRequest = serde_json::from_value(payload)?;
                serde_json::to_value(self.aggregate_spans_into_rollups(request).await?)?
            }
            "cleanupExpiredTelemetry" => {
                let request: CleanupRequest = serde_json::from_value(payload)?;
                serde_json::to_value(self.cleanup_expired_telemetry(request).await?)?
            }
            other => {
                warn!(operation = other, "unknown operation");
                return Err(TelemetryError::UnknownOperation(other.to_string()));
            }
        };
        Ok(result)
    }
}

impl std::fmt::Debug for TelemetryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
