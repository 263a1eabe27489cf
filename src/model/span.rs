// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Execution spans.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

use super::correlation::{overlay, require_text, CorrelationEnvelope};
use super::ids::SpanRowId;
use super::time::{deserialize_millis, deserialize_opt_millis, Timestamp};

/// Outcome of a span.
///
/// `Open` is the only non-terminal status. `Error`, `Timeout`, and
/// `Cancelled` count as failures for rollups and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Open,
    Ok,
    Error,
    Timeout,
    Cancelled,
}

impl SpanStatus {
    pub const ALL: [SpanStatus; 5] = [
        SpanStatus::Open,
        SpanStatus::Ok,
        SpanStatus::Error,
        SpanStatus::Timeout,
        SpanStatus::Cancelled,
    ];

    /// Statuses retained on the short tier.
    pub const SUCCESS: [SpanStatus; 2] = [SpanStatus::Ok, SpanStatus::Open];

    /// Statuses counted as errors and retained on the long tier.
    pub const FAILURE: [SpanStatus; 3] =
        [SpanStatus::Error, SpanStatus::Timeout, SpanStatus::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Open => "open",
            SpanStatus::Ok => "ok",
            SpanStatus::Error => "error",
            SpanStatus::Timeout => "timeout",
            SpanStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SpanStatus::Error | SpanStatus::Timeout | SpanStatus::Cancelled
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpanStatus::Open)
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpanStatus {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SpanStatus::Open),
            "ok" => Ok(SpanStatus::Ok),
            "error" => Ok(SpanStatus::Error),
            "timeout" => Ok(SpanStatus::Timeout),
            "cancelled" => Ok(SpanStatus::Cancelled),
            other => Err(TelemetryError::invalid(
                "status",
                format!("expected one of open, ok, error, timeout, cancelled; got {other:?}"),
            )),
        }
    }
}

/// One `recordSpan` call.
///
/// Required fields always overwrite a stored span with the same `span_id`;
/// optional fields overwrite only when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanInput {
    pub span_id: String,

    #[serde(flatten)]
    pub envelope: CorrelationEnvelope,

    pub source: String,
    pub operation: String,

    #[serde(deserialize_with = "deserialize_millis")]
    pub started_at: Timestamp,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<Timestamp>,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<i64>,

    pub status: SpanStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Opaque serialized key/value bag, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<String>,

    #[serde(deserialize_with = "deserialize_millis")]
    pub recorded_at: Timestamp,
}

impl SpanInput {
    /// Create a span call with only the required fields set.
    pub fn new(
        span_id: impl Into<String>,
        trace_id: impl Into<String>,
        source: impl Into<String>,
        operation: impl Into<String>,
        started_at: Timestamp,
        status: SpanStatus,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            span_id: span_id.into(),
            envelope: CorrelationEnvelope::for_trace(trace_id),
            source: source.into(),
            operation: operation.into(),
            started_at,
            ended_at: None,
            duration_ms: None,
            status,
            error_code: None,
            error_detail: None,
            attrs: None,
            recorded_at,
        }
    }

    pub fn with_envelope(mut self, envelope: CorrelationEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_ended_at(mut self, ended_at: Timestamp) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, detail: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_attrs(mut self, attrs: impl Into<String>) -> Self {
        self.attrs = Some(attrs.into());
        self
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> TelemetryResult<()> {
        require_text("spanId", &self.span_id)?;
        self.envelope.validate()?;
        require_text("source", &self.source)?;
        require_text("operation", &self.operation)?;
        if let Some(duration) = self.duration_ms {
            if duration < 0 {
                return Err(TelemetryError::invalid(
                    "durationMs",
                    format!("must be non-negative, got {duration}"),
                ));
            }
        }
        Ok(())
    }
}

/// A stored span row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub id: SpanRowId,
    pub span_id: String,

    #[serde(flatten)]
    pub envelope: CorrelationEnvelope,

    pub source: String,
    pub operation: String,
    pub started_at: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    pub status: SpanStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<String>,

    pub recorded_at: Timestamp,
}

impl SpanRecord {
    /// Materialize a fresh row from an input.
    pub fn from_input(id: SpanRowId, input: &SpanInput) -> Self {
        Self {
            id,
            span_id: input.span_id.clone(),
            envelope: input.envelope.clone(),
            source: input.source.clone(),
            operation: input.operation.clone(),
            started_at: input.started_at,
            ended_at: input.ended_at,
            duration_ms: input.duration_ms,
            status: input.status,
            error_code: input.error_code.clone(),
            error_detail: input.error_detail.clone(),
            attrs: input.attrs.clone(),
            recorded_at: input.recorded_at,
        }
    }

    /// Merge-patch a later call for the same span onto this row.
    ///
    /// Identity (`id`, `span_id`) never changes.
    pub fn apply(&mut self, patch: &SpanInput) {
        self.envelope.merge_from(&patch.envelope);
        self.source.clone_from(&patch.source);
        self.operation.clone_from(&patch.operation);
        self.started_at = patch.started_at;
        overlay(&mut self.ended_at, &patch.ended_at);
        overlay(&mut self.duration_ms, &patch.duration_ms);
        self.status = patch.status;
        overlay(&mut self.error_code, &patch.error_code);
        overlay(&mut self.error_detail, &patch.error_detail);
        overlay(&mut self.attrs, &patch.attrs);
        self.recorded_at = patch.recorded_at;
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_span() -> SpanInput {
        SpanInput::new("s-1", "t-1", "orchestrator", "phase.run", 1_000, SpanStatus::Open, 1_000)
            .with_attrs(r#"{"attempt":1}"#)
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in SpanStatus::ALL {
            assert_eq!(status.as_str().parse::<SpanStatus>().unwrap(), status);
        }
        assert!("done".parse::<SpanStatus>().unwrap_err().is_malformed_input());
    }

    #[test]
    fn test_status_classes() {
        assert!(!SpanStatus::Open.is_terminal());
        assert!(SpanStatus::Ok.is_terminal());
        assert!(!SpanStatus::Ok.is_failure());
        assert!(SpanStatus::FAILURE.iter().all(SpanStatus::is_failure));
        assert!(SpanStatus::SUCCESS.iter().all(|s| !s.is_failure()));
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(open_span().validate().is_ok());

        let mut missing = open_span();
        missing.span_id = String::new();
        assert!(matches!(
            missing.validate(),
            Err(TelemetryError::MissingField("spanId"))
        ));

        let mut no_trace = open_span();
        no_trace.envelope.trace_id = String::new();
        assert!(matches!(
            no_trace.validate(),
            Err(TelemetryError::MissingField("traceId"))
        ));
    }

    #[test]
    fn test_validate_negative_duration() {
        let span = open_span().with_duration(-1);
        assert!(span.validate().unwrap_err().is_malformed_input());
    }

    #[test]
    fn test_apply_merges_over_open_span() {
        let mut record = SpanRecord::from_input(SpanRowId(7), &open_span());

        let close = SpanInput::new("s-1", "t-1", "orchestrator", "phase.run", 1_000, SpanStatus::Ok, 1_450)
            .with_ended_at(1_450)
            .with_duration(450);
        record.apply(&close);

        assert_eq!(record.id, SpanRowId(7));
        assert_eq!(record.status, SpanStatus::Ok);
        assert_eq!(record.duration_ms, Some(450));
        assert_eq!(record.ended_at, Some(1_450));
        assert_eq!(record.recorded_at, 1_450);
        // Not part of the closing call, so the stored value survives.
        assert_eq!(record.attrs.as_deref(), Some(r#"{"attempt":1}"#));
    }

    #[test]
    fn test_span_input_json_shape() {
        let json = serde_json::json!({
            "traceId": "t-1",
            "spanId": "s-1",
            "orchestrationId": "orch-1",
            "phaseNumber": 3,
            "source": "orchestrator",
            "operation": "phase.run",
            "startedAt": 10,
            "status": "timeout",
            "recordedAt": 12
        });
        let input: SpanInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.envelope.orchestration_id.as_deref(), Some("orch-1"));
        assert_eq!(input.envelope.phase_number, Some(3));
        assert_eq!(input.status, SpanStatus::Timeout);
        assert!(input.duration_ms.is_none());
    }

    #[test]
    fn test_span_input_rejects_unknown_status() {
        let json = serde_json::json!({
            "traceId": "t-1",
            "spanId": "s-1",
            "source": "orchestrator",
            "operation": "phase.run",
            "startedAt": 10,
            "status": "finished",
            "recordedAt": 12
        });
        assert!(serde_json::from_value::<SpanInput>(json).is_err());
    }
}
