// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Correlation envelope shared by spans and events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TelemetryError, TelemetryResult};

/// Identifiers that tie an observation to a logical request and to the
/// orchestration that produced it.
///
/// Only `trace_id` is required. The orchestration fields are supplied by the
/// surrounding workflow backend and are never validated against it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationEnvelope {
    pub trace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl CorrelationEnvelope {
    /// Envelope carrying only a trace id.
    pub fn for_trace(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Default::default()
        }
    }

    /// Envelope for a brand new trace with a generated id.
    pub fn new_trace() -> Self {
        Self::for_trace(new_trace_id())
    }

    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn with_orchestration(mut self, orchestration_id: impl Into<String>, phase: Option<u32>) -> Self {
        self.orchestration_id = Some(orchestration_id.into());
        self.phase_number = phase;
        self
    }

    pub fn with_feature(mut self, feature_name: impl Into<String>) -> Self {
        self.feature_name = Some(feature_name.into());
        self
    }

    pub fn with_team(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Reject an envelope without a trace id.
    pub fn validate(&self) -> TelemetryResult<()> {
        require_text("traceId", &self.trace_id)
    }

    /// Overlay the fields present in `other`, keeping ours where it has none.
    pub(crate) fn merge_from(&mut self, other: &CorrelationEnvelope) {
        self.trace_id.clone_from(&other.trace_id);
        overlay(&mut self.parent_span_id, &other.parent_span_id);
        overlay(&mut self.orchestration_id, &other.orchestration_id);
        overlay(&mut self.feature_name, &other.feature_name);
        overlay(&mut self.phase_number, &other.phase_number);
        overlay(&mut self.team_name, &other.team_name);
        overlay(&mut self.task_id, &other.task_id);
    }
}

/// Generate a trace id.
pub fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate a span id.
pub fn new_span_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Replace `target` with `patch` when the patch carries a value.
pub(crate) fn overlay<T: Clone>(target: &mut Option<T>, patch: &Option<T>) {
    if let Some(value) = patch {
        *target = Some(value.clone());
    }
}

/// A required string field must be present and not blank.
pub(crate) fn require_text(field: &'static str, value: &str) -> TelemetryResult<()> {
    if value.trim().is_empty() {
        return Err(TelemetryError::MissingField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serde_camel_case() {
        let envelope = CorrelationEnvelope::for_trace("t-1").with_orchestration("orch-9", Some(2));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["traceId"], "t-1");
        assert_eq!(json["orchestrationId"], "orch-9");
        assert_eq!(json["phaseNumber"], 2);
        assert!(json.get("teamName").is_none());
    }

    #[test]
    fn test_envelope_requires_trace_id() {
        let envelope = CorrelationEnvelope::default();
        assert!(matches!(
            envelope.validate(),
            Err(TelemetryError::MissingField("traceId"))
        ));
        assert!(CorrelationEnvelope::for_trace("  ").validate().is_err());
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut stored = CorrelationEnvelope::for_trace("t-1")
            .with_orchestration("orch-1", Some(1))
            .with_team("core");
        let patch = CorrelationEnvelope::for_trace("t-1").with_task("task-7");

        stored.merge_from(&patch);

        assert_eq!(stored.orchestration_id.as_deref(), Some("orch-1"));
        assert_eq!(stored.phase_number, Some(1));
        assert_eq!(stored.team_name.as_deref(), Some("core"));
        assert_eq!(stored.task_id.as_deref(), Some("task-7"));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(new_trace_id(), new_trace_id());
        assert_eq!(new_span_id().len(), 16);
        assert_eq!(new_trace_id().len(), 32);
    }
}
