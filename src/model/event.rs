// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Discrete events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

use super::correlation::{require_text, CorrelationEnvelope};
use super::ids::EventRowId;
use super::time::{deserialize_millis, Timestamp};

/// Event severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error];

    /// Severities retained on the short tier.
    pub const LOW: [Severity; 2] = [Severity::Debug, Severity::Info];

    /// Severities retained on the long tier.
    pub const HIGH: [Severity; 2] = [Severity::Warn, Severity::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    /// Warn and error events are kept on the long retention tier.
    pub fn is_elevated(&self) -> bool {
        *self >= Severity::Warn
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            other => Err(TelemetryError::invalid(
                "severity",
                format!("expected one of debug, info, warn, error; got {other:?}"),
            )),
        }
    }
}

/// One `recordEvent` call. Every call stores a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(flatten)]
    pub envelope: CorrelationEnvelope,

    pub source: String,
    pub event_type: String,
    pub severity: Severity,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<String>,

    #[serde(deserialize_with = "deserialize_millis")]
    pub recorded_at: Timestamp,
}

impl EventInput {
    pub fn new(
        trace_id: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            envelope: CorrelationEnvelope::for_trace(trace_id),
            source: source.into(),
            event_type: event_type.into(),
            severity,
            message: message.into(),
            status: None,
            attrs: None,
            recorded_at,
        }
    }

    pub fn with_envelope(mut self, envelope: CorrelationEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_attrs(mut self, attrs: impl Into<String>) -> Self {
        self.attrs = Some(attrs.into());
        self
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        self.envelope.validate()?;
        require_text("source", &self.source)?;
        require_text("eventType", &self.event_type)?;
        Ok(())
    }
}

/// A stored event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: EventRowId,

    #[serde(flatten)]
    pub envelope: CorrelationEnvelope,

    pub source: String,
    pub event_type: String,
    pub severity: Severity,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<String>,

    pub recorded_at: Timestamp,
}
