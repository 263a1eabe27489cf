// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Windowed rollups.

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

use super::correlation::require_text;
use super::ids::RollupRowId;
use super::time::{deserialize_millis, deserialize_opt_millis, Timestamp};
use super::window::granularity_width_ms;

/// One `recordRollup` call: the full recomputed state of a rollup row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupInput {
    #[serde(deserialize_with = "deserialize_millis")]
    pub window_start: Timestamp,
    #[serde(deserialize_with = "deserialize_millis")]
    pub window_end: Timestamp,
    pub granularity_min: u32,
    pub source: String,
    pub operation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_number: Option<u32>,

    pub span_count: u64,
    pub error_count: u64,
    pub event_count: u64,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub p95_duration_ms: Option<i64>,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_duration_ms: Option<i64>,
}

impl RollupInput {
    pub fn validate(&self) -> TelemetryResult<()> {
        require_text("source", &self.source)?;
        require_text("operation", &self.operation)?;
        granularity_width_ms(self.granularity_min)?;
        if self.window_end < self.window_start {
            return Err(TelemetryError::invalid(
                "windowEnd",
                format!(
                    "window end {} precedes window start {}",
                    self.window_end, self.window_start
                ),
            ));
        }
        Ok(())
    }
}

/// A stored rollup row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupRecord {
    pub id: RollupRowId,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub granularity_min: u32,
    pub source: String,
    pub operation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_number: Option<u32>,

    pub span_count: u64,
    pub error_count: u64,
    pub event_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_duration_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<i64>,
}

impl RollupRecord {
    /// Fraction of spans that succeeded (1.0 when there were none).
    ///
    /// Backfilled rows may carry more errors than spans; those read as 0.0.
    pub fn success_rate(&self) -> f64 {
        if self.span_count == 0 {
            1.0
        } else {
            self.span_count.saturating_sub(self.error_count) as f64 / self.span_count as f64
        }
    }
}
