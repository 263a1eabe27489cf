// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Data model for raw observations and their rollups.
//!
//! - **Spans**: timed operations, deduplicated by a caller-assigned `span_id`
//! - **Events**: point-in-time log records, never deduplicated
//! - **Rollups**: per-window statistics for one `(source, operation)` pair
//!
//! Timestamps are integer milliseconds since the Unix epoch. `recorded_at`
//! (ingestion time) decides both window membership and retention.

mod correlation;
mod event;
mod ids;
mod rollup;
mod span;
mod time;
mod window;

pub use correlation::{new_span_id, new_trace_id, CorrelationEnvelope};
pub use event::{EventInput, EventRecord, Severity};
pub use ids::{EventRowId, RollupRowId, SpanRowId};
pub use rollup::{RollupInput, RollupRecord};
pub use span::{SpanInput, SpanRecord, SpanStatus};
pub(crate) use time::deserialize_millis;
pub use time::{format_timestamp, now_ms, parse_timestamp, Timestamp, DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};
pub use window::{
    granularity_width_ms, TimeWindow, GRANULARITY_DAY, GRANULARITY_HOUR, GRANULARITY_QUARTER_HOUR,
};
