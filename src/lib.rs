// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Opsight - operational telemetry for workflow orchestration.
//!
//! Spans and events are ingested into a raw store, periodically rolled up
//! into fixed windows with latency statistics, and expired by a tiered
//! retention sweep. The pipeline exposes only idempotent, parameterized
//! entry points; when to aggregate or sweep is decided by an outside
//! scheduler.
//!
//! # Architecture
//!
//! - [`model`] - Spans, events, rollups, correlation envelope, time windows
//! - [`store`] - SQLite raw and rollup stores
//! - [`ingest`] - `record_span`, `record_event`, `record_rollup`
//! - [`aggregate`] - Windowed rollup aggregation with p95/max latency
//! - [`retention`] - Severity-aware retention sweep
//! - [`service`] - Shareable async façade and JSON dispatch
//! - [`recorder`] - Open-then-close span recording for callers
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - The pipeline's own logging and metrics
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use opsight::{SpanInput, SpanStatus, TelemetryStore, TimeWindow};
//!
//! let mut store = TelemetryStore::open_in_memory()?;
//! store.record_span(&SpanInput::new("s-1", "t-1", "orchestrator", "phase.run", 0, SpanStatus::Ok, 0))?;
//! let outcome = store.aggregate(&TimeWindow::new(0, 900_000)?, 15)?;
//! assert_eq!(outcome.rollups_created, 1);
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod recorder;
pub mod retention;
pub mod service;
pub mod store;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use aggregate::AggregationOutcome;
pub use error::{ConfigError, Result, TelemetryError, TelemetryResult};
pub use model::{
    CorrelationEnvelope, EventInput, EventRecord, EventRowId, RollupInput, RollupRecord,
    RollupRowId, Severity, SpanInput, SpanRecord, SpanRowId, SpanStatus, TimeWindow, Timestamp,
};
pub use recorder::{SpanRecorder, SpanStart};
pub use retention::{RetentionPolicy, SweepOutcome};
pub use service::{AggregateRequest, CleanupRequest, TelemetryService};
pub use store::{StoreCounts, TelemetryStore};

/// Opsight version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _span = SpanInput::new("s", "t", "src", "op", 0, SpanStatus::Open, 0);
        let _policy = RetentionPolicy::default();
        let _outcome = SweepOutcome::default();
    }
}
