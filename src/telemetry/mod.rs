// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The pipeline's own diagnostics.
//!
//! - **Logging**: `tracing` spans on every service call, debug events on
//!   every store write, installed through [`init_telemetry`]
//! - **Metrics**: per-operation latency and row throughput counters in
//!   [`GLOBAL_METRICS`], compiled in with the `telemetry` feature
//!
//! # Usage
//!
//! ```rust,ignore
//! use opsight::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! // ... run the pipeline ...
//! println!("{}", GLOBAL_METRICS.snapshot().format_report());
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig};
pub use metrics::{
    CounterSnapshot, Histogram, Metrics, MetricsSnapshot, OperationMetrics, GLOBAL_METRICS,
};
