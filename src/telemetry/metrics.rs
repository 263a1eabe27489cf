// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for the pipeline's own performance.
//!
//! Provides lightweight in-process metrics without an external collector:
//! per-operation latency with a fixed-bucket histogram, plus throughput
//! counters for the ingestion, aggregation, and retention paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Operation latency by operation name.
    operations: RwLock<HashMap<String, OperationMetrics>>,

    /// Row throughput counters.
    counters: PipelineCounters,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            counters: PipelineCounters::default(),
            start_time: Instant::now(),
        }
    }

    /// Record a timed operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let metrics = ops.entry(name.to_string()).or_insert_with(OperationMetrics::new);
        metrics.record(duration);
    }

    /// Record a span ingestion; `created` is false when it merged into an existing row.
    pub fn record_span_ingested(&self, created: bool) {
        if created {
            self.counters.spans_inserted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.spans_merged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_event_ingested(&self) {
        self.counters.events_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollups_written(&self, count: u64) {
        self.counters.rollups_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rows_swept(&self, count: u64) {
        self.counters.rows_swept.fetch_add(count, Ordering::Relaxed);
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Current counter values.
    pub fn counts(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self
            .operations
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        MetricsSnapshot {
            operations: operations.clone(),
            counters: self.counters.snapshot(),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.counters.reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic operation metrics with histogram.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    /// Number of operations.
    pub count: u64,

    /// Total duration.
    pub total_duration: Duration,

    /// Minimum duration.
    pub min_duration: Duration,

    /// Maximum duration.
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl OperationMetrics {
    /// Create new operation metrics.
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    /// Record an operation.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    /// Default: [100us, 1ms, 10ms, 100ms, 1s, 10s, +inf]
    buckets: Vec<u64>,

    /// Count per bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Get bucket boundaries.
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Approximate percentile (upper bucket boundary).
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    /// Get p50 (median) latency.
    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    /// Get p99 latency.
    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Default buckets: 100us, 1ms, 10ms, 100ms, 1s, 10s
        Self::with_buckets(vec![100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}

/// Thread-safe pipeline throughput counters.
#[derive(Debug, Default)]
struct PipelineCounters {
    spans_inserted: AtomicU64,
    spans_merged: AtomicU64,
    events_inserted: AtomicU64,
    rollups_written: AtomicU64,
    rows_swept: AtomicU64,
}

impl PipelineCounters {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            spans_inserted: self.spans_inserted.load(Ordering::Relaxed),
            spans_merged: self.spans_merged.load(Ordering::Relaxed),
            events_inserted: self.events_inserted.load(Ordering::Relaxed),
            rollups_written: self.rollups_written.load(Ordering::Relaxed),
            rows_swept: self.rows_swept.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.spans_inserted.store(0, Ordering::Relaxed);
        self.spans_merged.store(0, Ordering::Relaxed);
        self.events_inserted.store(0, Ordering::Relaxed);
        self.rollups_written.store(0, Ordering::Relaxed);
        self.rows_swept.store(0, Ordering::Relaxed);
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub spans_inserted: u64,
    pub spans_merged: u64,
    pub events_inserted: u64,
    pub rollups_written: u64,
    pub rows_swept: u64,
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Operation metrics by name.
    pub operations: HashMap<String, OperationMetrics>,

    /// Throughput counters.
    pub counters: CounterSnapshot,

    /// Uptime when snapshot was taken.
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Pipeline Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Spans: {} inserted, {} merged\n",
            self.counters.spans_inserted, self.counters.spans_merged
        ));
        report.push_str(&format!("Events: {} inserted\n", self.counters.events_inserted));
        report.push_str(&format!(
            "Rollups: {} written\nSwept: {} rows\n\n",
            self.counters.rollups_written, self.counters.rows_swept
        ));

        if !self.operations.is_empty() {
            let mut names: Vec<_> = self.operations.keys().collect();
            names.sort();

            report.push_str("Operation Metrics:\n");
            for name in names {
                let metrics = &self.operations[name];
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, max {:.2?}, p99 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.max_duration,
                    metrics.histogram.p99()
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_metrics() {
        let mut metrics = OperationMetrics::new();
        metrics.record(Duration::from_millis(10));
        metrics.record(Duration::from_millis(20));
        metrics.record(Duration::from_millis(30));

        assert_eq!(metrics.count, 3);
        assert_eq!(metrics.avg_duration(), Duration::from_millis(20));
        assert_eq!(metrics.max_duration, Duration::from_millis(30));
    }

    #[test]
    fn test_histogram() {
        let mut hist = Histogram::default();

        hist.record(Duration::from_micros(50)); // bucket 0 (<=100us)
        hist.record(Duration::from_micros(500)); // bucket 1 (<=1ms)
        hist.record(Duration::from_millis(5)); // bucket 2 (<=10ms)
        hist.record(Duration::from_secs(60)); // overflow

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[2], 1);
        assert_eq!(hist.counts()[hist.buckets().len()], 1);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..100 {
            hist.record(Duration::from_micros(500));
        }

        assert_eq!(hist.p50(), Duration::from_micros(1_000));
        assert_eq!(hist.p99(), Duration::from_micros(1_000));
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_span_ingested(true);
        metrics.record_span_ingested(false);
        metrics.record_span_ingested(false);
        metrics.record_event_ingested();
        metrics.record_rollups_written(3);
        metrics.record_rows_swept(10);

        let counts = metrics.counts();
        assert_eq!(counts.spans_inserted, 1);
        assert_eq!(counts.spans_merged, 2);
        assert_eq!(counts.events_inserted, 1);
        assert_eq!(counts.rollups_written, 3);
        assert_eq!(counts.rows_swept, 10);
    }

    #[test]
    fn test_snapshot_report() {
        let metrics = Metrics::new();
        metrics.record_operation("store.record_span", Duration::from_millis(2));
        metrics.record_span_ingested(true);

        let report = metrics.snapshot().format_report();
        assert!(report.contains("store.record_span"));
        assert!(report.contains("1 inserted"));
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();
        metrics.record_operation("op", Duration::from_millis(1));
        metrics.record_event_ingested();

        metrics.reset();

        assert!(metrics.operation_metrics("op").is_none());
        assert_eq!(metrics.counts(), CounterSnapshot::default());
    }
}
