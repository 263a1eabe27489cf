// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for ingestion, aggregation, and retention.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use opsight::aggregate::{compute_rollups, percentile};
use opsight::model::{DAY_MS, MINUTE_MS};
use opsight::{
    EventInput, Severity, SpanInput, SpanRecord, SpanStatus, TelemetryStore, TimeWindow,
};

const T: i64 = 1_767_225_600_000;

fn span(i: usize, at: i64) -> SpanInput {
    let status = if i % 10 == 0 {
        SpanStatus::Error
    } else {
        SpanStatus::Ok
    };
    SpanInput::new(
        format!("span-{}", i),
        format!("trace-{}", i / 8),
        format!("source-{}", i % 4),
        format!("op-{}", i % 5),
        at,
        status,
        at,
    )
    .with_duration((i as i64 * 37) % 2_000)
}

fn seeded_store(dir: &TempDir, spans: usize) -> TelemetryStore {
    let mut store = TelemetryStore::open(&dir.path().join("bench.db")).unwrap();
    for i in 0..spans {
        store.record_span(&span(i, T + i as i64)).unwrap();
        if i % 3 == 0 {
            let event = EventInput::new(
                format!("trace-{}", i / 8),
                format!("source-{}", i % 4),
                "note",
                Severity::Info,
                "bench",
                T + i as i64,
            );
            store.record_event(&event).unwrap();
        }
    }
    store
}

/// Benchmark span ingestion, fresh inserts and merges.
fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/ingest");

    let dir = TempDir::new().unwrap();
    let mut store = TelemetryStore::open(&dir.path().join("ingest.db")).unwrap();
    let mut next = 0usize;

    group.bench_function("record_span/insert", |b| {
        b.iter(|| {
            next += 1;
            store.record_span(black_box(&span(next, T))).unwrap()
        });
    });

    let merge = span(0, T);
    store.record_span(&merge).unwrap();
    group.bench_function("record_span/merge", |b| {
        b.iter(|| store.record_span(black_box(&merge)).unwrap());
    });

    let event = EventInput::new("trace-0", "source-0", "note", Severity::Warn, "bench", T);
    group.bench_function("record_event", |b| {
        b.iter(|| store.record_event(black_box(&event)).unwrap());
    });

    group.finish();
}

/// Benchmark in-memory grouping and the full aggregation transaction.
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/aggregate");
    let window = TimeWindow::new(T, T + 15 * MINUTE_MS).unwrap();

    for count in [100usize, 1_000, 10_000] {
        let records: Vec<SpanRecord> = (0..count)
            .map(|i| SpanRecord::from_input((i as i64).into(), &span(i, T + i as i64)))
            .collect();
        let events: HashMap<String, u64> = (0..4).map(|s| (format!("source-{}", s), 10)).collect();

        group.bench_with_input(BenchmarkId::new("compute_rollups", count), &records, |b, records| {
            b.iter(|| compute_rollups(black_box(&window), 15, black_box(records), &events));
        });
    }

    for count in [100usize, 1_000] {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, count);

        group.bench_with_input(BenchmarkId::new("aggregate", count), &count, |b, _| {
            b.iter(|| store.aggregate(black_box(&window), 15).unwrap());
        });
    }

    let sorted: Vec<i64> = (0..10_000).collect();
    group.bench_function("percentile/10000", |b| {
        b.iter(|| percentile(black_box(&sorted), 95));
    });

    group.finish();
}

/// Benchmark a sweep that finds nothing to delete.
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/sweep");

    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir, 1_000);

    group.bench_function("sweep/noop", |b| {
        b.iter(|| store.sweep(black_box(T + DAY_MS)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_aggregate, bench_sweep);
criterion_main!(benches);
