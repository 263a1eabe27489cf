// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Database schema for the raw and rollup stores.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{TelemetryError, TelemetryResult};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS spans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    span_id TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    parent_span_id TEXT,
    orchestration_id TEXT,
    feature_name TEXT,
    phase_number INTEGER,
    team_name TEXT,
    task_id TEXT,
    source TEXT NOT NULL,
    operation TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    ended_at INTEGER,
    duration_ms INTEGER,
    status TEXT NOT NULL,
    error_code TEXT,
    error_detail TEXT,
    attrs TEXT,
    recorded_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_spans_span_id ON spans(span_id);
CREATE INDEX IF NOT EXISTS idx_spans_trace ON spans(trace_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_spans_orchestration ON spans(orchestration_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_spans_source ON spans(source, recorded_at);
CREATE INDEX IF NOT EXISTS idx_spans_operation ON spans(operation, recorded_at);
CREATE INDEX IF NOT EXISTS idx_spans_recorded_at ON spans(recorded_at);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL,
    parent_span_id TEXT,
    orchestration_id TEXT,
    feature_name TEXT,
    phase_number INTEGER,
    team_name TEXT,
    task_id TEXT,
    source TEXT NOT NULL,
    event_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT,
    attrs TEXT,
    recorded_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_trace ON events(trace_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_events_orchestration ON events(orchestration_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_events_source ON events(source, recorded_at);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type, recorded_at);
CREATE INDEX IF NOT EXISTS idx_events_recorded_at ON events(recorded_at);

CREATE TABLE IF NOT EXISTS rollups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    granularity_min INTEGER NOT NULL,
    source TEXT NOT NULL,
    operation TEXT NOT NULL,
    orchestration_id TEXT,
    phase_number INTEGER,
    span_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    event_count INTEGER NOT NULL DEFAULT 0,
    p95_duration_ms INTEGER,
    max_duration_ms INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_rollups_key
    ON rollups(window_start, granularity_min, source, operation);
CREATE INDEX IF NOT EXISTS idx_rollups_source ON rollups(window_start, source);
CREATE INDEX IF NOT EXISTS idx_rollups_operation ON rollups(window_start, operation);
"#;

/// Create tables and indexes if they are missing and stamp the schema version.
pub(crate) fn init_schema(conn: &Connection) -> TelemetryResult<()> {
    conn.execute_batch(SCHEMA)?;

    let current_version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match current_version {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?)",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(version) if version > SCHEMA_VERSION => {
            return Err(TelemetryError::Storage(format!(
                "database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }
        Some(_) => {}
    }

    Ok(())
}
