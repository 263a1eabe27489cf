// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SQLite-backed raw store (spans, events) and rollup store.
//!
//! One database file holds all three tables. Every write path runs inside a
//! single `IMMEDIATE` transaction so a call either commits completely or
//! leaves no trace, and concurrent writers queue on the SQLite write lock
//! instead of interleaving.

mod events;
mod rollups;
mod schema;
mod spans;

use std::path::{Path, PathBuf};
use std::time::Duration;
#[cfg(feature = "telemetry")]
use std::time::Instant;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};
use crate::model::{Severity, SpanStatus};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

pub(crate) use events::{count_events_by_source, delete_events_before, insert_event};
pub(crate) use rollups::{delete_rollups_before, upsert_rollup};
pub(crate) use spans::{delete_spans_before, spans_recorded_between, upsert_span};
pub use schema::SCHEMA_VERSION;

/// Default time a writer waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Connection options.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a statement waits for another connection's lock.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Row totals per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounts {
    pub spans: u64,
    pub events: u64,
    pub rollups: u64,
}

/// Telemetry storage using SQLite.
pub struct TelemetryStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl TelemetryStore {
    /// Open or create a telemetry database with default options.
    pub fn open(db_path: &Path) -> TelemetryResult<Self> {
        Self::open_with(db_path, &StoreOptions::default())
    }

    /// Open or create a telemetry database at a specific path.
    pub fn open_with(db_path: &Path, options: &StoreOptions) -> TelemetryResult<Self> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TelemetryError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_connection(conn, Some(db_path.to_path_buf()), options)?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("store.open", start.elapsed());

        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> TelemetryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None, &StoreOptions::default())
    }

    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        options: &StoreOptions,
    ) -> TelemetryResult<Self> {
        conn.busy_timeout(options.busy_timeout)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn, path })
    }

    /// Database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of rows in each table.
    pub fn counts(&self) -> TelemetryResult<StoreCounts> {
        let count = |table: &str| -> TelemetryResult<u64> {
            let n: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table),
                [],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        };

        Ok(StoreCounts {
            spans: count("spans")?,
            events: count("events")?,
            rollups: count("rollups")?,
        })
    }

    /// Run `f` inside one `IMMEDIATE` transaction, committing only if it succeeds.
    pub(crate) fn write<T, F>(&mut self, f: F) -> TelemetryResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> TelemetryResult<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ToSql for SpanStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SpanStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: TelemetryError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Severity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Severity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: TelemetryError| FromSqlError::Other(Box::new(e)))
    }
}

/// Placeholder list `?, ?, ...` for an `IN (...)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
