// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rollup rows.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::TelemetryResult;
use crate::model::{RollupInput, RollupRecord, RollupRowId, Timestamp};

use super::TelemetryStore;

const ROLLUP_COLUMNS: &str = "id, window_start, window_end, granularity_min, source, operation, \
     orchestration_id, phase_number, span_count, error_count, event_count, p95_duration_ms, \
     max_duration_ms";

fn rollup_from_row(row: &Row<'_>) -> rusqlite::Result<RollupRecord> {
    Ok(RollupRecord {
        id: RollupRowId(row.get(0)?),
        window_start: row.get(1)?,
        window_end: row.get(2)?,
        granularity_min: row.get(3)?,
        source: row.get(4)?,
        operation: row.get(5)?,
        orchestration_id: row.get(6)?,
        phase_number: row.get(7)?,
        span_count: row.get::<_, i64>(8)? as u64,
        error_count: row.get::<_, i64>(9)? as u64,
        event_count: row.get::<_, i64>(10)? as u64,
        p95_duration_ms: row.get(11)?,
        max_duration_ms: row.get(12)?,
    })
}

/// Insert a rollup or replace the metrics of the row with the same key.
///
/// The row id survives replacement. Absent correlation fields keep the
/// previously stored values; absent latency statistics are cleared.
pub(crate) fn upsert_rollup(conn: &Connection, input: &RollupInput) -> TelemetryResult<RollupRowId> {
    let id: i64 = conn.query_row(
        r#"
        INSERT INTO rollups (
            window_start, window_end, granularity_min, source, operation,
            orchestration_id, phase_number, span_count, error_count, event_count,
            p95_duration_ms, max_duration_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(window_start, granularity_min, source, operation) DO UPDATE SET
            window_end = excluded.window_end,
            orchestration_id = COALESCE(excluded.orchestration_id, rollups.orchestration_id),
            phase_number = COALESCE(excluded.phase_number, rollups.phase_number),
            span_count = excluded.span_count,
            error_count = excluded.error_count,
            event_count = excluded.event_count,
            p95_duration_ms = excluded.p95_duration_ms,
            max_duration_ms = excluded.max_duration_ms
        RETURNING id
        "#,
        params![
            input.window_start,
            input.window_end,
            input.granularity_min,
            input.source,
            input.operation,
            input.orchestration_id,
            input.phase_number,
            input.span_count as i64,
            input.error_count as i64,
            input.event_count as i64,
            input.p95_duration_ms,
            input.max_duration_ms,
        ],
        |row| row.get(0),
    )?;

    Ok(RollupRowId(id))
}

/// Delete rollups whose window started strictly before `cutoff`.
pub(crate) fn delete_rollups_before(conn: &Connection, cutoff: Timestamp) -> TelemetryResult<u64> {
    let deleted = conn.execute(
        "DELETE FROM rollups WHERE window_start < ?",
        params![cutoff],
    )?;
    Ok(deleted as u64)
}

impl TelemetryStore {
    /// Look up one rollup by its key.
    pub fn get_rollup(
        &self,
        window_start: Timestamp,
        granularity_min: u32,
        source: &str,
        operation: &str,
    ) -> TelemetryResult<Option<RollupRecord>> {
        let sql = format!(
            "SELECT {} FROM rollups
             WHERE window_start = ? AND granularity_min = ? AND source = ? AND operation = ?",
            ROLLUP_COLUMNS
        );
        let record = self
            .conn
            .query_row(
                &sql,
                params![window_start, granularity_min, source, operation],
                rollup_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Rollups with `window_start` in `[from, to)`, optionally limited to one granularity.
    pub fn rollups_between(
        &self,
        from: Timestamp,
        to: Timestamp,
        granularity_min: Option<u32>,
    ) -> TelemetryResult<Vec<RollupRecord>> {
        let sql = format!(
            "SELECT {} FROM rollups
             WHERE window_start >= ?1 AND window_start < ?2
               AND (?3 IS NULL OR granularity_min = ?3)
             ORDER BY window_start, source, operation, granularity_min",
            ROLLUP_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rollups = stmt
            .query_map(params![from, to, granularity_min], rollup_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rollups)
    }
}
