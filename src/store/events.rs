// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Event rows. Events are append-only until retention removes them.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row, ToSql};

use crate::error::TelemetryResult;
use crate::model::{
    CorrelationEnvelope, EventInput, EventRecord, EventRowId, Severity, Timestamp, TimeWindow,
};

use super::{placeholders, TelemetryStore};

const EVENT_COLUMNS: &str = "id, trace_id, parent_span_id, orchestration_id, feature_name, \
     phase_number, team_name, task_id, source, event_type, severity, message, status, \
     attrs, recorded_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        id: EventRowId(row.get(0)?),
        envelope: CorrelationEnvelope {
            trace_id: row.get(1)?,
            parent_span_id: row.get(2)?,
            orchestration_id: row.get(3)?,
            feature_name: row.get(4)?,
            phase_number: row.get(5)?,
            team_name: row.get(6)?,
            task_id: row.get(7)?,
        },
        source: row.get(8)?,
        event_type: row.get(9)?,
        severity: row.get(10)?,
        message: row.get(11)?,
        status: row.get(12)?,
        attrs: row.get(13)?,
        recorded_at: row.get(14)?,
    })
}

/// Append an event row.
pub(crate) fn insert_event(conn: &Connection, input: &EventInput) -> TelemetryResult<EventRowId> {
    let envelope = &input.envelope;
    conn.execute(
        r#"
        INSERT INTO events (
            trace_id, parent_span_id, orchestration_id, feature_name, phase_number,
            team_name, task_id, source, event_type, severity, message, status, attrs,
            recorded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            envelope.trace_id,
            envelope.parent_span_id,
            envelope.orchestration_id,
            envelope.feature_name,
            envelope.phase_number,
            envelope.team_name,
            envelope.task_id,
            input.source,
            input.event_type,
            input.severity,
            input.message,
            input.status,
            input.attrs,
            input.recorded_at,
        ],
    )?;

    Ok(EventRowId(conn.last_insert_rowid()))
}

/// Number of events per `source` recorded in `[window.start, window.end)`.
pub(crate) fn count_events_by_source(
    conn: &Connection,
    window: &TimeWindow,
) -> TelemetryResult<HashMap<String, u64>> {
    let mut stmt = conn.prepare(
        "SELECT source, COUNT(*) FROM events
         WHERE recorded_at >= ? AND recorded_at < ?
         GROUP BY source",
    )?;

    let counts = stmt
        .query_map(params![window.start, window.end], |row| {
            let source: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((source, count as u64))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(counts)
}

/// Delete events with one of `severities` recorded strictly before `cutoff`.
pub(crate) fn delete_events_before(
    conn: &Connection,
    severities: &[Severity],
    cutoff: Timestamp,
) -> TelemetryResult<u64> {
    if severities.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "DELETE FROM events WHERE recorded_at < ? AND severity IN ({})",
        placeholders(severities.len())
    );
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(severities.len() + 1);
    values.push(&cutoff);
    values.extend(severities.iter().map(|s| s as &dyn ToSql));

    let deleted = conn.execute(&sql, values.as_slice())?;
    Ok(deleted as u64)
}

impl TelemetryStore {
    /// All events of one trace, oldest first.
    pub fn events_for_trace(&self, trace_id: &str) -> TelemetryResult<Vec<EventRecord>> {
        let sql = format!(
            "SELECT {} FROM events WHERE trace_id = ? ORDER BY recorded_at, id",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![trace_id], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Events recorded inside a window.
    pub fn events_in_window(&self, window: &TimeWindow) -> TelemetryResult<Vec<EventRecord>> {
        let sql = format!(
            "SELECT {} FROM events WHERE recorded_at >= ? AND recorded_at < ? ORDER BY recorded_at, id",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![window.start, window.end], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}
