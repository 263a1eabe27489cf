// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span rows.

use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::error::TelemetryResult;
use crate::model::{
    CorrelationEnvelope, SpanInput, SpanRecord, SpanRowId, SpanStatus, Timestamp, TimeWindow,
};

use super::{placeholders, TelemetryStore};

const SPAN_COLUMNS: &str = "id, span_id, trace_id, parent_span_id, orchestration_id, \
     feature_name, phase_number, team_name, task_id, source, operation, started_at, \
     ended_at, duration_ms, status, error_code, error_detail, attrs, recorded_at";

/// Result of one span ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpanWrite {
    pub id: SpanRowId,
    /// False when the call merged into an existing row.
    pub created: bool,
}

fn span_from_row(row: &Row<'_>) -> rusqlite::Result<SpanRecord> {
    Ok(SpanRecord {
        id: SpanRowId(row.get(0)?),
        span_id: row.get(1)?,
        envelope: CorrelationEnvelope {
            trace_id: row.get(2)?,
            parent_span_id: row.get(3)?,
            orchestration_id: row.get(4)?,
            feature_name: row.get(5)?,
            phase_number: row.get(6)?,
            team_name: row.get(7)?,
            task_id: row.get(8)?,
        },
        source: row.get(9)?,
        operation: row.get(10)?,
        started_at: row.get(11)?,
        ended_at: row.get(12)?,
        duration_ms: row.get(13)?,
        status: row.get(14)?,
        error_code: row.get(15)?,
        error_detail: row.get(16)?,
        attrs: row.get(17)?,
        recorded_at: row.get(18)?,
    })
}

fn find_span(conn: &Connection, span_id: &str) -> TelemetryResult<Option<SpanRecord>> {
    let sql = format!("SELECT {} FROM spans WHERE span_id = ?", SPAN_COLUMNS);
    let record = conn
        .query_row(&sql, params![span_id], span_from_row)
        .optional()?;
    Ok(record)
}

/// Insert a span, or merge-patch it onto the stored row with the same `span_id`.
///
/// Must run inside a write transaction so the lookup and the write see the
/// same row.
pub(crate) fn upsert_span(conn: &Connection, input: &SpanInput) -> TelemetryResult<SpanWrite> {
    if let Some(mut record) = find_span(conn, &input.span_id)? {
        record.apply(input);
        update_span(conn, &record)?;
        return Ok(SpanWrite {
            id: record.id,
            created: false,
        });
    }

    let envelope = &input.envelope;
    conn.execute(
        r#"
        INSERT INTO spans (
            span_id, trace_id, parent_span_id, orchestration_id, feature_name,
            phase_number, team_name, task_id, source, operation, started_at,
            ended_at, duration_ms, status, error_code, error_detail, attrs, recorded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.span_id,
            envelope.trace_id,
            envelope.parent_span_id,
            envelope.orchestration_id,
            envelope.feature_name,
            envelope.phase_number,
            envelope.team_name,
            envelope.task_id,
            input.source,
            input.operation,
            input.started_at,
            input.ended_at,
            input.duration_ms,
            input.status,
            input.error_code,
            input.error_detail,
            input.attrs,
            input.recorded_at,
        ],
    )?;

    Ok(SpanWrite {
        id: SpanRowId(conn.last_insert_rowid()),
        created: true,
    })
}

fn update_span(conn: &Connection, record: &SpanRecord) -> TelemetryResult<()> {
    let envelope = &record.envelope;
    conn.execute(
        r#"
        UPDATE spans SET
            trace_id = ?, parent_span_id = ?, orchestration_id = ?, feature_name = ?,
            phase_number = ?, team_name = ?, task_id = ?, source = ?, operation = ?,
            started_at = ?, ended_at = ?, duration_ms = ?, status = ?, error_code = ?,
            error_detail = ?, attrs = ?, recorded_at = ?
        WHERE id = ?
        "#,
        params![
            envelope.trace_id,
            envelope.parent_span_id,
            envelope.orchestration_id,
            envelope.feature_name,
            envelope.phase_number,
            envelope.team_name,
            envelope.task_id,
            record.source,
            record.operation,
            record.started_at,
            record.ended_at,
            record.duration_ms,
            record.status,
            record.error_code,
            record.error_detail,
            record.attrs,
            record.recorded_at,
            record.id.get(),
        ],
    )?;
    Ok(())
}

/// Spans whose `recorded_at` falls in `[window.start, window.end)`.
pub(crate) fn spans_recorded_between(
    conn: &Connection,
    window: &TimeWindow,
) -> TelemetryResult<Vec<SpanRecord>> {
    let sql = format!(
        "SELECT {} FROM spans WHERE recorded_at >= ? AND recorded_at < ? ORDER BY recorded_at, id",
        SPAN_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let spans = stmt
        .query_map(params![window.start, window.end], span_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(spans)
}

/// Delete spans with one of `statuses` recorded strictly before `cutoff`.
pub(crate) fn delete_spans_before(
    conn: &Connection,
    statuses: &[SpanStatus],
    cutoff: Timestamp,
) -> TelemetryResult<u64> {
    if statuses.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "DELETE FROM spans WHERE recorded_at < ? AND status IN ({})",
        placeholders(statuses.len())
    );
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(statuses.len() + 1);
    values.push(&cutoff);
    values.extend(statuses.iter().map(|s| s as &dyn ToSql));

    let deleted = conn.execute(&sql, values.as_slice())?;
    Ok(deleted as u64)
}

impl TelemetryStore {
    /// Look up a span by its caller-assigned id.
    pub fn get_span(&self, span_id: &str) -> TelemetryResult<Option<SpanRecord>> {
        find_span(&self.conn, span_id)
    }

    /// All spans of one trace, oldest first.
    pub fn spans_for_trace(&self, trace_id: &str) -> TelemetryResult<Vec<SpanRecord>> {
        let sql = format!(
            "SELECT {} FROM spans WHERE trace_id = ? ORDER BY recorded_at, id",
            SPAN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let spans = stmt
            .query_map(params![trace_id], span_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(spans)
    }

    /// Spans recorded inside a window.
    pub fn spans_in_window(&self, window: &TimeWindow) -> TelemetryResult<Vec<SpanRecord>> {
        spans_recorded_between(&self.conn, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TelemetryStore;

    fn span(span_id: &str, status: SpanStatus, recorded_at: Timestamp) -> SpanInput {
        SpanInput::new(span_id, "t-1", "orchestrator", "phase.run", recorded_at, status, recorded_at)
    }

    #[test]
    fn test_insert_then_merge_keeps_row_id() {
        let mut store = TelemetryStore::open_in_memory().unwrap();

        let first = store
            .write(|tx| upsert_span(tx, &span("s-1", SpanStatus::Open, 100).with_attrs("{}")))
            .unwrap();
        assert!(first.created);

        let second = store
            .write(|tx| upsert_span(tx, &span("s-1", SpanStatus::Ok, 200).with_duration(100)))
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);

        let stored = store.get_span("s-1").unwrap().unwrap();
        assert_eq!(stored.status, SpanStatus::Ok);
        assert_eq!(stored.duration_ms, Some(100));
        assert_eq!(stored.attrs.as_deref(), Some("{}"));
        assert_eq!(stored.recorded_at, 200);
        assert_eq!(store.counts().unwrap().spans, 1);
    }

    #[test]
    fn test_window_is_half_open() {
        let mut store = TelemetryStore::open_in_memory().unwrap();
        store
            .write(|tx| {
                for (id, at) in [("a", 99), ("b", 100), ("c", 199), ("d", 200)] {
                    upsert_span(tx, &span(id, SpanStatus::Ok, at))?;
                }
                Ok(())
            })
            .unwrap();

        let window = TimeWindow::new(100, 200).unwrap();
        let ids: Vec<_> = store
            .spans_in_window(&window)
            .unwrap()
            .into_iter()
            .map(|s| s.span_id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_spans_for_trace_and_missing_lookup() {
        let mut store = TelemetryStore::open_in_memory().unwrap();
        store
            .write(|tx| upsert_span(tx, &span("s-1", SpanStatus::Ok, 5)))
            .unwrap();

        assert_eq!(store.spans_for_trace("t-1").unwrap().len(), 1);
        assert!(store.spans_for_trace("t-404").unwrap().is_empty());
        assert!(store.get_span("missing").unwrap().is_none());
    }

    #[test]
    fn test_delete_by_status_before_cutoff() {
        let mut store = TelemetryStore::open_in_memory().unwrap();
        store
            .write(|tx| {
                upsert_span(tx, &span("ok-old", SpanStatus::Ok, 10))?;
                upsert_span(tx, &span("err-old", SpanStatus::Error, 10))?;
                upsert_span(tx, &span("ok-at-cutoff", SpanStatus::Ok, 50))?;
                Ok(())
            })
            .unwrap();

        let deleted = store
            .write(|tx| delete_spans_before(tx, &SpanStatus::SUCCESS, 50))
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(store.get_span("ok-old").unwrap().is_none());
        assert!(store.get_span("err-old").unwrap().is_some());
        assert!(store.get_span("ok-at-cutoff").unwrap().is_some());
    }
}
