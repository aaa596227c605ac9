// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the structured record log, plus shared row mapping.

pub mod append;
pub mod records;
pub mod tombstones;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use mnemo_core::{
    ConversationTurn, DocumentReference, RecordId, Role, ToolInvocationRecord, ToolStatus,
};
use rusqlite::types::Type;
use rusqlite::Row;

pub(crate) const TURN_COLUMNS: &str = "record_id, session_id, role, content, created_at";
pub(crate) const TOOL_COLUMNS: &str =
    "record_id, session_id, tool_name, input, output, status, created_at";
pub(crate) const DOCUMENT_COLUMNS: &str =
    "record_id, path, content_hash, summary, last_accessed_at";

/// Excludes tombstoned rows; every live-record query appends this predicate.
pub(crate) const LIVE: &str =
    "NOT EXISTS (SELECT 1 FROM tombstones ts WHERE ts.record_id = r.record_id)";

/// Fixed-width UTC timestamp, so lexical order equals time order.
pub(crate) fn format_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_ts_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, e))
    })
    .transpose()
}

fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn record_id_at(row: &Row, idx: usize) -> rusqlite::Result<RecordId> {
    let raw: i64 = row.get(idx)?;
    Ok(RecordId(raw as u64))
}

pub(crate) fn sql_id(id: RecordId) -> i64 {
    id.get() as i64
}

pub(crate) fn turn_from_row(row: &Row) -> rusqlite::Result<ConversationTurn> {
    Ok(ConversationTurn {
        record_id: record_id_at(row, 0)?,
        session_id: row.get::<_, String>(1)?.into(),
        role: parse_enum::<Role>(row, 2)?,
        content: row.get(3)?,
        created_at: parse_ts(row, 4)?,
    })
}

pub(crate) fn tool_from_row(row: &Row) -> rusqlite::Result<ToolInvocationRecord> {
    Ok(ToolInvocationRecord {
        record_id: record_id_at(row, 0)?,
        session_id: row.get::<_, String>(1)?.into(),
        tool_name: row.get(2)?,
        input: row.get(3)?,
        output: row.get(4)?,
        status: parse_enum::<ToolStatus>(row, 5)?,
        created_at: parse_ts(row, 6)?,
    })
}

pub(crate) fn document_from_row(row: &Row) -> rusqlite::Result<DocumentReference> {
    Ok(DocumentReference {
        record_id: record_id_at(row, 0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        summary: row.get(3)?,
        last_accessed_at: parse_ts(row, 4)?,
    })
}
