// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read path: point lookups, per-kind scans, session history, and replay.

use mnemo_core::{
    DocumentReference, MnemoError, Record, RecordId, RecordKind, RecordQuery, SessionId,
    StoreStats,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::queries::{
    document_from_row, format_ts, record_id_at, sql_id, tool_from_row, turn_from_row,
    DOCUMENT_COLUMNS, LIVE, TOOL_COLUMNS, TURN_COLUMNS,
};

fn get_live(conn: &Connection, id: i64) -> rusqlite::Result<Option<Record>> {
    let turn = conn
        .query_row(
            &format!("SELECT {TURN_COLUMNS} FROM conversation_turns r WHERE record_id = ?1 AND {LIVE}"),
            params![id],
            turn_from_row,
        )
        .optional()?;
    if let Some(turn) = turn {
        return Ok(Some(Record::ConversationTurn(turn)));
    }

    let tool = conn
        .query_row(
            &format!("SELECT {TOOL_COLUMNS} FROM tool_invocations r WHERE record_id = ?1 AND {LIVE}"),
            params![id],
            tool_from_row,
        )
        .optional()?;
    if let Some(tool) = tool {
        return Ok(Some(Record::ToolInvocation(tool)));
    }

    let doc = conn
        .query_row(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM document_references r WHERE record_id = ?1 AND {LIVE}"
            ),
            params![id],
            document_from_row,
        )
        .optional()?;
    Ok(doc.map(Record::DocumentReference))
}

/// Point lookup by id. Tombstoned or unknown ids yield [`MnemoError::NotFound`].
pub async fn get_record(db: &Database, record_id: RecordId) -> Result<Record, MnemoError> {
    let id = sql_id(record_id);
    db.connection()
        .call(move |conn| get_live(conn, id))
        .await
        .map_err(map_tr_err)?
        .ok_or(MnemoError::NotFound { record_id })
}

/// Filtered scan over one record kind, newest first.
///
/// The session filter does not apply to documents, which carry no session.
pub async fn query_records(db: &Database, query: &RecordQuery) -> Result<Vec<Record>, MnemoError> {
    let query = query.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<Record>, rusqlite::Error> {
            let (table, columns, time_column) = match query.kind {
                RecordKind::ConversationTurn => ("conversation_turns", TURN_COLUMNS, "created_at"),
                RecordKind::ToolInvocation => ("tool_invocations", TOOL_COLUMNS, "created_at"),
                RecordKind::DocumentReference => {
                    ("document_references", DOCUMENT_COLUMNS, "last_accessed_at")
                }
            };

            let mut sql = format!("SELECT {columns} FROM {table} r WHERE {LIVE}");
            let mut values: Vec<Value> = Vec::new();

            if let Some(session_id) = &query.session_id
                && query.kind != RecordKind::DocumentReference
            {
                values.push(Value::Text(session_id.as_str().to_string()));
                sql.push_str(&format!(" AND session_id = ?{}", values.len()));
            }
            if let Some(since) = &query.since {
                values.push(Value::Text(format_ts(since)));
                sql.push_str(&format!(" AND {time_column} >= ?{}", values.len()));
            }
            values.push(Value::Integer(query.limit.min(i64::MAX as usize) as i64));
            sql.push_str(&format!(" ORDER BY record_id DESC LIMIT ?{}", values.len()));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| match query.kind {
                RecordKind::ConversationTurn => turn_from_row(row).map(Record::ConversationTurn),
                RecordKind::ToolInvocation => tool_from_row(row).map(Record::ToolInvocation),
                RecordKind::DocumentReference => {
                    document_from_row(row).map(Record::DocumentReference)
                }
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent turns and tool invocations of a session, newest first.
pub async fn recent_records(
    db: &Database,
    session_id: &SessionId,
    limit: usize,
) -> Result<Vec<Record>, MnemoError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let session = session_id.as_str().to_string();
    let limit = limit.min(i64::MAX as usize);
    db.connection()
        .call(move |conn| -> Result<Vec<Record>, rusqlite::Error> {
            let mut records = Vec::new();

            let mut stmt = conn.prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM conversation_turns r
                 WHERE session_id = ?1 AND {LIVE}
                 ORDER BY record_id DESC LIMIT ?2"
            ))?;
            for turn in stmt.query_map(params![session, limit as i64], turn_from_row)? {
                records.push(Record::ConversationTurn(turn?));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {TOOL_COLUMNS} FROM tool_invocations r
                 WHERE session_id = ?1 AND {LIVE}
                 ORDER BY record_id DESC LIMIT ?2"
            ))?;
            for tool in stmt.query_map(params![session, limit as i64], tool_from_row)? {
                records.push(Record::ToolInvocation(tool?));
            }

            records.sort_by(|a, b| b.record_id().cmp(&a.record_id()));
            records.truncate(limit);
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Every live record with an id greater than `after`, in ascending id order.
pub async fn records_after(db: &Database, after: RecordId) -> Result<Vec<Record>, MnemoError> {
    let after = sql_id(after);
    db.connection()
        .call(move |conn| -> Result<Vec<Record>, rusqlite::Error> {
            let mut records = Vec::new();

            let mut stmt = conn.prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM conversation_turns r WHERE record_id > ?1 AND {LIVE}"
            ))?;
            for turn in stmt.query_map(params![after], turn_from_row)? {
                records.push(Record::ConversationTurn(turn?));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {TOOL_COLUMNS} FROM tool_invocations r WHERE record_id > ?1 AND {LIVE}"
            ))?;
            for tool in stmt.query_map(params![after], tool_from_row)? {
                records.push(Record::ToolInvocation(tool?));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM document_references r WHERE record_id > ?1 AND {LIVE}"
            ))?;
            for doc in stmt.query_map(params![after], document_from_row)? {
                records.push(Record::DocumentReference(doc?));
            }

            records.sort_by_key(Record::record_id);
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Newest live reference recorded for `path`.
pub async fn latest_document(
    db: &Database,
    path: &str,
) -> Result<Option<DocumentReference>, MnemoError> {
    let path = path.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<DocumentReference>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM document_references r
                     WHERE path = ?1 AND {LIVE}
                     ORDER BY record_id DESC LIMIT 1"
                ),
                params![path],
                document_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Highest id the sequence has issued.
pub async fn last_record_id(db: &Database) -> Result<RecordId, MnemoError> {
    db.connection()
        .call(|conn| -> Result<RecordId, rusqlite::Error> {
            conn.query_row(
                "SELECT last_record_id FROM record_sequence WHERE id = 1",
                [],
                |row| record_id_at(row, 0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Live row counts per kind, tombstone count, and sequence position.
pub async fn store_stats(db: &Database) -> Result<StoreStats, MnemoError> {
    db.connection()
        .call(|conn| -> Result<StoreStats, rusqlite::Error> {
            let count = |table: &str| -> rusqlite::Result<u64> {
                let n: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {table} r WHERE {LIVE}"),
                    [],
                    |row| row.get(0),
                )?;
                Ok(n as u64)
            };
            let tombstones: i64 =
                conn.query_row("SELECT COUNT(*) FROM tombstones", [], |row| row.get(0))?;
            let last_record_id = conn.query_row(
                "SELECT last_record_id FROM record_sequence WHERE id = 1",
                [],
                |row| record_id_at(row, 0),
            )?;

            Ok(StoreStats {
                conversation_turns: count("conversation_turns")?,
                tool_invocations: count("tool_invocations")?,
                document_references: count("document_references")?,
                tombstones: tombstones as u64,
                last_record_id,
            })
        })
        .await
        .map_err(map_tr_err)
}
