// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append path: id assignment and insert in a single transaction.

use chrono::{SubsecRound, Utc};
use mnemo_core::{MnemoError, NewRecord, Record, RecordId};
use rusqlite::params;

use crate::database::{map_write_err, Database};
use crate::queries::{format_ts, parse_ts_opt, sql_id};

/// Appends a record under the next global id.
///
/// The sequence row is read and bumped inside the same transaction as the
/// insert, so a failed insert leaves the sequence where it was. `created_at`
/// is clamped to the previous record's timestamp, keeping history totally
/// ordered even if the wall clock steps backwards.
pub async fn append_record(db: &Database, record: NewRecord) -> Result<Record, MnemoError> {
    db.connection()
        .call(move |conn| -> Result<Record, rusqlite::Error> {
            let tx = conn.transaction()?;

            let (last_id, last_at) = tx.query_row(
                "SELECT last_record_id, last_created_at FROM record_sequence WHERE id = 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, parse_ts_opt(row, 1)?)),
            )?;

            let now = Utc::now().trunc_subsecs(6);
            let at = match last_at {
                Some(prev) if prev > now => prev,
                _ => now,
            };
            let record_id = RecordId(last_id as u64).next();
            let ts = format_ts(&at);

            match &record {
                NewRecord::ConversationTurn {
                    session_id,
                    role,
                    content,
                } => {
                    tx.execute(
                        "INSERT INTO conversation_turns (record_id, session_id, role, content, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![sql_id(record_id), session_id.as_str(), role.to_string(), content, ts],
                    )?;
                }
                NewRecord::ToolInvocation {
                    session_id,
                    tool_name,
                    input,
                    output,
                    status,
                } => {
                    tx.execute(
                        "INSERT INTO tool_invocations (record_id, session_id, tool_name, input, output, status, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            sql_id(record_id),
                            session_id.as_str(),
                            tool_name,
                            input,
                            output,
                            status.to_string(),
                            ts
                        ],
                    )?;
                }
                NewRecord::DocumentReference {
                    path,
                    content_hash,
                    summary,
                } => {
                    tx.execute(
                        "INSERT INTO document_references (record_id, path, content_hash, summary, last_accessed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![sql_id(record_id), path, content_hash, summary, ts],
                    )?;
                }
            }

            tx.execute(
                "UPDATE record_sequence SET last_record_id = ?1, last_created_at = ?2 WHERE id = 1",
                params![sql_id(record_id), ts],
            )?;
            tx.commit()?;

            Ok(record.into_record(record_id, at))
        })
        .await
        .map_err(map_write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{Role, SessionId, ToolStatus};

    #[tokio::test]
    async fn ids_are_sequential_across_kinds() {
        let db = Database::open_in_memory().await.unwrap();

        let a = append_record(&db, NewRecord::turn("s1", Role::User, "hi")).await.unwrap();
        let b = append_record(
            &db,
            NewRecord::ToolInvocation {
                session_id: SessionId::from("s1"),
                tool_name: "search".into(),
                input: "q".into(),
                output: "r".into(),
                status: ToolStatus::Ok,
            },
        )
        .await
        .unwrap();
        let c = append_record(
            &db,
            NewRecord::DocumentReference {
                path: "/a.txt".into(),
                content_hash: "00".into(),
                summary: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(a.record_id(), RecordId(1));
        assert_eq!(b.record_id(), RecordId(2));
        assert_eq!(c.record_id(), RecordId(3));
    }

    #[tokio::test]
    async fn timestamps_are_non_decreasing() {
        let db = Database::open_in_memory().await.unwrap();
        let mut previous = None;
        for i in 0..20 {
            let rec = append_record(&db, NewRecord::turn("s1", Role::User, format!("m{i}")))
                .await
                .unwrap();
            if let Some(prev) = previous {
                assert!(rec.created_at() >= prev);
            }
            previous = Some(rec.created_at());
        }
    }

    #[tokio::test]
    async fn rejected_write_does_not_consume_an_id() {
        let db = Database::open_in_memory().await.unwrap();
        append_record(&db, NewRecord::turn("s1", Role::User, "first")).await.unwrap();

        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA query_only = ON;")?;
                Ok(())
            })
            .await
            .unwrap();

        let err = append_record(&db, NewRecord::turn("s1", Role::User, "lost")).await.unwrap_err();
        assert!(matches!(err, MnemoError::PersistenceFailure { .. }));

        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA query_only = OFF;")?;
                Ok(())
            })
            .await
            .unwrap();

        let next = append_record(&db, NewRecord::turn("s1", Role::User, "second")).await.unwrap();
        assert_eq!(next.record_id(), RecordId(2));
    }
}
