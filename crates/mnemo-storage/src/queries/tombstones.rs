// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical deletion and physical purge of tombstoned records.

use chrono::Utc;
use mnemo_core::{MnemoError, RecordId};
use rusqlite::params;

use crate::database::{map_tr_err, map_write_err, Database};
use crate::queries::{format_ts, record_id_at, sql_id};

/// Tombstones `record_id`. Returns false if it was already tombstoned.
///
/// Unknown ids are rejected with [`MnemoError::NotFound`]; ids are never
/// tombstoned ahead of the sequence.
pub async fn tombstone(db: &Database, record_id: RecordId) -> Result<bool, MnemoError> {
    let id = sql_id(record_id);
    let at = format_ts(&Utc::now());
    db.connection()
        .call(move |conn| -> Result<Result<bool, MnemoError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM conversation_turns WHERE record_id = ?1)
                     OR EXISTS (SELECT 1 FROM tool_invocations WHERE record_id = ?1)
                     OR EXISTS (SELECT 1 FROM document_references WHERE record_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(Err(MnemoError::NotFound { record_id }));
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO tombstones (record_id, tombstoned_at) VALUES (?1, ?2)",
                params![id, at],
            )?;
            tx.commit()?;
            Ok(Ok(inserted == 1))
        })
        .await
        .map_err(map_write_err)?
}

/// All tombstone markers in id order.
pub async fn tombstoned_ids(db: &Database) -> Result<Vec<RecordId>, MnemoError> {
    db.connection()
        .call(|conn| -> Result<Vec<RecordId>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT record_id FROM tombstones ORDER BY record_id")?;
            let ids = stmt
                .query_map([], |row| record_id_at(row, 0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes tombstoned rows from every record table.
///
/// Tombstone markers themselves are kept so a purged id can never resurface.
pub async fn purge_tombstoned(db: &Database) -> Result<usize, MnemoError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for table in ["conversation_turns", "tool_invocations", "document_references"] {
                removed += tx.execute(
                    &format!(
                        "DELETE FROM {table} WHERE record_id IN (SELECT record_id FROM tombstones)"
                    ),
                    [],
                )?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(map_write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::append::append_record;
    use crate::queries::records::{get_record, store_stats};
    use mnemo_core::{NewRecord, Role};

    #[tokio::test]
    async fn tombstoned_records_are_hidden_then_purged() {
        let db = Database::open_in_memory().await.unwrap();
        append_record(&db, NewRecord::turn("s1", Role::User, "keep")).await.unwrap();
        append_record(&db, NewRecord::turn("s1", Role::User, "drop")).await.unwrap();

        assert!(tombstone(&db, RecordId(2)).await.unwrap());
        assert!(!tombstone(&db, RecordId(2)).await.unwrap());
        assert!(matches!(
            get_record(&db, RecordId(2)).await,
            Err(MnemoError::NotFound { .. })
        ));

        assert_eq!(tombstoned_ids(&db).await.unwrap(), vec![RecordId(2)]);
        assert_eq!(purge_tombstoned(&db).await.unwrap(), 1);
        assert_eq!(purge_tombstoned(&db).await.unwrap(), 0);

        let stats = store_stats(&db).await.unwrap();
        assert_eq!(stats.conversation_turns, 1);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(tombstoned_ids(&db).await.unwrap(), vec![RecordId(2)]);
    }

    #[tokio::test]
    async fn tombstoning_unknown_id_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = tombstone(&db, RecordId(5)).await.unwrap_err();
        assert!(matches!(err, MnemoError::NotFound { .. }));
    }
}
