// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use mnemo_config::model::StorageConfig;
use mnemo_core::types::{DocumentReference, NewRecord, Record, RecordQuery, StoreStats};
use mnemo_core::{
    AdapterType, HealthStatus, MnemoError, PluginAdapter, RecordId, SessionId, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed structured log store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened on the first call to [`StorageAdapter::initialize`].
/// The pending counter tracks appends not yet covered by a vector snapshot.
pub struct SqliteLogStore {
    path: PathBuf,
    wal_mode: bool,
    db: OnceCell<Database>,
    pending: AtomicU64,
}

impl SqliteLogStore {
    /// Create a store for the database file described by `config`.
    ///
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: &StorageConfig) -> Self {
        Self::at_path(config.database_path(), config.wal_mode)
    }

    /// Create a store for an explicit database path.
    pub fn at_path(path: impl Into<PathBuf>, wal_mode: bool) -> Self {
        Self {
            path: path.into(),
            wal_mode,
            db: OnceCell::new(),
            pending: AtomicU64::new(0),
        }
    }

    /// Wrap an already-open database, used with in-memory databases in tests.
    pub fn from_database(db: Database) -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: false,
            db: OnceCell::new_with(Some(db)),
            pending: AtomicU64::new(0),
        }
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, MnemoError> {
        self.db.get().ok_or_else(|| MnemoError::Storage {
            source: "log store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteLogStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("log store not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemoError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteLogStore {
    async fn initialize(&self) -> Result<(), MnemoError> {
        if self.db.initialized() {
            return Ok(());
        }
        let db = Database::open(&self.path, self.wal_mode).await?;
        self.db.set(db).map_err(|_| MnemoError::Storage {
            source: "log store already initialized".into(),
        })?;
        debug!(path = %self.path.display(), "log store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), MnemoError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn append(&self, record: NewRecord) -> Result<Record, MnemoError> {
        let record = queries::append::append_record(self.db()?, record).await?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn get(&self, record_id: RecordId) -> Result<Record, MnemoError> {
        queries::records::get_record(self.db()?, record_id).await
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, MnemoError> {
        queries::records::query_records(self.db()?, query).await
    }

    async fn recent(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Record>, MnemoError> {
        queries::records::recent_records(self.db()?, session_id, limit).await
    }

    async fn records_after(&self, after: RecordId) -> Result<Vec<Record>, MnemoError> {
        queries::records::records_after(self.db()?, after).await
    }

    async fn latest_document(&self, path: &str) -> Result<Option<DocumentReference>, MnemoError> {
        queries::records::latest_document(self.db()?, path).await
    }

    async fn tombstone(&self, record_id: RecordId) -> Result<bool, MnemoError> {
        queries::tombstones::tombstone(self.db()?, record_id).await
    }

    async fn tombstoned_ids(&self) -> Result<Vec<RecordId>, MnemoError> {
        queries::tombstones::tombstoned_ids(self.db()?).await
    }

    async fn purge_tombstoned(&self) -> Result<usize, MnemoError> {
        queries::tombstones::purge_tombstoned(self.db()?).await
    }

    async fn last_record_id(&self) -> Result<RecordId, MnemoError> {
        queries::records::last_record_id(self.db()?).await
    }

    async fn stats(&self) -> Result<StoreStats, MnemoError> {
        queries::records::store_stats(self.db()?).await
    }

    fn count_since_last_flush(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    fn mark_flushed(&self) {
        self.pending.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::Role;

    #[tokio::test]
    async fn uninitialized_store_reports_error() {
        let store = SqliteLogStore::at_path("/nonexistent/mnemo.db", true);
        assert!(store.get(RecordId(1)).await.is_err());
        assert!(matches!(
            store.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn pending_counter_tracks_appends() {
        let store = SqliteLogStore::from_database(Database::open_in_memory().await.unwrap());
        store.append(NewRecord::turn("s1", Role::User, "a")).await.unwrap();
        store.append(NewRecord::turn("s1", Role::User, "b")).await.unwrap();
        assert_eq!(store.count_since_last_flush(), 2);
        store.mark_flushed();
        assert_eq!(store.count_since_last_flush(), 0);
    }

    #[tokio::test]
    async fn adapter_metadata() {
        let store = SqliteLogStore::from_database(Database::open_in_memory().await.unwrap());
        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.adapter_type(), AdapterType::Storage);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
