// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the structured interaction log.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    DocumentReference, NewRecord, Record, RecordId, RecordQuery, SessionId, StoreStats,
};

/// Adapter for the append-only structured log of interactions.
///
/// Every record receives the next id from a single global sequence shared by
/// all record kinds. Ids are never reused and the sequence never skips: a
/// failed append leaves the sequence untouched.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, sequence state).
    async fn initialize(&self) -> Result<(), MnemoError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), MnemoError>;

    /// Appends a record, assigning the next global id and its timestamp.
    ///
    /// Returns the committed record. On failure returns
    /// [`MnemoError::PersistenceFailure`] and no id is consumed.
    async fn append(&self, record: NewRecord) -> Result<Record, MnemoError>;

    /// Point lookup. Tombstoned records are reported as [`MnemoError::NotFound`].
    async fn get(&self, record_id: RecordId) -> Result<Record, MnemoError>;

    /// Filtered range scan over a single record kind, most recent first.
    async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, MnemoError>;

    /// The most recent turns and tool invocations of a session, most recent first.
    async fn recent(&self, session_id: &SessionId, limit: usize)
    -> Result<Vec<Record>, MnemoError>;

    /// All live records with an id greater than `after`, in id order.
    async fn records_after(&self, after: RecordId) -> Result<Vec<Record>, MnemoError>;

    /// The newest live reference for a document path, if any.
    async fn latest_document(&self, path: &str)
    -> Result<Option<DocumentReference>, MnemoError>;

    /// Marks a record as logically deleted. Returns false if it was already tombstoned.
    async fn tombstone(&self, record_id: RecordId) -> Result<bool, MnemoError>;

    /// Every tombstoned id, ascending. Includes ids whose rows were purged.
    async fn tombstoned_ids(&self) -> Result<Vec<RecordId>, MnemoError>;

    /// Physically removes tombstoned rows. Returns the number of rows removed.
    async fn purge_tombstoned(&self) -> Result<usize, MnemoError>;

    /// Highest id ever issued by the sequence (zero on a fresh store).
    async fn last_record_id(&self) -> Result<RecordId, MnemoError>;

    /// Per-kind counts and sequence position.
    async fn stats(&self) -> Result<StoreStats, MnemoError>;

    /// Number of records appended since the last durability checkpoint.
    fn count_since_last_flush(&self) -> u64;

    /// Resets the pending counter after a checkpoint.
    fn mark_flushed(&self);
}
