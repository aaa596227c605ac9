// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durability coordination between the log store and the vector index.
//!
//! Structured records are durable when `append` returns. The vector index is
//! durable only as of its last snapshot, so the manager tracks two states:
//! `Buffered` (index changes since the last snapshot) and `Flushed`. A flush
//! happens on request or once the store's pending count reaches the
//! configured threshold.
//!
//! `flush_lock` only serializes snapshot writes. Embedding never happens
//! under it: an automatic flush just persists, and an explicit flush runs
//! its catch-up pass before taking the lock. Records being embedded are
//! claimed in `in_flight`, so concurrent passes never embed one twice.
//!
//! On startup the snapshot is loaded and every structured record above the
//! snapshot's `indexed_through` watermark is replayed: records already in
//! the index are only marked processed, the rest are embedded once.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use mnemo_core::{EmbeddingAdapter, MnemoError, Record, RecordId, StorageAdapter};

use crate::embedder::embed_one;
use crate::index::VectorIndex;
use crate::recording;
use crate::types::VectorEntry;

/// Durability state of the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityState {
    /// Index changes accepted in memory but not yet in a snapshot.
    Buffered,
    /// The snapshot reflects every index change.
    Flushed,
}

/// What happened when a record was offered to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Embedded,
    /// No embeddable text; marked processed.
    Skipped,
    /// Already processed by an earlier pass.
    AlreadyIndexed,
    /// The embedder failed; the record stays structured-only until the next pass.
    Deferred,
    /// Another task is embedding the record right now.
    InFlight,
    /// The vector did not match the index dimension. Marked processed and
    /// never retried.
    Rejected,
}

/// Counts from a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Structured records above the watermark that were examined.
    pub scanned: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub already_indexed: usize,
    pub deferred: usize,
    /// Records another task was embedding during the pass.
    pub in_flight: usize,
    /// Records whose vectors had the wrong dimension.
    pub rejected: usize,
    /// Sequence ids with no live record (tombstoned or purged).
    pub gaps: usize,
    /// Store tombstones newly applied to the index.
    pub tombstones_synced: usize,
    /// Whether a snapshot was found at load time (startup only).
    pub snapshot_loaded: bool,
}

/// Coordinates flushes and crash recovery for one engine.
pub struct DurabilityManager {
    store: Arc<dyn StorageAdapter>,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingAdapter>,
    flush_threshold: u64,
    dirty: AtomicBool,
    flush_lock: tokio::sync::Mutex<()>,
    in_flight: Mutex<HashSet<RecordId>>,
}

/// Exclusive right to embed one record; released on drop.
struct Claim<'a> {
    record_id: RecordId,
    claims: &'a Mutex<HashSet<RecordId>>,
}

impl<'a> Claim<'a> {
    fn acquire(
        claims: &'a Mutex<HashSet<RecordId>>,
        record_id: RecordId,
    ) -> Result<Option<Self>, MnemoError> {
        let mut held = claims
            .lock()
            .map_err(|e| MnemoError::Internal(format!("in-flight claim lock poisoned: {e}")))?;
        if !held.insert(record_id) {
            return Ok(None);
        }
        Ok(Some(Self { record_id, claims }))
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.claims.lock() {
            held.remove(&self.record_id);
        }
    }
}

impl DurabilityManager {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingAdapter>,
        flush_threshold: u64,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            flush_threshold: flush_threshold.max(1),
            dirty: AtomicBool::new(false),
            flush_lock: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> DurabilityState {
        if self.dirty.load(Ordering::SeqCst) {
            DurabilityState::Buffered
        } else {
            DurabilityState::Flushed
        }
    }

    pub fn flush_threshold(&self) -> u64 {
        self.flush_threshold
    }

    /// Records that the index or the store changed since the last snapshot.
    pub fn note_write(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Embeds and indexes one committed record, or marks it processed.
    ///
    /// Embedder failures are deferred, not returned: the record is committed
    /// and gets picked up by the next reconciliation pass. A vector of the
    /// wrong dimension is logged and the record marked processed, since
    /// retrying cannot fix it.
    pub async fn index_record(&self, record: &Record) -> Result<IndexOutcome, MnemoError> {
        let record_id = record.record_id();
        if self.index.is_processed(record_id) {
            return Ok(IndexOutcome::AlreadyIndexed);
        }

        let Some(text) = record.embeddable_text() else {
            self.index.mark_processed(record_id)?;
            return Ok(IndexOutcome::Skipped);
        };

        let Some(_claim) = Claim::acquire(&self.in_flight, record_id)? else {
            return Ok(IndexOutcome::InFlight);
        };
        // Another pass may have finished this record before the claim.
        if self.index.is_processed(record_id) {
            return Ok(IndexOutcome::AlreadyIndexed);
        }

        let vector = match embed_one(self.embedder.as_ref(), &text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "embedding failed, record deferred to next reconcile");
                return Ok(IndexOutcome::Deferred);
            }
        };

        let inserted = match self.index.insert(VectorEntry {
            record_id,
            vector,
            text,
            created_at: record.created_at(),
        }) {
            Ok(inserted) => inserted,
            Err(MnemoError::DimensionMismatch { expected, actual }) => {
                error!(record_id = %record_id, expected, actual, "embedding has the wrong dimension, record left structured-only");
                self.index.mark_processed(record_id)?;
                self.note_write();
                return Ok(IndexOutcome::Rejected);
            }
            Err(e) => return Err(e),
        };
        self.note_write();
        Ok(if inserted {
            IndexOutcome::Embedded
        } else {
            IndexOutcome::AlreadyIndexed
        })
    }

    /// Brings the index up to date with the log store.
    ///
    /// Replays every live record above the watermark and marks sequence gaps
    /// (tombstoned or purged ids) processed so the watermark can advance.
    pub async fn catch_up(&self) -> Result<ReconcileReport, MnemoError> {
        let last = self.store.last_record_id().await?;
        let from = self.index.indexed_through();
        let records = self.store.records_after(from).await?;

        let mut report = ReconcileReport {
            scanned: records.len(),
            ..ReconcileReport::default()
        };
        let present: BTreeSet<_> = records.iter().map(Record::record_id).collect();

        for record in &records {
            match self.index_record(record).await? {
                IndexOutcome::Embedded => report.embedded += 1,
                IndexOutcome::Skipped => report.skipped += 1,
                IndexOutcome::AlreadyIndexed => report.already_indexed += 1,
                IndexOutcome::Deferred => report.deferred += 1,
                IndexOutcome::InFlight => report.in_flight += 1,
                IndexOutcome::Rejected => report.rejected += 1,
            }
        }

        let mut id = from.next();
        while id <= last {
            if !present.contains(&id) && !self.index.is_processed(id) {
                self.index.mark_processed(id)?;
                report.gaps += 1;
            }
            id = id.next();
        }

        if report.embedded + report.skipped + report.rejected + report.gaps > 0 {
            self.note_write();
        }
        debug!(
            from = %from,
            last = %last,
            scanned = report.scanned,
            embedded = report.embedded,
            deferred = report.deferred,
            "catch-up pass complete"
        );
        Ok(report)
    }

    /// Applies store tombstones the index has not seen, e.g. a forget whose
    /// index change was lost in a crash. Returns how many were applied.
    pub async fn sync_tombstones(&self) -> Result<usize, MnemoError> {
        let live: BTreeSet<_> = self.index.live_record_ids().into_iter().collect();
        let mut applied = 0;
        for record_id in self.store.tombstoned_ids().await? {
            if live.contains(&record_id) {
                self.index.tombstone(record_id)?;
                applied += 1;
            }
        }
        if applied > 0 {
            self.note_write();
            debug!(applied, "store tombstones applied to index");
        }
        Ok(applied)
    }

    /// Startup recovery: load the snapshot, replay records above its
    /// watermark, sync tombstones, and write a fresh snapshot.
    pub async fn reconcile(&self) -> Result<ReconcileReport, MnemoError> {
        let snapshot_loaded = match self.index.load().await {
            Ok(()) => true,
            Err(MnemoError::IndexUnavailable { reason }) => {
                info!(reason = %reason, "starting with an empty vector index");
                false
            }
            Err(e) => return Err(e),
        };

        let mut report = self.catch_up().await?;
        report.tombstones_synced = self.sync_tombstones().await?;
        report.snapshot_loaded = snapshot_loaded;

        if !snapshot_loaded {
            self.note_write();
        }
        self.snapshot().await?;

        info!(
            indexed_through = %self.index.indexed_through(),
            entries = self.index.len(),
            embedded = report.embedded,
            deferred = report.deferred,
            snapshot_loaded,
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Whether the pending count has reached the flush threshold.
    pub fn should_flush(&self) -> bool {
        self.store.count_since_last_flush() >= self.flush_threshold
    }

    /// Flushes if the threshold is reached. Returns whether a flush ran.
    ///
    /// Called on the `remember` path, so it only snapshots: deferred records
    /// wait for the next explicit flush, repair, or startup reconcile.
    pub async fn maybe_flush(&self) -> Result<bool, MnemoError> {
        if !self.should_flush() {
            return Ok(false);
        }
        let _guard = self.flush_lock.lock().await;
        // A concurrent flush may have covered this one while we waited.
        if !self.should_flush() {
            return Ok(false);
        }
        self.persist_locked().await?;
        Ok(true)
    }

    /// Buffered -> Flushed: retries deferred records, then snapshots the index.
    pub async fn flush(&self) -> Result<(), MnemoError> {
        if self.index.indexed_through() < self.store.last_record_id().await? {
            let report = self.catch_up().await?;
            if report.deferred > 0 {
                warn!(deferred = report.deferred, "some records are still waiting for embeddings");
            }
        }

        self.snapshot().await
    }

    /// Snapshots the index without a catch-up pass.
    pub async fn snapshot(&self) -> Result<(), MnemoError> {
        let _guard = self.flush_lock.lock().await;
        self.persist_locked().await
    }

    /// Writes the snapshot. Callers hold `flush_lock`.
    async fn persist_locked(&self) -> Result<(), MnemoError> {
        let was_dirty = self.dirty.swap(false, Ordering::SeqCst);
        if let Err(e) = self.index.persist().await {
            if was_dirty {
                self.dirty.store(true, Ordering::SeqCst);
            }
            return Err(e);
        }
        self.store.mark_flushed();
        recording::record_flush();
        debug!(
            indexed_through = %self.index.indexed_through(),
            entries = self.index.len(),
            "index flushed"
        );
        Ok(())
    }
}
