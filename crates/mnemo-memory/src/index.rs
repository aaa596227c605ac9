// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process vector index with lock-free reads and snapshot persistence.
//!
//! Readers load an immutable [`IndexState`] through `ArcSwap` and never block.
//! Writers are serialized by a mutex, build the next state from the current
//! one, and publish it atomically, so a concurrent query sees either the pre-
//! or post-insert view. Entries live in sealed, shared chunks plus a small
//! tail, which keeps the per-insert copy bounded by the chunk size.
//!
//! The index also tracks which record ids have been *processed* (embedded,
//! or determined to need no embedding). The contiguous prefix of processed
//! ids is the `indexed_through` watermark persisted with every snapshot;
//! recovery replays structured records above it.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use arc_swap::ArcSwap;
use mnemo_config::model::SimilarityMetric;
use mnemo_core::{MnemoError, RecordId};
use tracing::{debug, info};

use crate::recording;
use crate::snapshot;
use crate::types::{cosine_similarity, dot_product, ScoredHit, VectorEntry};

/// Entries per sealed chunk.
const CHUNK_LEN: usize = 256;

/// Immutable view of the index published to readers.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    sealed: Vec<Arc<Vec<VectorEntry>>>,
    tail: Arc<Vec<VectorEntry>>,
    tombstones: Arc<BTreeSet<RecordId>>,
    indexed_through: RecordId,
    ahead: BTreeSet<RecordId>,
}

impl IndexState {
    /// Rebuilds a state from decoded snapshot parts.
    pub(crate) fn from_parts(
        entries: Vec<VectorEntry>,
        tombstones: BTreeSet<RecordId>,
        indexed_through: RecordId,
        ahead: BTreeSet<RecordId>,
    ) -> Self {
        let mut state = IndexState {
            tombstones: Arc::new(tombstones),
            indexed_through,
            ahead,
            ..IndexState::default()
        };
        for entry in entries {
            state.push(entry);
        }
        state
    }

    /// All entries in insertion order, tombstoned ones included.
    pub fn entries(&self) -> impl Iterator<Item = &VectorEntry> {
        self.sealed
            .iter()
            .flat_map(|chunk| chunk.iter())
            .chain(self.tail.iter())
    }

    /// Entries not covered by a tombstone.
    pub fn live_entries(&self) -> impl Iterator<Item = &VectorEntry> {
        self.entries()
            .filter(|entry| !self.tombstones.contains(&entry.record_id))
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LEN + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tombstones(&self) -> &BTreeSet<RecordId> {
        &self.tombstones
    }

    pub fn indexed_through(&self) -> RecordId {
        self.indexed_through
    }

    /// Processed ids above the watermark (the watermark is waiting on a gap).
    pub fn processed_ahead(&self) -> &BTreeSet<RecordId> {
        &self.ahead
    }

    pub fn is_processed(&self, record_id: RecordId) -> bool {
        record_id <= self.indexed_through || self.ahead.contains(&record_id)
    }

    fn push(&mut self, entry: VectorEntry) {
        Arc::make_mut(&mut self.tail).push(entry);
        if self.tail.len() == CHUNK_LEN {
            let full = std::mem::take(&mut self.tail);
            self.sealed.push(full);
        }
    }

    fn mark_processed(&mut self, record_id: RecordId) {
        if self.is_processed(record_id) {
            return;
        }
        if record_id == self.indexed_through.next() {
            self.indexed_through = record_id;
            while self.ahead.remove(&self.indexed_through.next()) {
                self.indexed_through = self.indexed_through.next();
            }
        } else {
            self.ahead.insert(record_id);
        }
    }
}

/// Ranking used for nearest-neighbor results: score descending, then newer
/// `created_at`, then higher record id.
pub fn compare_hits(a: &ScoredHit, b: &ScoredHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.record_id.cmp(&a.record_id))
}

/// Exact (flat) nearest-neighbor index over embedded records.
pub struct VectorIndex {
    dimension: usize,
    metric: SimilarityMetric,
    snapshot_path: PathBuf,
    state: ArcSwap<IndexState>,
    write_lock: Mutex<()>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl VectorIndex {
    /// Creates an empty index bound to a snapshot file.
    ///
    /// Nothing is read from disk until [`VectorIndex::load`] is called.
    pub fn new(dimension: usize, metric: SimilarityMetric, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            metric,
            snapshot_path: snapshot_path.into(),
            state: ArcSwap::from_pointee(IndexState::default()),
            write_lock: Mutex::new(()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Current immutable view.
    pub fn state(&self) -> Arc<IndexState> {
        self.state.load_full()
    }

    pub fn len(&self) -> usize {
        self.state.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.load().is_empty()
    }

    pub fn tombstone_count(&self) -> usize {
        self.state.load().tombstones.len()
    }

    pub fn indexed_through(&self) -> RecordId {
        self.state.load().indexed_through
    }

    pub fn is_processed(&self, record_id: RecordId) -> bool {
        self.state.load().is_processed(record_id)
    }

    /// Whether a live (non-tombstoned) entry exists for `record_id`.
    pub fn contains(&self, record_id: RecordId) -> bool {
        self.state
            .load()
            .live_entries()
            .any(|entry| entry.record_id == record_id)
    }

    /// Record ids of every live entry.
    pub fn live_record_ids(&self) -> Vec<RecordId> {
        self.state
            .load()
            .live_entries()
            .map(|entry| entry.record_id)
            .collect()
    }

    fn check_dimension(&self, actual: usize) -> Result<(), MnemoError> {
        if actual != self.dimension {
            return Err(MnemoError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    /// Applies `f` to a copy of the current state and publishes the result.
    fn update<R>(&self, f: impl FnOnce(&mut IndexState) -> R) -> Result<R, MnemoError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| MnemoError::Internal(format!("vector index write lock poisoned: {e}")))?;
        let mut next = IndexState::clone(&self.state.load());
        let out = f(&mut next);
        self.state.store(Arc::new(next));
        Ok(out)
    }

    /// Inserts an entry and marks its record processed.
    ///
    /// Returns `Ok(false)` without inserting if the record was already
    /// processed, so racing repair and remember paths never duplicate an entry.
    pub fn insert(&self, entry: VectorEntry) -> Result<bool, MnemoError> {
        self.check_dimension(entry.vector.len())?;
        let record_id = entry.record_id;
        let inserted = self.update(|state| {
            if state.is_processed(record_id) {
                return false;
            }
            state.push(entry);
            state.mark_processed(record_id);
            true
        })?;
        if inserted {
            debug!(record_id = %record_id, "vector entry inserted");
        }
        Ok(inserted)
    }

    /// Marks a record as needing no vector entry (not embeddable, or gone).
    pub fn mark_processed(&self, record_id: RecordId) -> Result<(), MnemoError> {
        self.update(|state| state.mark_processed(record_id))
    }

    /// Hides `record_id` from queries. Returns false if already tombstoned.
    pub fn tombstone(&self, record_id: RecordId) -> Result<bool, MnemoError> {
        self.update(|state| {
            state.mark_processed(record_id);
            Arc::make_mut(&mut state.tombstones).insert(record_id)
        })
    }

    /// Physically drops tombstoned entries. Returns the number removed.
    pub fn compact(&self) -> Result<usize, MnemoError> {
        let removed = self.update(|state| {
            let before = state.len();
            let kept: Vec<VectorEntry> = state.live_entries().cloned().collect();
            let removed = before - kept.len();
            *state = IndexState::from_parts(
                kept,
                BTreeSet::new(),
                state.indexed_through,
                std::mem::take(&mut state.ahead),
            );
            removed
        })?;
        info!(removed, "vector index compacted");
        Ok(removed)
    }

    /// Up to `k` nearest live entries, best first.
    ///
    /// Returns fewer than `k` hits only when fewer live entries exist. An
    /// empty index yields an empty result.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredHit>, MnemoError> {
        self.check_dimension(vector.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.load();
        let mut hits: Vec<ScoredHit> = state
            .live_entries()
            .map(|entry| ScoredHit {
                record_id: entry.record_id,
                score: self.score(vector, &entry.vector),
                created_at: entry.created_at,
            })
            .collect();

        if hits.len() > k {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_by(compare_hits);
        Ok(hits)
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            SimilarityMetric::Cosine => cosine_similarity(a, b),
            SimilarityMetric::InnerProduct => dot_product(a, b),
        }
    }

    /// Writes the current state to the snapshot file.
    ///
    /// The snapshot is written to a temp file, synced, and renamed over the
    /// old one. Queries and inserts proceed while it runs; the file reflects
    /// the state at the moment persist began.
    pub async fn persist(&self) -> Result<(), MnemoError> {
        let _guard = self.persist_lock.lock().await;
        let started = Instant::now();
        let state = self.state.load_full();
        let entries = state.len();
        let (dimension, metric, path) = (self.dimension, self.metric, self.snapshot_path.clone());

        let bytes = tokio::task::spawn_blocking(move || {
            let bytes = snapshot::encode(&state, dimension, metric);
            snapshot::write_atomic(&path, &bytes)?;
            Ok::<usize, MnemoError>(bytes.len())
        })
        .await
        .map_err(|e| MnemoError::Internal(format!("snapshot task failed: {e}")))??;

        let elapsed = started.elapsed().as_secs_f64();
        recording::record_persist(elapsed);
        debug!(
            path = %self.snapshot_path.display(),
            entries,
            bytes,
            elapsed_secs = elapsed,
            "vector index persisted"
        );
        Ok(())
    }

    /// Replaces the in-memory state with the last persisted snapshot.
    ///
    /// A missing or corrupt snapshot resets the index to empty and returns
    /// [`MnemoError::IndexUnavailable`]; the index stays usable either way.
    pub async fn load(&self) -> Result<(), MnemoError> {
        let _guard = self.persist_lock.lock().await;

        let loaded = match tokio::fs::read(&self.snapshot_path).await {
            Ok(bytes) => snapshot::decode(&bytes, self.dimension, self.metric).map_err(|e| e.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(format!(
                "no snapshot at {}",
                self.snapshot_path.display()
            )),
            Err(e) => Err(format!(
                "cannot read {}: {e}",
                self.snapshot_path.display()
            )),
        };

        match loaded {
            Ok(state) => {
                let entries = state.len();
                let indexed_through = state.indexed_through;
                self.update(|current| *current = state)?;
                info!(
                    path = %self.snapshot_path.display(),
                    entries,
                    indexed_through = %indexed_through,
                    "vector index loaded"
                );
                Ok(())
            }
            Err(reason) => {
                self.update(|current| *current = IndexState::default())?;
                Err(MnemoError::IndexUnavailable { reason })
            }
        }
    }
}
