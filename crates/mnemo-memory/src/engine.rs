// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine: records interactions and assembles context bundles.
//!
//! The engine owns its store, index, and embedder handles; callers construct
//! one instance and share it (it is `Send + Sync`). No lock is held across an
//! embedding call: the store serializes id assignment internally, and the
//! index serializes only the in-memory publish of a new state.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use mnemo_config::model::{MemoryConfig, MnemoConfig};
use mnemo_core::{
    ConversationTurn, EmbeddingAdapter, HealthStatus, MnemoError, NewRecord, Record, RecordId,
    RecordKind, RecordQuery, Role, SessionId, StorageAdapter, StoreStats, ToolStatus,
};
use mnemo_storage::SqliteLogStore;

use crate::durability::{DurabilityManager, DurabilityState, ReconcileReport};
use crate::embedder::{build_embedder, embed_one};
use crate::fusion;
use crate::index::VectorIndex;
use crate::recording;
use crate::types::ContextBundle;

/// Longest document excerpt embedded when no summary is given, in characters.
const EXCERPT_CHARS: usize = 1000;

/// A tool call made while producing an agent reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub input: String,
    pub output: String,
    pub status: ToolStatus,
}

/// Result of registering a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub record: Record,
    /// True when the content hash matched the latest reference for the path.
    pub unchanged: bool,
    /// True when a new vector entry was written.
    pub embedded: bool,
}

/// Result of [`MemoryEngine::compact`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    pub vector_entries_removed: usize,
    pub records_purged: usize,
}

/// Result of [`MemoryEngine::verify_join`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub checked: usize,
    /// Vector entries with no live structured record, now tombstoned.
    pub orphans: usize,
}

/// Engine-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub store: StoreStats,
    pub vector_entries: usize,
    pub vector_tombstones: usize,
    pub indexed_through: RecordId,
    pub pending: u64,
    pub state: DurabilityState,
}

/// Durable conversational memory with hybrid semantic/recency retrieval.
pub struct MemoryEngine {
    store: Arc<dyn StorageAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    index: Arc<VectorIndex>,
    durability: DurabilityManager,
    config: MemoryConfig,
}

impl MemoryEngine {
    /// Opens the engine described by `config`: SQLite log store, configured
    /// embedder, and the vector snapshot in `storage.data_dir`.
    pub async fn open(config: &MnemoConfig) -> Result<Self, MnemoError> {
        let store: Arc<dyn StorageAdapter> = Arc::new(SqliteLogStore::new(&config.storage));
        let embedder = build_embedder(&config.memory)?;
        Self::with_components(
            store,
            embedder,
            config.storage.index_path(),
            config.memory.clone(),
        )
        .await
    }

    /// Assembles an engine from explicit parts and runs startup recovery.
    pub async fn with_components(
        store: Arc<dyn StorageAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        index_path: PathBuf,
        config: MemoryConfig,
    ) -> Result<Self, MnemoError> {
        if embedder.dimensions() != config.dimension {
            return Err(MnemoError::DimensionMismatch {
                expected: config.dimension,
                actual: embedder.dimensions(),
            });
        }

        store.initialize().await?;
        let index = Arc::new(VectorIndex::new(config.dimension, config.metric, index_path));
        let durability = DurabilityManager::new(
            Arc::clone(&store),
            Arc::clone(&index),
            Arc::clone(&embedder),
            config.flush_threshold,
        );

        let report = durability.reconcile().await?;
        info!(
            store = store.name(),
            embedder = embedder.name(),
            dimension = config.dimension,
            recovered = report.embedded,
            "memory engine ready"
        );

        Ok(Self {
            store,
            embedder,
            index,
            durability,
            config,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &dyn StorageAdapter {
        self.store.as_ref()
    }

    pub fn durability_state(&self) -> DurabilityState {
        self.durability.state()
    }

    /// Commits a record and, if it carries natural-language text, indexes it.
    ///
    /// A rejected write returns [`MnemoError::PersistenceFailure`] and no id.
    /// Once the record is committed the call succeeds: an embedder failure
    /// defers indexing to the next reconciliation pass, and any other index
    /// error is logged with the record left structured-only.
    pub async fn remember(&self, record: NewRecord) -> Result<Record, MnemoError> {
        let committed = self.store.append(record).await?;
        self.durability.note_write();
        recording::record_remembered(committed.kind());
        debug!(
            record_id = %committed.record_id(),
            kind = %committed.kind(),
            session_id = committed.session_id().map(SessionId::as_str),
            "record committed"
        );

        if let Err(e) = self.durability.index_record(&committed).await {
            warn!(record_id = %committed.record_id(), error = %e, "record committed but not indexed");
        }
        self.auto_flush().await;
        Ok(committed)
    }

    async fn auto_flush(&self) {
        match self.durability.maybe_flush().await {
            Ok(true) => debug!("automatic flush complete"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "automatic flush failed, index stays buffered"),
        }
    }

    /// Records a full exchange: the user turn, each tool call, then the agent reply.
    pub async fn remember_exchange(
        &self,
        session_id: &SessionId,
        user_text: &str,
        agent_text: &str,
        tools_used: Vec<ToolCall>,
    ) -> Result<Vec<Record>, MnemoError> {
        let mut records = Vec::with_capacity(tools_used.len() + 2);
        records.push(
            self.remember(NewRecord::turn(session_id.clone(), Role::User, user_text))
                .await?,
        );
        for call in tools_used {
            records.push(
                self.remember(NewRecord::ToolInvocation {
                    session_id: session_id.clone(),
                    tool_name: call.tool_name,
                    input: call.input,
                    output: call.output,
                    status: call.status,
                })
                .await?,
            );
        }
        records.push(
            self.remember(NewRecord::turn(session_id.clone(), Role::Agent, agent_text))
                .await?,
        );
        Ok(records)
    }

    /// Registers an access to a local document.
    ///
    /// If `content` hashes to the same value as the latest reference for
    /// `path`, a reference without summary is appended for access tracking
    /// and nothing is embedded. Otherwise the summary (or an excerpt of the
    /// content) is stored and embedded.
    pub async fn remember_document(
        &self,
        path: &str,
        content: &str,
        summary: Option<String>,
    ) -> Result<DocumentOutcome, MnemoError> {
        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
        let unchanged = self
            .store
            .latest_document(path)
            .await?
            .is_some_and(|previous| previous.content_hash == content_hash);

        let summary = if unchanged {
            None
        } else {
            summary
                .filter(|s| !s.trim().is_empty())
                .or_else(|| excerpt(content))
        };
        let record = self
            .remember(NewRecord::DocumentReference {
                path: path.to_string(),
                content_hash,
                summary,
            })
            .await?;
        let embedded = self.index.contains(record.record_id());

        debug!(path, unchanged, embedded, "document registered");
        Ok(DocumentOutcome {
            record,
            unchanged,
            embedded,
        })
    }

    /// Builds a context bundle for `query_text` within `token_budget` tokens.
    ///
    /// Semantic and recency failures degrade to fewer candidates; only a
    /// dimension mismatch (a misconfigured embedder) is returned as an error.
    pub async fn retrieve(
        &self,
        query_text: &str,
        session_id: &SessionId,
        token_budget: usize,
    ) -> Result<ContextBundle, MnemoError> {
        recording::record_retrieval();

        let semantic = match self.semantic_candidates(query_text).await {
            Ok(hits) => hits,
            Err(e @ MnemoError::DimensionMismatch { .. }) => return Err(e),
            Err(e) => {
                warn!(error = %e, "semantic recall unavailable, continuing with recency only");
                Vec::new()
            }
        };

        let recent = match self.store.recent(session_id, self.config.recency_k).await {
            Ok(records) => records,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "recent history unavailable");
                Vec::new()
            }
        };

        let candidates = fusion::merge_candidates(semantic, recent);
        let bundle = fusion::assemble(candidates, token_budget);
        debug!(
            session_id = %session_id,
            items = bundle.len(),
            truncated = bundle.truncated,
            token_budget,
            "context assembled"
        );
        Ok(bundle)
    }

    /// Retrieves with the configured default budget.
    pub async fn retrieve_default(
        &self,
        query_text: &str,
        session_id: &SessionId,
    ) -> Result<ContextBundle, MnemoError> {
        self.retrieve(query_text, session_id, self.config.token_budget)
            .await
    }

    /// Nearest neighbors of `query_text`, joined to their live records.
    async fn semantic_candidates(&self, query_text: &str) -> Result<Vec<(Record, f32)>, MnemoError> {
        if query_text.trim().is_empty() || self.config.semantic_k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = embed_one(self.embedder.as_ref(), query_text).await?;
        let hits = self.index.query(&vector, self.config.semantic_k)?;

        let mut joined = Vec::with_capacity(hits.len());
        for hit in hits {
            if self
                .config
                .min_similarity
                .is_some_and(|floor| hit.score < floor)
            {
                continue;
            }
            match self.store.get(hit.record_id).await {
                Ok(record) => joined.push((record, hit.score)),
                Err(MnemoError::NotFound { record_id }) => {
                    debug!(record_id = %record_id, "semantic hit has no live record, skipped");
                }
                Err(e) => {
                    warn!(record_id = %hit.record_id, error = %e, "semantic hit lookup failed, skipped");
                }
            }
        }
        Ok(joined)
    }

    /// The last `limit` conversation turns of a session, oldest first.
    pub async fn recent_turns(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, MnemoError> {
        let query = RecordQuery::new(RecordKind::ConversationTurn, limit).session(session_id.clone());
        let mut turns: Vec<ConversationTurn> = self
            .store
            .query(&query)
            .await?
            .into_iter()
            .filter_map(|record| match record {
                Record::ConversationTurn(turn) => Some(turn),
                _ => None,
            })
            .collect();
        turns.reverse();
        Ok(turns)
    }

    /// Point lookup of a live record.
    pub async fn get(&self, record_id: RecordId) -> Result<Record, MnemoError> {
        self.store.get(record_id).await
    }

    /// Filtered scan of the log store.
    pub async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, MnemoError> {
        self.store.query(query).await
    }

    /// Tombstones a record in both stores. Returns false if already forgotten.
    pub async fn forget(&self, record_id: RecordId) -> Result<bool, MnemoError> {
        let newly = self.store.tombstone(record_id).await?;
        self.index.tombstone(record_id)?;
        self.durability.note_write();
        info!(record_id = %record_id, newly, "record forgotten");
        Ok(newly)
    }

    /// Appends `replacement` and tombstones `record_id`.
    pub async fn correct(
        &self,
        record_id: RecordId,
        replacement: NewRecord,
    ) -> Result<Record, MnemoError> {
        self.store.get(record_id).await?;
        let record = self.remember(replacement).await?;
        self.forget(record_id).await?;
        info!(replaced = %record_id, record_id = %record.record_id(), "record corrected");
        Ok(record)
    }

    /// Physically removes tombstoned data from both stores, then flushes.
    pub async fn compact(&self) -> Result<CompactionReport, MnemoError> {
        let vector_entries_removed = self.index.compact()?;
        let records_purged = self.store.purge_tombstoned().await?;
        self.durability.note_write();
        self.durability.flush().await?;
        info!(vector_entries_removed, records_purged, "compaction complete");
        Ok(CompactionReport {
            vector_entries_removed,
            records_purged,
        })
    }

    /// Retries deferred embeddings, re-applies store tombstones, and flushes.
    pub async fn repair(&self) -> Result<ReconcileReport, MnemoError> {
        let mut report = self.durability.catch_up().await?;
        report.tombstones_synced = self.durability.sync_tombstones().await?;
        self.durability.snapshot().await?;
        info!(embedded = report.embedded, deferred = report.deferred, "repair complete");
        Ok(report)
    }

    /// Checks that every live vector entry joins to a live structured record.
    ///
    /// Orphans are tombstoned in the index.
    pub async fn verify_join(&self) -> Result<JoinReport, MnemoError> {
        let ids = self.index.live_record_ids();
        let mut report = JoinReport {
            checked: ids.len(),
            orphans: 0,
        };
        for record_id in ids {
            match self.store.get(record_id).await {
                Ok(_) => {}
                Err(MnemoError::NotFound { .. }) => {
                    warn!(record_id = %record_id, "vector entry without structured record");
                    self.index.tombstone(record_id)?;
                    report.orphans += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if report.orphans > 0 {
            self.durability.note_write();
        }
        Ok(report)
    }

    /// Buffered -> Flushed.
    pub async fn flush(&self) -> Result<(), MnemoError> {
        self.durability.flush().await
    }

    pub async fn stats(&self) -> Result<EngineStats, MnemoError> {
        Ok(EngineStats {
            store: self.store.stats().await?,
            vector_entries: self.index.len(),
            vector_tombstones: self.index.tombstone_count(),
            indexed_through: self.index.indexed_through(),
            pending: self.store.count_since_last_flush(),
            state: self.durability.state(),
        })
    }

    /// Worst health of the store and the embedder.
    pub async fn health(&self) -> Result<HealthStatus, MnemoError> {
        let store = self.store.health_check().await?;
        let embedder = self.embedder.health_check().await?;
        Ok(match (store, embedder) {
            (HealthStatus::Unhealthy(reason), _) | (_, HealthStatus::Unhealthy(reason)) => {
                HealthStatus::Unhealthy(reason)
            }
            (HealthStatus::Degraded(reason), _) | (_, HealthStatus::Degraded(reason)) => {
                HealthStatus::Degraded(reason)
            }
            _ => HealthStatus::Healthy,
        })
    }

    /// Flushes the index and closes the store.
    pub async fn close(&self) -> Result<(), MnemoError> {
        self.durability.flush().await?;
        self.store.close().await?;
        self.embedder.shutdown().await?;
        info!("memory engine closed");
        Ok(())
    }
}

/// Leading slice of `content` used in place of a missing summary.
fn excerpt(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(EXCERPT_CHARS).collect())
}
