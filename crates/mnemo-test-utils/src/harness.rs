// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine harness over a temp directory.
//!
//! `TestEngine` owns the temp dir holding the SQLite file and the vector
//! snapshot, and can restart the engine cleanly or simulate a crash (drop
//! without flushing) to exercise startup reconciliation.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use mnemo_config::model::MemoryConfig;
use mnemo_core::{EmbeddingAdapter, MnemoError, StorageAdapter};
use mnemo_memory::MemoryEngine;
use mnemo_storage::SqliteLogStore;

use crate::mock_embedder::ScriptedEmbedder;

/// Dimension used by harness defaults; small enough to script by hand.
pub const TEST_DIMENSION: usize = 16;

/// A memory engine backed by a temp directory.
pub struct TestEngine {
    engine: MemoryEngine,
    config: MemoryConfig,
    /// Kept alive so the directory is removed on drop.
    dir: tempfile::TempDir,
}

impl TestEngine {
    /// Memory config used by [`TestEngine::new`].
    pub fn default_config() -> MemoryConfig {
        MemoryConfig {
            dimension: TEST_DIMENSION,
            ..MemoryConfig::default()
        }
    }

    /// Engine with default test config and a fresh [`ScriptedEmbedder`].
    pub async fn new() -> Result<(Self, Arc<ScriptedEmbedder>), MnemoError> {
        let config = Self::default_config();
        let embedder = Arc::new(ScriptedEmbedder::new(config.dimension));
        let engine = Self::with_embedder(config, embedder.clone()).await?;
        Ok((engine, embedder))
    }

    /// Engine with an explicit config and embedder.
    pub async fn with_embedder(
        config: MemoryConfig,
        embedder: Arc<dyn EmbeddingAdapter>,
    ) -> Result<Self, MnemoError> {
        let dir = tempfile::TempDir::new().map_err(|e| MnemoError::Storage { source: e.into() })?;
        let engine = Self::open(&dir, &config, embedder).await?;
        Ok(Self {
            engine,
            config,
            dir,
        })
    }

    async fn open(
        dir: &tempfile::TempDir,
        config: &MemoryConfig,
        embedder: Arc<dyn EmbeddingAdapter>,
    ) -> Result<MemoryEngine, MnemoError> {
        let store: Arc<dyn StorageAdapter> =
            Arc::new(SqliteLogStore::at_path(dir.path().join("mnemo.db"), true));
        MemoryEngine::with_components(store, embedder, dir.path().join("vector.idx"), config.clone())
            .await
    }

    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("mnemo.db")
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.path().join("vector.idx")
    }

    /// Closes the engine (flushing the index) and reopens it with `embedder`.
    pub async fn restart(self, embedder: Arc<dyn EmbeddingAdapter>) -> Result<Self, MnemoError> {
        self.engine.close().await?;
        let Self { engine, config, dir } = self;
        drop(engine);
        let engine = Self::open(&dir, &config, embedder).await?;
        Ok(Self {
            engine,
            config,
            dir,
        })
    }

    /// Drops the engine without flushing and reopens it with `embedder`.
    ///
    /// Committed structured records survive; index changes since the last
    /// snapshot are lost and must be recovered by reconciliation.
    pub async fn crash(self, embedder: Arc<dyn EmbeddingAdapter>) -> Result<Self, MnemoError> {
        let Self { engine, config, dir } = self;
        drop(engine);
        let engine = Self::open(&dir, &config, embedder).await?;
        Ok(Self {
            engine,
            config,
            dir,
        })
    }
}

impl Deref for TestEngine {
    type Target = MemoryEngine;

    fn deref(&self) -> &MemoryEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{NewRecord, Role};

    #[tokio::test]
    async fn harness_builds_engine_in_temp_dir() {
        let (engine, embedder) = TestEngine::new().await.unwrap();
        engine
            .remember(NewRecord::turn("s1", Role::User, "hello there"))
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 1);
        assert!(engine.db_path().exists());
        // Startup reconciliation writes an initial snapshot.
        assert!(engine.index_path().exists());
    }
}
