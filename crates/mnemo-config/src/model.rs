// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mnemo memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Mnemo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemoConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// On-disk layout of the log store and vector snapshot.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding, retrieval, and durability settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage layout configuration.
///
/// Both files live in `data_dir`: the structured log as a SQLite database and
/// the vector index as a single snapshot file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the database and the vector snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database file name inside `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Vector index snapshot file name inside `data_dir`.
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            index_file: default_index_file(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("mnemo"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn default_database_file() -> String {
    "mnemo.db".to_string()
}

fn default_index_file() -> String {
    "vector.idx".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Which embedding provider backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Deterministic feature-hashing embedder, no model files needed.
    Hashing,
    /// Local ONNX sentence-transformer (requires the `onnx` feature).
    Onnx,
}

/// Similarity metric of the vector index, fixed when the index is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    InnerProduct,
}

/// Memory engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Embedding provider to use.
    #[serde(default = "default_embedder")]
    pub embedder: EmbedderKind,

    /// Path to `model.onnx` (tokenizer.json must sit next to it). Only used by the onnx embedder.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Embedding dimensionality. Must match the embedder output.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Vector similarity metric.
    #[serde(default = "default_metric")]
    pub metric: SimilarityMetric,

    /// Number of semantic neighbors fetched per retrieval.
    #[serde(default = "default_semantic_k")]
    pub semantic_k: usize,

    /// Number of most recent session records fetched per retrieval.
    #[serde(default = "default_recency_k")]
    pub recency_k: usize,

    /// Records accepted before the vector index is flushed automatically.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u64,

    /// Default token budget for retrieval when the caller does not pass one.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Semantic hits scoring below this are dropped. `None` keeps every hit.
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedder: default_embedder(),
            model_path: None,
            dimension: default_dimension(),
            metric: default_metric(),
            semantic_k: default_semantic_k(),
            recency_k: default_recency_k(),
            flush_threshold: default_flush_threshold(),
            token_budget: default_token_budget(),
            min_similarity: None,
        }
    }
}

fn default_embedder() -> EmbedderKind {
    EmbedderKind::Hashing
}

fn default_dimension() -> usize {
    384
}

fn default_metric() -> SimilarityMetric {
    SimilarityMetric::Cosine
}

fn default_semantic_k() -> usize {
    5
}

fn default_recency_k() -> usize {
    5
}

fn default_flush_threshold() -> u64 {
    10
}

fn default_token_budget() -> usize {
    2000
}
