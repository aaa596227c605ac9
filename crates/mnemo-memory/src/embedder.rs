// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding providers and the factory that selects one from configuration.
//!
//! The default [`HashingEmbedder`] needs no model files: each lowercase word
//! is hashed with SHA-256 into a signed bucket, and the bucket counts are
//! L2-normalized. It is deterministic across processes, so vectors stored in
//! a snapshot stay comparable with vectors computed after a restart.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use mnemo_config::model::{EmbedderKind, MemoryConfig};
use mnemo_core::traits::adapter::PluginAdapter;
use mnemo_core::traits::EmbeddingAdapter;
use mnemo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use mnemo_core::MnemoError;

use crate::types::l2_normalize;

/// Deterministic feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embed a single text string.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        l2_normalize(&vector)
    }
}

/// Lowercased alphanumeric words.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl PluginAdapter for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.embed_text(t)).collect(),
            dimensions: self.dimension,
        })
    }
}

/// Embeds one text and returns its vector.
pub async fn embed_one(embedder: &dyn EmbeddingAdapter, text: &str) -> Result<Vec<f32>, MnemoError> {
    let output = embedder
        .embed(EmbeddingInput {
            texts: vec![text.to_string()],
        })
        .await?;
    output
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| MnemoError::Embedding {
            message: "embedding returned no results".to_string(),
            source: None,
        })
}

/// Builds the embedder selected by `config`.
///
/// Fails with [`MnemoError::DimensionMismatch`] if the provider's output
/// size disagrees with the configured index dimension.
pub fn build_embedder(config: &MemoryConfig) -> Result<Arc<dyn EmbeddingAdapter>, MnemoError> {
    let embedder: Arc<dyn EmbeddingAdapter> = match config.embedder {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
        EmbedderKind::Onnx => build_onnx(config)?,
    };
    if embedder.dimensions() != config.dimension {
        return Err(MnemoError::DimensionMismatch {
            expected: config.dimension,
            actual: embedder.dimensions(),
        });
    }
    Ok(embedder)
}

#[cfg(feature = "onnx")]
fn build_onnx(config: &MemoryConfig) -> Result<Arc<dyn EmbeddingAdapter>, MnemoError> {
    let path = config
        .model_path
        .as_deref()
        .ok_or_else(|| MnemoError::Config("memory.model_path is required for the onnx embedder".into()))?;
    Ok(Arc::new(crate::onnx::OnnxEmbedder::new(path)?))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx(_config: &MemoryConfig) -> Result<Arc<dyn EmbeddingAdapter>, MnemoError> {
    Err(MnemoError::Config(
        "embedder = \"onnx\" requires building with the `onnx` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cosine_similarity;

    #[test]
    fn same_text_same_vector() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.embed_text("What is Rust?"), e.embed_text("what is rust"));
    }

    #[test]
    fn vectors_are_unit_length() {
        let e = HashingEmbedder::new(64);
        let v = e.embed_text("Rust is a systems programming language");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert_eq!(e.embed_text("  ... "), vec![0.0; 8]);
    }

    #[test]
    fn shared_words_score_higher() {
        let e = HashingEmbedder::new(256);
        let query = e.embed_text("who created rust");
        let related = e.embed_text("Graydon Hoare created Rust");
        let unrelated = e.embed_text("the weather is sunny today");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn embed_one_returns_single_vector() {
        let e = HashingEmbedder::new(16);
        let v = embed_one(&e, "hello").await.unwrap();
        assert_eq!(v.len(), 16);
    }

    #[test]
    fn factory_builds_hashing_by_default() {
        let embedder = build_embedder(&MemoryConfig::default()).unwrap();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "hashing-embedder");
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn factory_rejects_onnx_without_feature() {
        let config = MemoryConfig {
            embedder: EmbedderKind::Onnx,
            ..MemoryConfig::default()
        };
        assert!(matches!(build_embedder(&config), Err(MnemoError::Config(_))));
    }
}
