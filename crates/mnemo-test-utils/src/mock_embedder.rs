// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapters for deterministic testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use mnemo_core::traits::adapter::PluginAdapter;
use mnemo_core::traits::EmbeddingAdapter;
use mnemo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use mnemo_core::MnemoError;
use mnemo_memory::HashingEmbedder;

/// An embedder returning pre-configured vectors for known texts.
///
/// Unknown texts fall back to the hashing embedder. Every embedded text is
/// counted and logged, so tests can assert exactly-once embedding.
pub struct ScriptedEmbedder {
    dimension: usize,
    scripted: Mutex<HashMap<String, Vec<f32>>>,
    fallback: HashingEmbedder,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            scripted: Mutex::new(HashMap::new()),
            fallback: HashingEmbedder::new(dimension),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Pins the vector returned for `text`.
    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.set_vector(text, vector);
        self
    }

    pub fn set_vector(&self, text: impl Into<String>, vector: Vec<f32>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.insert(text.into(), vector);
        }
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every embedded text, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        self.scripted
            .lock()
            .ok()
            .and_then(|scripted| scripted.get(text).cloned())
            .unwrap_or_else(|| self.fallback.embed_text(text))
    }
}

#[async_trait]
impl PluginAdapter for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted-embedder"
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
impl EmbeddingAdapter for ScriptedEmbedder {
    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(text.clone());
            }
            embeddings.push(self.vector_for(text));
        }
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimension,
        })
    }
}

/// An embedder that fails while its switch is on.
///
/// Reports `dimension` so an engine can be built around it.
pub struct FailingEmbedder {
    dimension: usize,
    failing: AtomicBool,
    fallback: HashingEmbedder,
}

impl FailingEmbedder {
    /// Always fails until [`FailingEmbedder::recover`] is called.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing: AtomicBool::new(true),
            fallback: HashingEmbedder::new(dimension),
        }
    }

    /// Makes subsequent calls succeed.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Makes subsequent calls fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        if self.failing.load(Ordering::SeqCst) {
            Ok(HealthStatus::Degraded("embedder is failing".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), MnemoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for FailingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MnemoError::Embedding {
                message: "embedding provider unavailable".into(),
                source: None,
            });
        }
        Ok(EmbeddingOutput {
            embeddings: input
                .texts
                .iter()
                .map(|t| self.fallback.embed_text(t))
                .collect(),
            dimensions: self.dimension,
        })
    }
}

/// An embedder that sleeps before answering for texts containing a marker.
///
/// Counts calls per text, so tests can check that a stalled record is not
/// embedded a second time by a concurrent pass.
pub struct SlowEmbedder {
    marker: String,
    delay: Duration,
    inner: ScriptedEmbedder,
}

impl SlowEmbedder {
    pub fn new(dimension: usize, marker: impl Into<String>, delay: Duration) -> Self {
        Self {
            marker: marker.into(),
            delay,
            inner: ScriptedEmbedder::new(dimension),
        }
    }

    /// How many times `text` was embedded.
    pub fn calls_for(&self, text: &str) -> usize {
        self.inner.seen().iter().filter(|t| *t == text).count()
    }
}

#[async_trait]
impl PluginAdapter for SlowEmbedder {
    fn name(&self) -> &str {
        "slow-embedder"
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
impl EmbeddingAdapter for SlowEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        if input.texts.iter().any(|t| t.contains(&self.marker)) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.embed(input).await
    }
}
