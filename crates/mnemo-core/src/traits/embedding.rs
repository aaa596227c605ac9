// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating vector embeddings from text.
///
/// Implementations must be deterministic for identical input within a
/// process lifetime and always produce vectors of [`dimensions`](Self::dimensions) length.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Fixed output dimensionality of this provider.
    fn dimensions(&self) -> usize;

    /// Generates embeddings for the given input, one vector per text.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError>;
}
