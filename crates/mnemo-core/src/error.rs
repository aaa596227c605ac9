// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Mnemo memory engine.

use thiserror::Error;

use crate::types::RecordId;

/// The primary error type used across all Mnemo adapter traits and engine operations.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A vector did not match the dimensionality the index was built with.
    ///
    /// Indicates a misconfigured embedding provider. Not retried.
    #[error("dimension mismatch: index expects {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector index snapshot is missing or corrupt.
    ///
    /// The engine keeps running with an empty semantic index.
    #[error("vector index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    /// A durable write was rejected. The record is not committed.
    #[error("persistence failure: {message}")]
    PersistenceFailure {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No live record exists with the given id.
    #[error("record {record_id} not found")]
    NotFound { record_id: RecordId },

    /// Storage backend errors on the read path (connection, query, decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding provider errors (model load, tokenization, inference).
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    /// Builds a [`MnemoError::PersistenceFailure`] from any error source.
    pub fn persistence<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MnemoError::PersistenceFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the caller can keep going (retry, or continue degraded).
    ///
    /// `DimensionMismatch` is a programmer error and is never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MnemoError::IndexUnavailable { .. }
                | MnemoError::PersistenceFailure { .. }
                | MnemoError::NotFound { .. }
                | MnemoError::Timeout { .. }
        )
    }
}
