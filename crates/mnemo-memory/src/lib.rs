// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contextual memory engine for the Mnemo workspace.
//!
//! Combines an in-process vector index with the SQLite structured log and
//! assembles bounded context bundles for a reasoning loop.
//!
//! ## Architecture
//!
//! - **VectorIndex**: flat similarity index with lock-free reads and atomic snapshots
//! - **HashingEmbedder**: deterministic local embedder (ONNX behind the `onnx` feature)
//! - **fusion**: semantic + recency merge and token-budget assembly
//! - **DurabilityManager**: Buffered/Flushed state machine and crash reconciliation
//! - **MemoryEngine**: `remember` / `retrieve` entry points and maintenance operations

pub mod durability;
pub mod embedder;
pub mod engine;
pub mod fusion;
pub mod index;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod recording;
pub mod snapshot;
pub mod types;

pub use durability::{DurabilityManager, DurabilityState, IndexOutcome, ReconcileReport};
pub use embedder::{build_embedder, embed_one, HashingEmbedder};
pub use engine::{
    CompactionReport, DocumentOutcome, EngineStats, JoinReport, MemoryEngine, ToolCall,
};
pub use index::{IndexState, VectorIndex};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use types::*;
