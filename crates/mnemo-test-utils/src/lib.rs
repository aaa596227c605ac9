// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mnemo integration tests.
//!
//! Provides deterministic embedders and an engine harness backed by a temp
//! directory, so recovery paths can be exercised without model files.
//!
//! # Components
//!
//! - [`ScriptedEmbedder`] - Fixed vectors per text with a call counter
//! - [`FailingEmbedder`] - Embedder that always (or on demand) errors
//! - [`SlowEmbedder`] - Embedder that stalls on chosen texts
//! - [`TestEngine`] - Engine over a temp dir with restart and crash simulation

pub mod harness;
pub mod mock_embedder;

pub use harness::TestEngine;
pub use mock_embedder::{FailingEmbedder, ScriptedEmbedder, SlowEmbedder};
