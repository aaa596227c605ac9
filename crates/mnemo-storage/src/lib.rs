// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite structured log store for the Mnemo memory engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and a global record sequence shared
//! by conversation turns, tool invocations, and document references.
//!
//! Id assignment, the row insert, and the sequence bump run in one closure
//! on the writer thread and one transaction, so concurrent sessions never
//! observe or issue the same id and a rolled-back insert consumes none.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteLogStore;
pub use database::Database;
