// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder can collect these.
//! Without a recorder every call is a no-op.

use metrics::{describe_counter, describe_histogram};
use mnemo_core::RecordKind;

/// Register all Mnemo metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "mnemo_records_remembered_total",
        "Structured records committed, by kind"
    );
    describe_counter!("mnemo_retrievals_total", "Context retrievals served");
    describe_counter!("mnemo_index_flushes_total", "Vector index snapshots written");
    describe_histogram!(
        "mnemo_index_persist_seconds",
        "Time spent writing a vector index snapshot"
    );
}

/// Record a committed structured record.
pub fn record_remembered(kind: RecordKind) {
    metrics::counter!("mnemo_records_remembered_total", "kind" => kind.to_string()).increment(1);
}

/// Record a served retrieval.
pub fn record_retrieval() {
    metrics::counter!("mnemo_retrievals_total").increment(1);
}

/// Record a completed flush.
pub fn record_flush() {
    metrics::counter!("mnemo_index_flushes_total").increment(1);
}

/// Record snapshot write latency.
pub fn record_persist(seconds: f64) {
    metrics::histogram!("mnemo_index_persist_seconds").record(seconds);
}
