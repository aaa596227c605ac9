// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mnemo memory engine.
//!
//! This crate provides the error taxonomy, the structured record types, and
//! the adapter traits implemented by the log store and the embedding
//! providers.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemoError;
pub use types::{
    AdapterType, ConversationTurn, DocumentReference, HealthStatus, NewRecord, Record, RecordId,
    RecordKind, RecordQuery, Role, SessionId, StoreStats, ToolInvocationRecord, ToolStatus,
};

pub use traits::{EmbeddingAdapter, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn mnemo_error_recoverability() {
        assert!(
            !MnemoError::DimensionMismatch {
                expected: 384,
                actual: 3
            }
            .is_recoverable()
        );
        assert!(
            MnemoError::IndexUnavailable {
                reason: "missing".into()
            }
            .is_recoverable()
        );
        assert!(
            MnemoError::NotFound {
                record_id: RecordId(7)
            }
            .is_recoverable()
        );
        assert!(MnemoError::persistence("disk full", std::io::Error::other("ENOSPC")).is_recoverable());
        assert!(!MnemoError::Internal("bug".into()).is_recoverable());
    }

    #[test]
    fn enum_string_round_trips() {
        for role in [Role::User, Role::Agent] {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
        for kind in [
            RecordKind::ConversationTurn,
            RecordKind::ToolInvocation,
            RecordKind::DocumentReference,
        ] {
            assert_eq!(RecordKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(ToolStatus::Error.to_string(), "error");
        assert_eq!(RecordKind::ToolInvocation.to_string(), "tool_invocation");
    }

    #[test]
    fn record_serializes_with_kind_tag() {
        let record = NewRecord::turn("s1", Role::User, "hello").into_record(RecordId(3), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "conversation_turn");
        assert_eq!(json["record_id"], 3);
        assert_eq!(json["session_id"], "s1");
    }

    #[test]
    fn blank_turns_are_not_embeddable() {
        let blank = NewRecord::turn("s1", Role::Agent, "   ").into_record(RecordId(1), Utc::now());
        assert!(blank.embeddable_text().is_none());
        let turn = NewRecord::turn("s1", Role::Agent, "Rust is a systems language")
            .into_record(RecordId(2), Utc::now());
        assert_eq!(
            turn.embeddable_text().as_deref(),
            Some("Rust is a systems language")
        );
    }

    #[test]
    fn failed_tool_calls_are_not_embeddable() {
        let failed = NewRecord::ToolInvocation {
            session_id: "s1".into(),
            tool_name: "web_search".into(),
            input: "rust creator".into(),
            output: "timeout".into(),
            status: ToolStatus::Error,
        }
        .into_record(RecordId(4), Utc::now());
        assert!(failed.embeddable_text().is_none());
        assert_eq!(failed.content(), "web_search(rust creator) -> timeout");
    }

    #[test]
    fn documents_without_summary_are_not_embeddable() {
        let doc = NewRecord::DocumentReference {
            path: "/notes/a.md".into(),
            content_hash: "ab".into(),
            summary: None,
        }
        .into_record(RecordId(5), Utc::now());
        assert!(doc.embeddable_text().is_none());
        assert!(doc.session_id().is_none());
        assert_eq!(doc.kind(), RecordKind::DocumentReference);
    }

    #[test]
    fn store_stats_total() {
        let stats = StoreStats {
            conversation_turns: 3,
            tool_invocations: 2,
            document_references: 1,
            tombstones: 0,
            last_record_id: RecordId(6),
        };
        assert_eq!(stats.total(), 6);
    }

    proptest! {
        #[test]
        fn record_id_next_is_strictly_greater(n in 0u64..u64::MAX) {
            let id = RecordId(n);
            prop_assert!(id.next() > id);
        }
    }
}
