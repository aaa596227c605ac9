// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for remember/retrieve and maintenance operations.

use std::sync::Arc;

use mnemo_core::{MnemoError, NewRecord, Record, RecordId, Role, SessionId, ToolStatus};
use mnemo_memory::{DurabilityState, ToolCall};
use mnemo_test_utils::harness::TEST_DIMENSION;
use mnemo_test_utils::{FailingEmbedder, ScriptedEmbedder, TestEngine};

fn unit(slot: usize) -> Vec<f32> {
    let mut v = vec![0.0; TEST_DIMENSION];
    v[slot] = 1.0;
    v
}

#[tokio::test]
async fn empty_engine_returns_empty_bundle() {
    let (engine, _) = TestEngine::new().await.unwrap();
    let bundle = engine
        .retrieve("anything at all", &SessionId::from("s1"), 2000)
        .await
        .unwrap();
    assert!(bundle.is_empty());
    assert!(!bundle.truncated);
    assert_eq!(bundle.render(), "No relevant context found.");
}

#[tokio::test]
async fn ids_strictly_increase() {
    let (engine, _) = TestEngine::new().await.unwrap();
    let mut last = RecordId::ZERO;
    for i in 0..15 {
        let rec = engine
            .remember(NewRecord::turn("s1", Role::User, format!("message {i}")))
            .await
            .unwrap();
        assert!(rec.record_id() > last);
        last = rec.record_id();
    }
}

#[tokio::test]
async fn recency_channel_keeps_prior_turns() {
    let (engine, _) = TestEngine::new().await.unwrap();
    let s1 = SessionId::from("S1");
    engine
        .remember(NewRecord::turn(s1.clone(), Role::User, "What is Rust?"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn(
            s1.clone(),
            Role::Agent,
            "Rust is a systems language...",
        ))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn(s1.clone(), Role::User, "Who created it?"))
        .await
        .unwrap();

    let bundle = engine.retrieve("Who created it?", &s1, 2000).await.unwrap();
    let texts: Vec<String> = bundle
        .items
        .iter()
        .map(|i| i.record.content().into_owned())
        .collect();
    assert!(texts.contains(&"What is Rust?".to_string()));
    assert!(texts.contains(&"Rust is a systems language...".to_string()));
    assert!(!bundle.truncated);
}

#[tokio::test]
async fn zero_budget_never_returns_content() {
    let (engine, _) = TestEngine::new().await.unwrap();
    engine
        .remember(NewRecord::turn("s1", Role::User, "remember me"))
        .await
        .unwrap();
    let bundle = engine
        .retrieve("remember me", &SessionId::from("s1"), 0)
        .await
        .unwrap();
    assert!(bundle.is_empty());
    assert!(bundle.truncated);
}

#[tokio::test]
async fn equal_scores_rank_newer_first() {
    let embedder = Arc::new(
        ScriptedEmbedder::new(TEST_DIMENSION)
            .with_vector("first note", unit(0))
            .with_vector("second note", unit(0))
            .with_vector("note query", unit(0)),
    );
    let engine = TestEngine::with_embedder(TestEngine::default_config(), embedder)
        .await
        .unwrap();

    engine
        .remember(NewRecord::turn("a", Role::User, "first note"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn("b", Role::User, "second note"))
        .await
        .unwrap();

    // Session "c" has no history, so only the semantic channel contributes.
    let bundle = engine
        .retrieve("note query", &SessionId::from("c"), 2000)
        .await
        .unwrap();
    let texts: Vec<_> = bundle
        .items
        .iter()
        .map(|i| i.record.content().into_owned())
        .collect();
    assert_eq!(texts, vec!["second note", "first note"]);
    assert_eq!(bundle.items[0].score, bundle.items[1].score);
}

#[tokio::test]
async fn semantic_hit_found_across_sessions() {
    let embedder = Arc::new(
        ScriptedEmbedder::new(TEST_DIMENSION)
            .with_vector("Graydon Hoare started Rust", unit(3))
            .with_vector("who started rust", unit(3))
            .with_vector("unrelated chatter", unit(7)),
    );
    let engine = TestEngine::with_embedder(TestEngine::default_config(), embedder)
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn("old", Role::Agent, "Graydon Hoare started Rust"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn("new", Role::User, "unrelated chatter"))
        .await
        .unwrap();

    let bundle = engine
        .retrieve("who started rust", &SessionId::from("new"), 2000)
        .await
        .unwrap();
    assert_eq!(
        bundle.items[0].record.content(),
        "Graydon Hoare started Rust"
    );
    assert!(bundle.items[0].is_semantic());
    assert!(bundle.render().contains("Graydon Hoare started Rust"));
}

#[tokio::test]
async fn budget_truncates_without_cutting_content() {
    let (engine, _) = TestEngine::new().await.unwrap();
    for i in 0..5 {
        engine
            .remember(NewRecord::turn("s1", Role::User, format!("{i}{}", "x".repeat(39))))
            .await
            .unwrap();
    }
    // each turn is 40 chars = 10 tokens
    let bundle = engine
        .retrieve("", &SessionId::from("s1"), 25)
        .await
        .unwrap();
    assert_eq!(bundle.len(), 2);
    assert!(bundle.truncated);
    assert!(bundle
        .items
        .iter()
        .all(|i| i.record.content().chars().count() == 40));
}

#[tokio::test]
async fn exchange_is_recorded_in_order() {
    let (engine, embedder) = TestEngine::new().await.unwrap();
    let session = SessionId::from("s1");
    let records = engine
        .remember_exchange(
            &session,
            "Who created Rust?",
            "Graydon Hoare.",
            vec![
                ToolCall {
                    tool_name: "web_search".into(),
                    input: "rust creator".into(),
                    output: "Graydon Hoare".into(),
                    status: ToolStatus::Ok,
                },
                ToolCall {
                    tool_name: "web_search".into(),
                    input: "rust creator year".into(),
                    output: "rate limited".into(),
                    status: ToolStatus::Error,
                },
            ],
        )
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(Record::record_id).collect();
    assert_eq!(ids, vec![RecordId(1), RecordId(2), RecordId(3), RecordId(4)]);
    // The failed tool call is not embedded.
    assert_eq!(embedder.calls(), 3);

    let turns = engine.recent_turns(&session, 10).await.unwrap();
    let turn_texts: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(turn_texts, vec!["Who created Rust?", "Graydon Hoare."]);
}

#[tokio::test]
async fn unchanged_document_is_not_reembedded() {
    let (engine, embedder) = TestEngine::new().await.unwrap();

    let first = engine
        .remember_document("/notes/rust.md", "Rust notes", Some("Notes about Rust".into()))
        .await
        .unwrap();
    assert!(first.embedded);
    assert!(!first.unchanged);

    let again = engine
        .remember_document("/notes/rust.md", "Rust notes", Some("Notes about Rust".into()))
        .await
        .unwrap();
    assert!(again.unchanged);
    assert!(!again.embedded);
    assert!(again.record.record_id() > first.record.record_id());
    assert_eq!(embedder.calls(), 1);

    let changed = engine
        .remember_document("/notes/rust.md", "Rust notes, revised", None)
        .await
        .unwrap();
    assert!(changed.embedded);
    assert_eq!(embedder.seen().last().unwrap(), "Rust notes, revised");
}

#[tokio::test]
async fn forget_hides_record_from_both_channels() {
    let (engine, _) = TestEngine::new().await.unwrap();
    let session = SessionId::from("s1");
    let secret = engine
        .remember(NewRecord::turn(session.clone(), Role::User, "my secret plan"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn(session.clone(), Role::User, "public info"))
        .await
        .unwrap();

    assert!(engine.forget(secret.record_id()).await.unwrap());
    assert!(!engine.forget(secret.record_id()).await.unwrap());

    let bundle = engine.retrieve("my secret plan", &session, 2000).await.unwrap();
    assert!(!bundle.record_ids().contains(&secret.record_id()));
    assert!(matches!(
        engine.get(secret.record_id()).await,
        Err(MnemoError::NotFound { .. })
    ));
}

#[tokio::test]
async fn correction_replaces_earlier_record() {
    let (engine, _) = TestEngine::new().await.unwrap();
    let wrong = engine
        .remember(NewRecord::turn("s1", Role::Agent, "Rust was created in 2020"))
        .await
        .unwrap();
    let fixed = engine
        .correct(
            wrong.record_id(),
            NewRecord::turn("s1", Role::Agent, "Rust was created in 2006"),
        )
        .await
        .unwrap();
    assert!(fixed.record_id() > wrong.record_id());

    let history = engine.recent_turns(&SessionId::from("s1"), 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "Rust was created in 2006");

    let missing = engine
        .correct(RecordId(999), NewRecord::turn("s1", Role::Agent, "x"))
        .await;
    assert!(matches!(missing, Err(MnemoError::NotFound { .. })));
}

#[tokio::test]
async fn compaction_removes_tombstoned_data() {
    let (engine, _) = TestEngine::new().await.unwrap();
    let a = engine
        .remember(NewRecord::turn("s1", Role::User, "drop me"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn("s1", Role::User, "keep me"))
        .await
        .unwrap();
    engine.forget(a.record_id()).await.unwrap();

    let report = engine.compact().await.unwrap();
    assert_eq!(report.vector_entries_removed, 1);
    assert_eq!(report.records_purged, 1);

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.vector_entries, 1);
    assert_eq!(stats.vector_tombstones, 0);
    assert_eq!(stats.store.conversation_turns, 1);
    assert_eq!(stats.state, DurabilityState::Flushed);
}

#[tokio::test]
async fn embedder_failure_degrades_and_repair_heals() {
    let embedder = Arc::new(FailingEmbedder::new(TEST_DIMENSION));
    let engine = TestEngine::with_embedder(TestEngine::default_config(), embedder.clone())
        .await
        .unwrap();
    let session = SessionId::from("s1");

    let rec = engine
        .remember(NewRecord::turn(session.clone(), Role::User, "stored anyway"))
        .await
        .unwrap();
    assert_eq!(engine.index().len(), 0);

    // Semantic channel is down, recency still answers.
    let bundle = engine.retrieve("stored anyway", &session, 2000).await.unwrap();
    assert_eq!(bundle.record_ids(), vec![rec.record_id()]);
    assert!(!bundle.items[0].is_semantic());

    embedder.recover();
    let report = engine.repair().await.unwrap();
    assert_eq!(report.embedded, 1);
    assert!(engine.index().contains(rec.record_id()));
    assert_eq!(engine.index().indexed_through(), rec.record_id());
}

#[tokio::test]
async fn verify_join_finds_no_orphans_in_healthy_engine() {
    let (engine, _) = TestEngine::new().await.unwrap();
    engine
        .remember(NewRecord::turn("s1", Role::User, "one"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn("s1", Role::User, "two"))
        .await
        .unwrap();
    let report = engine.verify_join().await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.orphans, 0);
}

#[tokio::test]
async fn mismatched_embedder_is_rejected() {
    let embedder = Arc::new(ScriptedEmbedder::new(TEST_DIMENSION + 1));
    let result = TestEngine::with_embedder(TestEngine::default_config(), embedder).await;
    assert!(matches!(result, Err(MnemoError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn wrong_size_vector_keeps_committed_record() {
    let embedder = Arc::new(
        ScriptedEmbedder::new(TEST_DIMENSION)
            .with_vector("oversized", vec![0.5; TEST_DIMENSION + 1]),
    );
    let engine = TestEngine::with_embedder(TestEngine::default_config(), embedder.clone())
        .await
        .unwrap();

    let rec = engine
        .remember(NewRecord::turn("s1", Role::User, "oversized"))
        .await
        .unwrap();
    let stored = engine.get(rec.record_id()).await.unwrap();
    assert_eq!(stored.content(), "oversized");
    assert!(!engine.index().contains(rec.record_id()));
    assert_eq!(engine.index().indexed_through(), rec.record_id());

    // Marked processed, so later passes do not retry it.
    let report = engine.repair().await.unwrap();
    assert_eq!(report.embedded, 0);
    assert_eq!(embedder.calls(), 1);
}

#[tokio::test]
async fn auto_flush_after_threshold() {
    let mut config = TestEngine::default_config();
    config.flush_threshold = 3;
    let embedder = Arc::new(ScriptedEmbedder::new(TEST_DIMENSION));
    let engine = TestEngine::with_embedder(config, embedder).await.unwrap();

    assert_eq!(engine.durability_state(), DurabilityState::Flushed);
    engine
        .remember(NewRecord::turn("s1", Role::User, "a"))
        .await
        .unwrap();
    assert_eq!(engine.durability_state(), DurabilityState::Buffered);
    assert_eq!(engine.stats().await.unwrap().pending, 1);

    engine
        .remember(NewRecord::turn("s1", Role::User, "b"))
        .await
        .unwrap();
    engine
        .remember(NewRecord::turn("s1", Role::User, "c"))
        .await
        .unwrap();
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.state, DurabilityState::Flushed);
}

#[tokio::test]
async fn stats_and_health() {
    let (engine, _) = TestEngine::new().await.unwrap();
    engine
        .remember(NewRecord::ToolInvocation {
            session_id: "s1".into(),
            tool_name: "read_file".into(),
            input: "/etc/hosts".into(),
            output: "127.0.0.1 localhost".into(),
            status: ToolStatus::Ok,
        })
        .await
        .unwrap();
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.store.tool_invocations, 1);
    assert_eq!(stats.vector_entries, 1);
    assert_eq!(
        engine.health().await.unwrap(),
        mnemo_core::HealthStatus::Healthy
    );
    let all = engine.store().records_after(RecordId::ZERO).await.unwrap();
    assert_eq!(all.len(), 1);
}
