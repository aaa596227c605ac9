// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent sessions: one session's embedding never stalls another, every
//! record is indexed once, and the join holds through a crash.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mnemo_core::{NewRecord, Role, SessionId};
use mnemo_test_utils::harness::TEST_DIMENSION;
use mnemo_test_utils::{ScriptedEmbedder, SlowEmbedder, TestEngine};

const SESSIONS: usize = 8;
const TURNS_PER_SESSION: usize = 10;

fn eager_flush_config() -> mnemo_config::model::MemoryConfig {
    let mut config = TestEngine::default_config();
    config.flush_threshold = 1;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_embedding_does_not_block_other_sessions() {
    let embedder = Arc::new(SlowEmbedder::new(
        TEST_DIMENSION,
        "slow",
        Duration::from_millis(1500),
    ));
    let engine = Arc::new(
        TestEngine::with_embedder(eager_flush_config(), embedder.clone())
            .await
            .unwrap(),
    );

    let slow = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .remember(NewRecord::turn("s1", Role::User, "a slow message"))
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    engine
        .remember(NewRecord::turn("s2", Role::User, "a quick message"))
        .await
        .unwrap();
    let latency = started.elapsed();
    assert!(
        latency < Duration::from_millis(700),
        "s2 waited {latency:?} behind s1's embedding"
    );

    let slow_record = slow.await.unwrap();
    assert!(engine.index().contains(slow_record.record_id()));
    assert_eq!(embedder.calls_for("a slow message"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn explicit_flush_skips_records_being_embedded() {
    let embedder = Arc::new(SlowEmbedder::new(
        TEST_DIMENSION,
        "slow",
        Duration::from_millis(800),
    ));
    let engine = Arc::new(
        TestEngine::with_embedder(TestEngine::default_config(), embedder.clone())
            .await
            .unwrap(),
    );

    let slow = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .remember(NewRecord::turn("s1", Role::User, "slow and steady"))
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    engine.flush().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    let record = slow.await.unwrap();
    assert!(engine.index().contains(record.record_id()));
    assert_eq!(embedder.calls_for("slow and steady"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_index_each_record_once() {
    let embedder = Arc::new(ScriptedEmbedder::new(TEST_DIMENSION));
    let engine = Arc::new(
        TestEngine::with_embedder(eager_flush_config(), embedder.clone())
            .await
            .unwrap(),
    );

    let mut tasks = Vec::new();
    for s in 0..SESSIONS {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let session = SessionId::from(format!("session-{s}"));
            for t in 0..TURNS_PER_SESSION {
                engine
                    .remember(NewRecord::turn(
                        session.clone(),
                        Role::User,
                        format!("session {s} turn {t}"),
                    ))
                    .await
                    .unwrap();
                engine
                    .retrieve(&format!("recall for {s}"), &session, 500)
                    .await
                    .unwrap();
            }
        }));
    }
    // Snapshots race the inserts above.
    let flusher = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                engine.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    for task in tasks {
        task.await.unwrap();
    }
    flusher.await.unwrap();

    let total = SESSIONS * TURNS_PER_SESSION;
    let turns: Vec<String> = embedder
        .seen()
        .into_iter()
        .filter(|t| t.contains(" turn "))
        .collect();
    assert_eq!(turns.len(), total);
    assert_eq!(turns.iter().collect::<HashSet<_>>().len(), total);
    assert_eq!(engine.index().live_record_ids().len(), total);
    assert_eq!(engine.verify_join().await.unwrap().orphans, 0);

    let engine = Arc::into_inner(engine).unwrap();
    let after = Arc::new(ScriptedEmbedder::new(TEST_DIMENSION));
    let engine = engine.crash(after.clone()).await.unwrap();

    assert_eq!(engine.index().live_record_ids().len(), total);
    assert_eq!(engine.verify_join().await.unwrap().orphans, 0);
    // Only records whose vectors missed the last snapshot are embedded again.
    let replayed = after.seen();
    assert_eq!(
        replayed.iter().collect::<HashSet<_>>().len(),
        replayed.len()
    );
}
