// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate merging and budget-bounded assembly.
//!
//! Pure functions over already-fetched records, so ranking is testable
//! without an embedder or a store.

use std::cmp::Ordering;
use std::collections::HashSet;

use mnemo_core::{Record, RecordId};

use crate::types::{estimate_tokens, ContextBundle, ContextItem};

/// Semantic candidates first (score desc), then recency-only ones (newest first).
///
/// Ties within either group fall back to newer `created_at`, then higher id.
fn compare_items(a: &ContextItem, b: &ContextItem) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score
        .then_with(|| b.record.created_at().cmp(&a.record.created_at()))
        .then_with(|| b.record.record_id().cmp(&a.record.record_id()))
}

/// Merges semantic hits and recent records into one ranked candidate list.
///
/// A record present in both channels is kept once, as a semantic hit.
pub fn merge_candidates(semantic: Vec<(Record, f32)>, recent: Vec<Record>) -> Vec<ContextItem> {
    let mut seen: HashSet<RecordId> = HashSet::new();
    let mut merged = Vec::with_capacity(semantic.len() + recent.len());

    for (record, score) in semantic {
        if seen.insert(record.record_id()) {
            merged.push(ContextItem {
                record,
                score: Some(score),
            });
        }
    }
    for record in recent {
        if seen.insert(record.record_id()) {
            merged.push(ContextItem {
                record,
                score: None,
            });
        }
    }

    merged.sort_by(compare_items);
    merged
}

/// Takes candidates in rank order while their estimated tokens fit `token_budget`.
///
/// Assembly stops at the first candidate that does not fit; record content
/// is never cut. A zero budget always yields an empty bundle.
pub fn assemble(candidates: Vec<ContextItem>, token_budget: usize) -> ContextBundle {
    if token_budget == 0 {
        return ContextBundle {
            items: Vec::new(),
            truncated: !candidates.is_empty(),
        };
    }

    let mut used = 0usize;
    let mut items = Vec::new();
    let mut truncated = false;
    for item in candidates {
        let cost = estimate_tokens(&item.record.content());
        if used + cost > token_budget {
            truncated = true;
            break;
        }
        used += cost;
        items.push(item);
    }
    ContextBundle { items, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use mnemo_core::{NewRecord, Role};
    use proptest::prelude::*;

    fn turn(id: u64, secs: i64, content: &str) -> Record {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs);
        NewRecord::turn("s1", Role::User, content).into_record(RecordId(id), at)
    }

    fn ids(items: &[ContextItem]) -> Vec<u64> {
        items.iter().map(|i| i.record.record_id().get()).collect()
    }

    #[test]
    fn semantic_outranks_recent() {
        let merged = merge_candidates(
            vec![(turn(1, 1, "old but relevant"), 0.4)],
            vec![turn(5, 5, "newest"), turn(4, 4, "newer")],
        );
        assert_eq!(ids(&merged), vec![1, 5, 4]);
    }

    #[test]
    fn duplicates_rank_as_semantic() {
        let merged = merge_candidates(
            vec![(turn(3, 3, "both"), 0.9)],
            vec![turn(3, 3, "both"), turn(2, 2, "recent only")],
        );
        assert_eq!(ids(&merged), vec![3, 2]);
        assert_eq!(merged[0].score, Some(0.9));
        assert_eq!(merged[1].score, None);
    }

    #[test]
    fn equal_scores_prefer_newer() {
        let merged = merge_candidates(
            vec![(turn(1, 10, "a"), 0.5), (turn(2, 20, "b"), 0.5)],
            Vec::new(),
        );
        assert_eq!(ids(&merged), vec![2, 1]);
    }

    #[test]
    fn recent_sorted_newest_first() {
        let merged = merge_candidates(
            Vec::new(),
            vec![turn(1, 1, "a"), turn(3, 3, "c"), turn(2, 2, "b")],
        );
        assert_eq!(ids(&merged), vec![3, 2, 1]);
    }

    #[test]
    fn budget_stops_at_first_misfit() {
        // 8 chars = 2 tokens, 40 chars = 10 tokens
        let candidates = merge_candidates(
            vec![
                (turn(1, 1, "12345678"), 0.9),
                (turn(2, 2, &"x".repeat(40)), 0.8),
                (turn(3, 3, "1234"), 0.7),
            ],
            Vec::new(),
        );
        let bundle = assemble(candidates, 5);
        assert_eq!(ids(&bundle.items), vec![1]);
        assert!(bundle.truncated);
    }

    #[test]
    fn everything_fits() {
        let candidates = merge_candidates(Vec::new(), vec![turn(1, 1, "hi"), turn(2, 2, "there")]);
        let bundle = assemble(candidates, 100);
        assert_eq!(bundle.len(), 2);
        assert!(!bundle.truncated);
    }

    #[test]
    fn zero_budget_is_empty() {
        let bundle = assemble(merge_candidates(Vec::new(), vec![turn(1, 1, "hi")]), 0);
        assert!(bundle.is_empty());
        assert!(bundle.truncated);

        let bundle = assemble(Vec::new(), 0);
        assert!(bundle.is_empty());
        assert!(!bundle.truncated);
    }

    proptest! {
        #[test]
        fn bundle_never_exceeds_budget(
            lengths in proptest::collection::vec(0usize..200, 0..20),
            budget in 0usize..300,
        ) {
            let recent: Vec<Record> = lengths
                .iter()
                .enumerate()
                .map(|(i, len)| turn(i as u64 + 1, i as i64, &"a".repeat(*len)))
                .collect();
            let total = recent.len();
            let bundle = assemble(merge_candidates(Vec::new(), recent), budget);
            prop_assert!(bundle.token_estimate() <= budget);
            prop_assert_eq!(bundle.truncated, bundle.len() < total);
        }
    }
}
