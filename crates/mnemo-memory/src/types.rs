// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types: vector entries, scored hits, and context bundles.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use mnemo_core::{Record, RecordId};
use serde::Serialize;

/// A single embedded text unit held by the vector index.
///
/// Never updated in place. A correction is a new entry plus a tombstone on
/// the old `record_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// Id of the structured record this vector was derived from.
    pub record_id: RecordId,
    pub vector: Vec<f32>,
    /// The text that was embedded.
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A nearest-neighbor hit from [`VectorIndex::query`](crate::VectorIndex::query).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    pub record_id: RecordId,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

/// One record in a context bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextItem {
    pub record: Record,
    /// Similarity score when the record came from the semantic channel.
    pub score: Option<f32>,
}

impl ContextItem {
    pub fn is_semantic(&self) -> bool {
        self.score.is_some()
    }
}

/// Ranked, budget-bounded slice of history returned by retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextBundle {
    pub items: Vec<ContextItem>,
    /// Whether the token budget clipped additional candidates.
    pub truncated: bool,
}

impl ContextBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.items.iter().map(|item| item.record.record_id()).collect()
    }

    /// Estimated tokens of all included content.
    pub fn token_estimate(&self) -> usize {
        self.items
            .iter()
            .map(|item| estimate_tokens(&item.record.content()))
            .sum()
    }

    /// Formats the bundle for prompt injection.
    ///
    /// Semantic hits come first with their similarity, then recent history.
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "No relevant context found.".to_string();
        }

        let mut text = String::from("## Relevant Memory\n");
        let (related, recent): (Vec<_>, Vec<_>) =
            self.items.iter().partition(|item| item.is_semantic());

        if !related.is_empty() {
            text.push_str("\n### Related interactions\n");
            for item in related {
                let score = item.score.unwrap_or_default();
                let _ = writeln!(text, "- [similarity {score:.2}] {}", describe(&item.record));
            }
        }
        if !recent.is_empty() {
            text.push_str("\n### Recent history\n");
            for item in recent {
                let _ = writeln!(text, "- {}", describe(&item.record));
            }
        }
        if self.truncated {
            text.push_str("\n(older context omitted)\n");
        }
        text
    }
}

fn describe(record: &Record) -> String {
    match record {
        Record::ConversationTurn(turn) => format!("{}: {}", turn.role, turn.content),
        Record::ToolInvocation(tool) => format!("tool {} [{}]", record.content(), tool.status),
        Record::DocumentReference(_) => format!("document {}", record.content()),
    }
}

/// Token estimate used for budgeting: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Convert f32 vector to little-endian bytes.
pub fn vec_to_bytes(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert little-endian bytes back to an f32 vector. Trailing bytes are ignored.
pub fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Inner product of two equal-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity. Zero vectors score 0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot_product(a, b) / (norm_a * norm_b)
}

/// L2-normalize a vector. Zero vectors are returned unchanged.
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{NewRecord, Role};

    fn turn(id: u64, role: Role, content: &str) -> Record {
        NewRecord::turn("s1", role, content).into_record(RecordId(id), Utc::now())
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn bytes_round_trip() {
        let v = vec![1.5f32, -2.25, 0.0, f32::MAX];
        assert_eq!(bytes_to_vec(&vec_to_bytes(&v)), v);
    }

    #[test]
    fn cosine_of_identical_is_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn l2_normalize_general_vector() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 0.001);
        assert!((n[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn render_empty_bundle() {
        assert_eq!(ContextBundle::empty().render(), "No relevant context found.");
    }

    #[test]
    fn render_groups_semantic_before_recent() {
        let bundle = ContextBundle {
            items: vec![
                ContextItem {
                    record: turn(2, Role::Agent, "Rust is a systems language"),
                    score: Some(0.87),
                },
                ContextItem {
                    record: turn(3, Role::User, "Who created it?"),
                    score: None,
                },
            ],
            truncated: false,
        };
        let text = bundle.render();
        assert!(text.starts_with("## Relevant Memory\n"));
        let related = text.find("[similarity 0.87] agent: Rust is a systems language").unwrap();
        let recent = text.find("- user: Who created it?").unwrap();
        assert!(related < recent);
        assert!(!text.contains("omitted"));
    }

    #[test]
    fn token_estimate_sums_items() {
        let bundle = ContextBundle {
            items: vec![ContextItem {
                record: turn(1, Role::User, "12345678"),
                score: None,
            }],
            truncated: true,
        };
        assert_eq!(bundle.token_estimate(), 2);
        assert!(bundle.render().contains("(older context omitted)"));
    }
}
