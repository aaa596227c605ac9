// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binary snapshot format for the vector index.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic "MNEMOVIX" | version u32 | dimension u32 | metric u8
//! indexed_through u64
//! ahead_count u64 | ahead ids u64...
//! tombstone_count u64 | tombstone ids u64...
//! entry_count u64
//!   record_id u64 | created_at_micros i64 | text_len u32 | text | vector f32 * dimension
//! sha256 of everything above (32 bytes)
//! ```
//!
//! Encoding is a pure function of the index state, so persisting an
//! unchanged index twice yields byte-identical files.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::DateTime;
use mnemo_config::model::SimilarityMetric;
use mnemo_core::{MnemoError, RecordId};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::index::IndexState;
use crate::types::{bytes_to_vec, vec_to_bytes, VectorEntry};

const MAGIC: &[u8; 8] = b"MNEMOVIX";
const VERSION: u32 = 1;
const CHECKSUM_LEN: usize = 32;

/// Why a snapshot could not be decoded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot truncated at byte {0}")]
    Truncated(usize),
    #[error("not a vector index snapshot")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,
    #[error("snapshot has dimension {found}, index is configured for {expected}")]
    Dimension { expected: usize, found: usize },
    #[error("unknown similarity metric tag {0}")]
    UnknownMetric(u8),
    #[error("snapshot uses metric {found:?}, index is configured for {expected:?}")]
    Metric {
        expected: SimilarityMetric,
        found: SimilarityMetric,
    },
    #[error("invalid entry text for record {0}")]
    InvalidText(RecordId),
    #[error("invalid timestamp for record {0}")]
    InvalidTimestamp(RecordId),
    #[error("{0} trailing bytes after last entry")]
    TrailingBytes(usize),
}

fn metric_tag(metric: SimilarityMetric) -> u8 {
    match metric {
        SimilarityMetric::Cosine => 0,
        SimilarityMetric::InnerProduct => 1,
    }
}

fn metric_from_tag(tag: u8) -> Option<SimilarityMetric> {
    match tag {
        0 => Some(SimilarityMetric::Cosine),
        1 => Some(SimilarityMetric::InnerProduct),
        _ => None,
    }
}

fn put_ids(buf: &mut Vec<u8>, ids: &BTreeSet<RecordId>) {
    buf.extend_from_slice(&(ids.len() as u64).to_le_bytes());
    for id in ids {
        buf.extend_from_slice(&id.get().to_le_bytes());
    }
}

/// Serializes `state` into the snapshot format, checksum included.
pub fn encode(state: &IndexState, dimension: usize, metric: SimilarityMetric) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + state.len() * (dimension * 4 + 64));
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&(dimension as u32).to_le_bytes());
    buf.push(metric_tag(metric));
    buf.extend_from_slice(&state.indexed_through().get().to_le_bytes());
    put_ids(&mut buf, state.processed_ahead());
    put_ids(&mut buf, state.tombstones());

    buf.extend_from_slice(&(state.len() as u64).to_le_bytes());
    for entry in state.entries() {
        buf.extend_from_slice(&entry.record_id.get().to_le_bytes());
        buf.extend_from_slice(&entry.created_at.timestamp_micros().to_le_bytes());
        buf.extend_from_slice(&(entry.text.len() as u32).to_le_bytes());
        buf.extend_from_slice(entry.text.as_bytes());
        buf.extend_from_slice(&vec_to_bytes(&entry.vector));
    }

    let checksum = Sha256::digest(&buf);
    buf.extend_from_slice(&checksum);
    buf
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(SnapshotError::Truncated(self.pos))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, SnapshotError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn ids(&mut self) -> Result<BTreeSet<RecordId>, SnapshotError> {
        let count = self.u64()?;
        let mut ids = BTreeSet::new();
        for _ in 0..count {
            ids.insert(RecordId(self.u64()?));
        }
        Ok(ids)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Parses a snapshot, verifying magic, version, checksum, dimension, and metric.
pub fn decode(
    bytes: &[u8],
    expected_dimension: usize,
    expected_metric: SimilarityMetric,
) -> Result<IndexState, SnapshotError> {
    if bytes.len() < MAGIC.len() + CHECKSUM_LEN {
        return Err(SnapshotError::Truncated(bytes.len()));
    }
    let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if !body.starts_with(MAGIC) {
        return Err(SnapshotError::BadMagic);
    }
    if Sha256::digest(body).as_slice() != checksum {
        return Err(SnapshotError::ChecksumMismatch);
    }

    let mut r = Reader {
        buf: body,
        pos: MAGIC.len(),
    };
    let version = r.u32()?;
    if version != VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let dimension = r.u32()? as usize;
    if dimension != expected_dimension {
        return Err(SnapshotError::Dimension {
            expected: expected_dimension,
            found: dimension,
        });
    }
    let tag = r.u8()?;
    let metric = metric_from_tag(tag).ok_or(SnapshotError::UnknownMetric(tag))?;
    if metric != expected_metric {
        return Err(SnapshotError::Metric {
            expected: expected_metric,
            found: metric,
        });
    }

    let indexed_through = RecordId(r.u64()?);
    let ahead = r.ids()?;
    let tombstones = r.ids()?;

    let count = r.u64()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let record_id = RecordId(r.u64()?);
        let created_at = DateTime::from_timestamp_micros(r.i64()?)
            .ok_or(SnapshotError::InvalidTimestamp(record_id))?;
        let text_len = r.u32()? as usize;
        let text = std::str::from_utf8(r.take(text_len)?)
            .map_err(|_| SnapshotError::InvalidText(record_id))?
            .to_string();
        let vector = bytes_to_vec(r.take(dimension * 4)?);
        entries.push(VectorEntry {
            record_id,
            vector,
            text,
            created_at,
        });
    }
    if r.remaining() != 0 {
        return Err(SnapshotError::TrailingBytes(r.remaining()));
    }

    Ok(IndexState::from_parts(entries, tombstones, indexed_through, ahead))
}

/// Writes `bytes` to `path` via temp file, fsync, and atomic rename.
///
/// A crash at any point leaves either the old snapshot or the new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MnemoError> {
    let fail = |what: &str, e: std::io::Error| {
        MnemoError::persistence(format!("{what} {}", path.display()), e)
    };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(|e| fail("cannot create directory for", e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    let mut file = File::create(tmp).map_err(|e| fail("cannot create temp file for", e))?;
    file.write_all(bytes)
        .map_err(|e| fail("cannot write snapshot", e))?;
    file.sync_all()
        .map_err(|e| fail("cannot sync snapshot", e))?;
    drop(file);

    fs::rename(tmp, path).map_err(|e| fail("cannot rename snapshot into", e))?;

    #[cfg(unix)]
    {
        if let Some(dir) = dir {
            File::open(dir)
                .and_then(|d| d.sync_all())
                .map_err(|e| fail("cannot sync directory of", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_state() -> IndexState {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let entries = vec![
            VectorEntry {
                record_id: RecordId(1),
                vector: vec![0.6, 0.8],
                text: "What is Rust?".into(),
                created_at: at,
            },
            VectorEntry {
                record_id: RecordId(4),
                vector: vec![-1.0, 0.0],
                text: "Rust ist eine Systemsprache ✓".into(),
                created_at: at,
            },
        ];
        IndexState::from_parts(
            entries,
            BTreeSet::from([RecordId(1)]),
            RecordId(2),
            BTreeSet::from([RecordId(4)]),
        )
    }

    #[test]
    fn encode_is_deterministic() {
        let state = sample_state();
        assert_eq!(
            encode(&state, 2, SimilarityMetric::Cosine),
            encode(&state, 2, SimilarityMetric::Cosine)
        );
    }

    #[test]
    fn decode_restores_state() {
        let bytes = encode(&sample_state(), 2, SimilarityMetric::Cosine);
        let state = decode(&bytes, 2, SimilarityMetric::Cosine).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.indexed_through(), RecordId(2));
        assert!(state.tombstones().contains(&RecordId(1)));
        assert!(state.processed_ahead().contains(&RecordId(4)));
        let texts: Vec<_> = state.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["What is Rust?", "Rust ist eine Systemsprache ✓"]);
        let first = state.entries().next().unwrap();
        assert_eq!(first.created_at.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = encode(&sample_state(), 2, SimilarityMetric::Cosine);
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(
            decode(&bytes, 2, SimilarityMetric::Cosine),
            Err(SnapshotError::ChecksumMismatch)
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = encode(&sample_state(), 2, SimilarityMetric::Cosine);
        assert!(decode(&bytes[..10], 2, SimilarityMetric::Cosine).is_err());
        assert!(decode(&[], 2, SimilarityMetric::Cosine).is_err());
    }

    #[test]
    fn garbage_is_bad_magic() {
        let bytes = vec![7u8; 128];
        assert!(matches!(
            decode(&bytes, 2, SimilarityMetric::Cosine),
            Err(SnapshotError::BadMagic)
        ));
    }

    #[test]
    fn dimension_change_is_rejected() {
        let bytes = encode(&sample_state(), 2, SimilarityMetric::Cosine);
        assert!(matches!(
            decode(&bytes, 384, SimilarityMetric::Cosine),
            Err(SnapshotError::Dimension { expected: 384, found: 2 })
        ));
    }

    #[test]
    fn metric_change_is_rejected() {
        let bytes = encode(&sample_state(), 2, SimilarityMetric::Cosine);
        assert!(matches!(
            decode(&bytes, 2, SimilarityMetric::InnerProduct),
            Err(SnapshotError::Metric {
                expected: SimilarityMetric::InnerProduct,
                found: SimilarityMetric::Cosine,
            })
        ));
        let bytes = encode(&sample_state(), 2, SimilarityMetric::InnerProduct);
        assert!(decode(&bytes, 2, SimilarityMetric::InnerProduct).is_ok());
    }

    #[test]
    fn atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vector.idx");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("nested").join("vector.idx.tmp").exists());
    }
}
