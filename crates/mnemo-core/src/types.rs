// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record types shared by the log store, the vector index, and the engine.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier from the single global record sequence.
///
/// Shared across every record kind, so a vector entry joins back to exactly
/// one structured record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// The position of an empty sequence. Never issued to a record.
    pub const ZERO: RecordId = RecordId(0);

    /// The id that follows this one in the sequence.
    pub fn next(self) -> RecordId {
        RecordId(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Embedding,
}

/// Speaker of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

/// Outcome of a tool invocation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// The closed set of structured record kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ConversationTurn,
    ToolInvocation,
    DocumentReference,
}

/// A single user or agent utterance within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub record_id: RecordId,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A completed tool call made by the reasoning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub record_id: RecordId,
    pub session_id: SessionId,
    pub tool_name: String,
    pub input: String,
    pub output: String,
    pub status: ToolStatus,
    pub created_at: DateTime<Utc>,
}

/// A local document that has been read.
///
/// `content_hash` is the hex SHA-256 of the document content at access time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub record_id: RecordId,
    pub path: String,
    pub content_hash: String,
    /// Text that stands in for the document in memory (summary or excerpt).
    pub summary: Option<String>,
    pub last_accessed_at: DateTime<Utc>,
}

/// A committed structured record of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    ConversationTurn(ConversationTurn),
    ToolInvocation(ToolInvocationRecord),
    DocumentReference(DocumentReference),
}

impl Record {
    pub fn record_id(&self) -> RecordId {
        match self {
            Record::ConversationTurn(t) => t.record_id,
            Record::ToolInvocation(t) => t.record_id,
            Record::DocumentReference(d) => d.record_id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::ConversationTurn(_) => RecordKind::ConversationTurn,
            Record::ToolInvocation(_) => RecordKind::ToolInvocation,
            Record::DocumentReference(_) => RecordKind::DocumentReference,
        }
    }

    /// Session the record belongs to. Documents are session-less.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Record::ConversationTurn(t) => Some(&t.session_id),
            Record::ToolInvocation(t) => Some(&t.session_id),
            Record::DocumentReference(_) => None,
        }
    }

    /// Creation time (last access time for documents).
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::ConversationTurn(t) => t.created_at,
            Record::ToolInvocation(t) => t.created_at,
            Record::DocumentReference(d) => d.last_accessed_at,
        }
    }

    /// Text representation used for context budgeting and prompt rendering.
    pub fn content(&self) -> Cow<'_, str> {
        match self {
            Record::ConversationTurn(t) => Cow::Borrowed(&t.content),
            Record::ToolInvocation(t) => Cow::Owned(format!(
                "{}({}) -> {}",
                t.tool_name, t.input, t.output
            )),
            Record::DocumentReference(d) => match &d.summary {
                Some(summary) => Cow::Owned(format!("{}: {summary}", d.path)),
                None => Cow::Borrowed(&d.path),
            },
        }
    }

    /// Natural-language text worth embedding, or `None` if the record has none.
    ///
    /// Failed tool calls and documents without a summary are not embedded.
    pub fn embeddable_text(&self) -> Option<String> {
        let text = match self {
            Record::ConversationTurn(t) => t.content.clone(),
            Record::ToolInvocation(t) if t.status == ToolStatus::Ok => {
                if t.output.trim().is_empty() {
                    return None;
                }
                format!("{}: {}\n{}", t.tool_name, t.input, t.output)
            }
            Record::ToolInvocation(_) => return None,
            Record::DocumentReference(d) => d.summary.clone()?,
        };
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

/// A record payload before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewRecord {
    ConversationTurn {
        session_id: SessionId,
        role: Role,
        content: String,
    },
    ToolInvocation {
        session_id: SessionId,
        tool_name: String,
        input: String,
        output: String,
        status: ToolStatus,
    },
    DocumentReference {
        path: String,
        content_hash: String,
        summary: Option<String>,
    },
}

impl NewRecord {
    /// Convenience constructor for a conversation turn.
    pub fn turn(session_id: impl Into<SessionId>, role: Role, content: impl Into<String>) -> Self {
        NewRecord::ConversationTurn {
            session_id: session_id.into(),
            role,
            content: content.into(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            NewRecord::ConversationTurn { .. } => RecordKind::ConversationTurn,
            NewRecord::ToolInvocation { .. } => RecordKind::ToolInvocation,
            NewRecord::DocumentReference { .. } => RecordKind::DocumentReference,
        }
    }

    /// Materializes the committed record once the store has assigned id and time.
    pub fn into_record(self, record_id: RecordId, at: DateTime<Utc>) -> Record {
        match self {
            NewRecord::ConversationTurn {
                session_id,
                role,
                content,
            } => Record::ConversationTurn(ConversationTurn {
                record_id,
                session_id,
                role,
                content,
                created_at: at,
            }),
            NewRecord::ToolInvocation {
                session_id,
                tool_name,
                input,
                output,
                status,
            } => Record::ToolInvocation(ToolInvocationRecord {
                record_id,
                session_id,
                tool_name,
                input,
                output,
                status,
                created_at: at,
            }),
            NewRecord::DocumentReference {
                path,
                content_hash,
                summary,
            } => Record::DocumentReference(DocumentReference {
                record_id,
                path,
                content_hash,
                summary,
                last_accessed_at: at,
            }),
        }
    }
}

/// Filter for [`StorageAdapter::query`](crate::StorageAdapter::query).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub kind: RecordKind,
    /// Restrict to one session. Ignored for [`RecordKind::DocumentReference`].
    pub session_id: Option<SessionId>,
    /// Only records created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl RecordQuery {
    pub fn new(kind: RecordKind, limit: usize) -> Self {
        Self {
            kind,
            session_id: None,
            since: None,
            limit,
        }
    }

    pub fn session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

/// Row counts reported by the log store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub conversation_turns: u64,
    pub tool_invocations: u64,
    pub document_references: u64,
    pub tombstones: u64,
    pub last_record_id: RecordId,
}

impl StoreStats {
    pub fn total(&self) -> u64 {
        self.conversation_turns + self.tool_invocations + self.document_references
    }
}

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}
