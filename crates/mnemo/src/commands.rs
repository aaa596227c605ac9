// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations for the `mnemo` binary.
//!
//! Each command opens the engine, runs, closes it (flushing the index), and
//! returns the text to print. `--json` switches every command to a JSON body.

use std::fmt::Write as _;
use std::path::PathBuf;

use mnemo_config::model::MnemoConfig;
use mnemo_core::{HealthStatus, MnemoError, NewRecord, Record, RecordId, Role, SessionId, ToolStatus};
use mnemo_memory::{MemoryEngine, ToolCall};
use serde::Serialize;

/// A parsed command, independent of the clap definitions.
#[derive(Debug)]
pub enum Command {
    Remember {
        session: SessionId,
        role: Role,
        text: String,
    },
    Tool {
        session: SessionId,
        name: String,
        input: String,
        output: String,
        status: ToolStatus,
    },
    Exchange {
        session: SessionId,
        user: String,
        agent: String,
        tools: Vec<ToolCall>,
    },
    Document {
        path: PathBuf,
        summary: Option<String>,
    },
    Recall {
        session: SessionId,
        budget: Option<usize>,
        query: String,
    },
    History {
        session: SessionId,
        limit: usize,
    },
    Show {
        record_id: RecordId,
    },
    Forget {
        record_id: RecordId,
    },
    Flush,
    Repair,
    Compact,
    Stats,
    Health,
}

/// Parses the `--tools` JSON array of an exchange.
pub fn parse_tools(raw: Option<&str>) -> Result<Vec<ToolCall>, MnemoError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| MnemoError::Config(format!("invalid --tools JSON: {e}"))),
    }
}

#[derive(Debug, Serialize)]
struct DocumentResponse<'a> {
    record: &'a Record,
    unchanged: bool,
    embedded: bool,
}

#[derive(Debug, Serialize)]
struct ForgetResponse {
    record_id: RecordId,
    forgotten: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    detail: Option<String>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, MnemoError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| MnemoError::Internal(format!("failed to serialize output: {e}")))
}

fn describe(record: &Record) -> String {
    match record.session_id() {
        Some(session) => format!(
            "#{} [{}] {} {}: {}",
            record.record_id(),
            record.kind(),
            session,
            record.created_at().format("%Y-%m-%d %H:%M:%S"),
            record.content()
        ),
        None => format!(
            "#{} [{}] {}: {}",
            record.record_id(),
            record.kind(),
            record.created_at().format("%Y-%m-%d %H:%M:%S"),
            record.content()
        ),
    }
}

/// Opens the engine for `config`, executes `command`, and closes the engine.
pub async fn run(command: Command, config: &MnemoConfig, json: bool) -> Result<String, MnemoError> {
    let engine = MemoryEngine::open(config).await?;
    let result = execute(command, &engine, json).await;
    let closed = engine.close().await;
    let output = result?;
    closed?;
    Ok(output)
}

/// Executes one command against an open engine.
pub async fn execute(command: Command, engine: &MemoryEngine, json: bool) -> Result<String, MnemoError> {
    match command {
        Command::Remember {
            session,
            role,
            text,
        } => {
            let record = engine.remember(NewRecord::turn(session, role, text)).await?;
            if json {
                to_json(&record)
            } else {
                Ok(format!("remembered #{}", record.record_id()))
            }
        }
        Command::Tool {
            session,
            name,
            input,
            output,
            status,
        } => {
            let record = engine
                .remember(NewRecord::ToolInvocation {
                    session_id: session,
                    tool_name: name,
                    input,
                    output,
                    status,
                })
                .await?;
            if json {
                to_json(&record)
            } else {
                Ok(format!("remembered #{}", record.record_id()))
            }
        }
        Command::Exchange {
            session,
            user,
            agent,
            tools,
        } => {
            let records = engine
                .remember_exchange(&session, &user, &agent, tools)
                .await?;
            if json {
                to_json(&records)
            } else {
                let ids: Vec<String> = records
                    .iter()
                    .map(|r| format!("#{}", r.record_id()))
                    .collect();
                Ok(format!("remembered {}", ids.join(", ")))
            }
        }
        Command::Document { path, summary } => {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                MnemoError::Config(format!("cannot read document {}: {e}", path.display()))
            })?;
            let display = path.display().to_string();
            let outcome = engine
                .remember_document(&display, &content, summary)
                .await?;
            if json {
                to_json(&DocumentResponse {
                    record: &outcome.record,
                    unchanged: outcome.unchanged,
                    embedded: outcome.embedded,
                })
            } else if outcome.unchanged {
                Ok(format!(
                    "document {display} unchanged, access recorded as #{}",
                    outcome.record.record_id()
                ))
            } else {
                Ok(format!(
                    "document {display} registered as #{}",
                    outcome.record.record_id()
                ))
            }
        }
        Command::Recall {
            session,
            budget,
            query,
        } => {
            let budget = budget.unwrap_or(engine.config().token_budget);
            let bundle = engine.retrieve(&query, &session, budget).await?;
            if json {
                to_json(&bundle)
            } else {
                Ok(bundle.render())
            }
        }
        Command::History { session, limit } => {
            let turns = engine.recent_turns(&session, limit).await?;
            if json {
                return to_json(&turns);
            }
            if turns.is_empty() {
                return Ok(format!("no history for session {session}"));
            }
            let mut out = String::new();
            for turn in &turns {
                let _ = writeln!(out, "#{} {}: {}", turn.record_id, turn.role, turn.content);
            }
            Ok(out.trim_end().to_string())
        }
        Command::Show { record_id } => {
            let record = engine.get(record_id).await?;
            if json {
                to_json(&record)
            } else {
                Ok(describe(&record))
            }
        }
        Command::Forget { record_id } => {
            let forgotten = engine.forget(record_id).await?;
            if json {
                to_json(&ForgetResponse {
                    record_id,
                    forgotten,
                })
            } else if forgotten {
                Ok(format!("forgot #{record_id}"))
            } else {
                Ok(format!("#{record_id} was already forgotten"))
            }
        }
        Command::Flush => {
            engine.flush().await?;
            if json {
                to_json(&engine.stats().await?)
            } else {
                Ok(format!(
                    "index flushed through #{}",
                    engine.index().indexed_through()
                ))
            }
        }
        Command::Repair => {
            let report = engine.repair().await?;
            let join = engine.verify_join().await?;
            if json {
                return to_json(&serde_json::json!({ "reconcile": report, "join": join }));
            }
            Ok(format!(
                "embedded {}, still deferred {}, tombstones applied {}, orphans removed {}",
                report.embedded, report.deferred, report.tombstones_synced, join.orphans
            ))
        }
        Command::Compact => {
            let report = engine.compact().await?;
            if json {
                to_json(&report)
            } else {
                Ok(format!(
                    "removed {} vector entries and {} records",
                    report.vector_entries_removed, report.records_purged
                ))
            }
        }
        Command::Stats => {
            let stats = engine.stats().await?;
            if json {
                return to_json(&stats);
            }
            let mut out = String::new();
            let _ = writeln!(out, "conversation turns:  {}", stats.store.conversation_turns);
            let _ = writeln!(out, "tool invocations:    {}", stats.store.tool_invocations);
            let _ = writeln!(out, "document references: {}", stats.store.document_references);
            let _ = writeln!(out, "tombstones:          {}", stats.store.tombstones);
            let _ = writeln!(out, "last record id:      {}", stats.store.last_record_id);
            let _ = writeln!(out, "vector entries:      {}", stats.vector_entries);
            let _ = writeln!(out, "vector tombstones:   {}", stats.vector_tombstones);
            let _ = writeln!(out, "indexed through:     {}", stats.indexed_through);
            let _ = writeln!(out, "pending:             {}", stats.pending);
            let _ = write!(out, "durability:          {:?}", stats.state);
            Ok(out)
        }
        Command::Health => {
            let (status, detail) = match engine.health().await? {
                HealthStatus::Healthy => ("healthy", None),
                HealthStatus::Degraded(reason) => ("degraded", Some(reason)),
                HealthStatus::Unhealthy(reason) => ("unhealthy", Some(reason)),
            };
            if json {
                return to_json(&HealthResponse { status, detail });
            }
            Ok(match detail {
                Some(reason) => format!("{status}: {reason}"),
                None => status.to_string(),
            })
        }
    }
}
