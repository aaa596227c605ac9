// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mnemo - contextual memory for conversational agents.
//!
//! This is the binary entry point: it loads configuration, opens a memory
//! engine on the configured data directory, and runs one command against it.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mnemo_core::{Role, ToolStatus};

/// Mnemo - contextual memory for conversational agents.
#[derive(Parser, Debug)]
#[command(name = "mnemo", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Speaker of a remembered turn.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RoleArg {
    User,
    Agent,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => Role::User,
            RoleArg::Agent => Role::Agent,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a single conversation turn.
    Remember {
        #[arg(long, short)]
        session: String,
        #[arg(long, value_enum, default_value_t = RoleArg::User)]
        role: RoleArg,
        text: String,
    },
    /// Record a tool invocation.
    Tool {
        #[arg(long, short)]
        session: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        input: String,
        #[arg(long, default_value = "")]
        output: String,
        /// Mark the invocation as failed (failed calls are not embedded).
        #[arg(long)]
        failed: bool,
    },
    /// Record a user message, the tools used, and the agent reply.
    Exchange {
        #[arg(long, short)]
        session: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        agent: String,
        /// JSON array of `{tool_name, input, output, status}` objects.
        #[arg(long)]
        tools: Option<String>,
    },
    /// Register an access to a local document.
    Document {
        path: PathBuf,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Assemble a context bundle for a query.
    Recall {
        #[arg(long, short)]
        session: String,
        /// Token budget; defaults to `memory.token_budget`.
        #[arg(long)]
        budget: Option<usize>,
        query: String,
    },
    /// Show the most recent turns of a session, oldest first.
    History {
        #[arg(long, short)]
        session: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one live record.
    Show { record_id: u64 },
    /// Tombstone a record in both stores.
    Forget { record_id: u64 },
    /// Snapshot the vector index now.
    Flush,
    /// Retry deferred embeddings, verify the record/vector join, and flush.
    Repair,
    /// Physically remove tombstoned data.
    Compact,
    /// Record counts and durability state.
    Stats,
    /// Health of the store and the embedder.
    Health,
}

impl Commands {
    fn into_command(self) -> Result<commands::Command, mnemo_core::MnemoError> {
        use commands::Command;

        Ok(match self {
            Commands::Remember {
                session,
                role,
                text,
            } => Command::Remember {
                session: session.into(),
                role: role.into(),
                text,
            },
            Commands::Tool {
                session,
                name,
                input,
                output,
                failed,
            } => Command::Tool {
                session: session.into(),
                name,
                input,
                output,
                status: if failed {
                    ToolStatus::Error
                } else {
                    ToolStatus::Ok
                },
            },
            Commands::Exchange {
                session,
                user,
                agent,
                tools,
            } => Command::Exchange {
                session: session.into(),
                user,
                agent,
                tools: commands::parse_tools(tools.as_deref())?,
            },
            Commands::Document { path, summary } => Command::Document { path, summary },
            Commands::Recall {
                session,
                budget,
                query,
            } => Command::Recall {
                session: session.into(),
                budget,
                query,
            },
            Commands::History { session, limit } => Command::History {
                session: session.into(),
                limit,
            },
            Commands::Show { record_id } => Command::Show {
                record_id: mnemo_core::RecordId(record_id),
            },
            Commands::Forget { record_id } => Command::Forget {
                record_id: mnemo_core::RecordId(record_id),
            },
            Commands::Flush => Command::Flush,
            Commands::Repair => Command::Repair,
            Commands::Compact => Command::Compact,
            Commands::Stats => Command::Stats,
            Commands::Health => Command::Health,
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => mnemo_config::load_and_validate_path(path),
        None => mnemo_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            mnemo_config::render_errors(&errors);
            std::process::exit(2);
        }
    };

    init_tracing(&config.log.level);
    mnemo_memory::recording::register_metrics();

    let outcome = match cli.command.into_command() {
        Ok(command) => commands::run(command, &config, cli.json).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("mnemo: {e}");
            std::process::exit(1);
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the config level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mnemo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
