// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use agentflow_cli::commands::{run, stream};

#[derive(Parser)]
#[command(name = "agentflow", about = "Run and stream turns against an agentflow engine")]
struct Cli {
    /// Tracing filter directive, e.g. "info" or "agentflow_core=debug"
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one non-streaming turn and print the result as JSON
    Run {
        /// Path to a YAML agent config file
        config: PathBuf,
        /// The user message to send
        message: String,
        #[arg(long)]
        conversation_id: Option<String>,
    },
    /// Run one turn and print each stream event as a line of NDJSON
    Stream {
        /// Path to a YAML agent config file
        config: PathBuf,
        /// The user message to send
        message: String,
        #[arg(long)]
        conversation_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            config,
            message,
            conversation_id,
        } => run::execute(&config, message, conversation_id).await,
        Commands::Stream {
            config,
            message,
            conversation_id,
        } => stream::execute(&config, message, conversation_id).await,
    }
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
