//! CLI module for Agentix
//!
//! Inspection commands over the backend router and the shared context window:
//! - `backends` / `info`: what is active and what it can do
//! - `ask`: route one prompt
//! - `context`: show, summarize, clear, export or import the shared window

use crate::config::AppConfig;
use agentix_llm::{ContextConfig, MessageFormat, SharedContextWindow};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

pub mod ask;
pub mod backends;
pub mod context;

/// Agentix backend router CLI
#[derive(Parser, Debug)]
#[command(name = "agentix")]
#[command(about = "Route prompts across AI backends and inspect the shared context window")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List active backends
    Backends {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Describe one active backend
    Info {
        /// Backend key (e.g. claude, ollama, gemini_cli)
        name: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Route a prompt to the best backend and print the answer
    Ask(ask::AskArgs),
    /// Inspect or manage the shared context window
    Context {
        #[command(subcommand)]
        action: ContextCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContextCommand {
    /// Print the window's messages
    Show {
        /// standard, attributed or full
        #[arg(long, default_value = "standard", value_parser = parse_format)]
        format: MessageFormat,
        /// Only messages produced by this backend
        #[arg(long)]
        backend: Option<String>,
    },
    /// Print totals and per-backend contributions
    Summary {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop messages, keeping system messages unless --all
    Clear {
        /// Drop system messages too
        #[arg(long)]
        all: bool,
    },
    /// Write the window to a file
    Export {
        /// Destination file
        path: PathBuf,
    },
    /// Replace the window with a saved snapshot
    Import {
        /// Snapshot file
        path: PathBuf,
    },
}

fn parse_format(value: &str) -> std::result::Result<MessageFormat, String> {
    value.parse()
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Some(Commands::Backends { json }) => backends::list(&config, json).await,
        Some(Commands::Info { name, json }) => backends::info(&config, &name, json).await,
        Some(Commands::Ask(args)) => ask::run(&config, args).await,
        Some(Commands::Context { action }) => context::run(&config.context, action),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

// ============================================================================
// Shared window persistence
// ============================================================================

/// Where the window snapshot lives
pub(crate) fn snapshot_path(config: &ContextConfig) -> Result<PathBuf> {
    config.snapshot_path().context(
        "No snapshot path configured and no home directory found; set context.snapshot_path",
    )
}

/// Load the window from its snapshot, or start empty if there is none
pub(crate) fn load_window(config: &ContextConfig) -> Result<SharedContextWindow> {
    anyhow::ensure!(
        config.max_tokens > 0,
        "context.max_tokens must be greater than zero"
    );
    let path = snapshot_path(config)?;
    let mut window = SharedContextWindow::new(config.max_tokens);
    if path.exists() {
        window
            .restore_snapshot(&path)
            .with_context(|| format!("Failed to load context window from {}", path.display()))?;
        let evicted = window.set_max_tokens(config.max_tokens);
        debug!(path = %path.display(), messages = window.len(), evicted, "Loaded context window");
    } else {
        debug!(path = %path.display(), "No context window snapshot yet");
    }
    Ok(window)
}

/// Persist the window to its snapshot
pub(crate) fn save_window(config: &ContextConfig, window: &SharedContextWindow) -> Result<()> {
    let path = snapshot_path(config)?;
    window
        .save_snapshot(&path)
        .with_context(|| format!("Failed to save context window to {}", path.display()))?;
    info!(path = %path.display(), "Context window saved");
    Ok(())
}
