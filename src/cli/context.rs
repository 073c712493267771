//! CLI command: `agentix context`

use super::{load_window, save_window, ContextCommand};
use agentix_llm::ContextConfig;
use anyhow::{Context, Result};

/// Run a context subcommand against the persisted window
pub fn run(config: &ContextConfig, action: ContextCommand) -> Result<()> {
    let mut window = load_window(config)?;

    match action {
        ContextCommand::Show { format, backend } => {
            let messages = window.messages(format, backend.as_deref());
            println!("{}", serde_json::to_string_pretty(&messages)?);
        }
        ContextCommand::Summary { json } => {
            let summary = window.summary();
            let contributions = window.backend_contributions();
            if json {
                let value = serde_json::json!({
                    "summary": summary,
                    "contributions": contributions,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("  Messages:    {}", summary.total_messages);
                println!(
                    "  Tokens:      {} / {} ({:.1}%)",
                    summary.estimated_tokens, summary.max_tokens, summary.utilization_percent
                );
                if let (Some(oldest), Some(newest)) =
                    (summary.oldest_timestamp, summary.newest_timestamp)
                {
                    println!("  Span:        {} .. {}", oldest.to_rfc3339(), newest.to_rfc3339());
                }
                for (backend, share) in &contributions {
                    println!(
                        "  {:<14} {:>3} messages  {:>7} tokens  {:>5.1}%  [{}]",
                        backend,
                        share.message_count,
                        share.estimated_tokens,
                        share.share_percent,
                        share.models.join(", ")
                    );
                }
            }
        }
        ContextCommand::Clear { all } => {
            window.clear(!all);
            save_window(config, &window)?;
            println!("Context cleared ({} messages kept)", window.len());
        }
        ContextCommand::Export { path } => {
            window
                .save_snapshot(&path)
                .with_context(|| format!("Failed to export context window to {}", path.display()))?;
            println!("Exported {} messages to {}", window.len(), path.display());
        }
        ContextCommand::Import { path } => {
            window
                .restore_snapshot(&path)
                .with_context(|| format!("Failed to import context window from {}", path.display()))?;
            window.set_max_tokens(config.max_tokens);
            save_window(config, &window)?;
            println!("Imported {} messages from {}", window.len(), path.display());
        }
    }
    Ok(())
}
