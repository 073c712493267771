//! CLI command: `agentix ask`

use super::backends::build_router;
use super::{load_window, save_window};
use crate::config::AppConfig;
use agentix_llm::{Message, RouteRequest, TaskType};
use anyhow::Result;
use clap::Args;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Arguments for `agentix ask`
#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt text
    pub prompt: String,
    /// Task type used to pick a backend (e.g. planning, code_generation)
    #[arg(long, default_value = "code_generation")]
    pub task: String,
    /// Backend to try first
    #[arg(long)]
    pub backend: Option<String>,
    /// Model to request
    #[arg(long)]
    pub model: Option<String>,
    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Read and extend the shared context window
    #[arg(long)]
    pub shared: bool,
}

/// Route one prompt
pub async fn run(config: &AppConfig, args: AskArgs) -> Result<()> {
    let shared = args.shared || config.context.enabled;
    let window = if shared {
        Some(Arc::new(Mutex::new(load_window(&config.context)?)))
    } else {
        None
    };

    let mut router = build_router(config).await?;
    if let Some(window) = &window {
        router = router.with_shared_context(Arc::clone(window));
    }

    let mut request = RouteRequest::new(vec![Message::user(args.prompt)], TaskType::from(args.task))
        .with_temperature(args.temperature.unwrap_or(config.temperature))
        .with_max_tokens(args.max_tokens.unwrap_or(config.max_tokens))
        .with_shared_context(shared);
    if let Some(backend) = args.backend {
        request = request.prefer(backend);
    }
    if let Some(model) = args.model {
        request = request.with_model(model);
    }

    let outcome = router.complete(request).await;

    // Saved even when the call failed; the prompt is already in the window
    if let Some(window) = &window {
        let window = window.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = save_window(&config.context, &window) {
            warn!(error = %e, "Could not save context window");
        }
    }

    let routed = outcome?;
    println!("{}", routed.content);
    eprintln!("[{} / {}]", routed.backend, routed.model);
    Ok(())
}
