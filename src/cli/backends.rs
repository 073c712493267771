//! CLI commands: `agentix backends`, `agentix info <name>`

use crate::config::AppConfig;
use agentix_llm::{BackendInfo, BackendRegistry, ProviderRouter};
use anyhow::{Context, Result};

/// Build the router from configuration
pub(crate) async fn build_router(config: &AppConfig) -> Result<ProviderRouter> {
    ProviderRouter::from_config(&config.router_config(), &BackendRegistry::builtin())
        .await
        .context("Failed to initialize AI backends")
}

/// List active backends
pub async fn list(config: &AppConfig, json: bool) -> Result<()> {
    let router = build_router(config).await?;
    let infos = router.all_backend_info();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!();
    println!("  Active Backends");
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<14} {:<18} {:<30} Context",
        "Backend", "Shape", "Default Model"
    );
    println!("  {}", "-".repeat(72));
    for info in &infos {
        println!(
            "  {:<14} {:<18} {:<30} {}",
            info.name, info.shape, info.default_model, info.max_context_tokens
        );
    }
    println!();
    Ok(())
}

/// Describe one backend
pub async fn info(config: &AppConfig, name: &str, json: bool) -> Result<()> {
    let router = build_router(config).await?;
    let info = router.backend_info(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&info);
    }
    Ok(())
}

fn print_info(info: &BackendInfo) {
    let capabilities: Vec<&str> = info.capabilities.iter().map(|c| c.as_str()).collect();
    println!("  Backend:       {}", info.name);
    println!("  Shape:         {}", info.shape);
    println!("  Default model: {}", info.default_model);
    println!("  Max context:   {} tokens", info.max_context_tokens);
    println!("  Capabilities:  {}", capabilities.join(", "));
}
