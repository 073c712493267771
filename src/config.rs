//! Configuration loading
//!
//! Layers embedded defaults, optional config files, and `AGENTIX_*`
//! environment variables.

use agentix_llm::{BackendConfig, ContextConfig, RouterConfig, RoutingConfig};
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Default generation limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Backend key -> configuration slice
    #[serde(default)]
    pub providers: IndexMap<String, BackendConfig>,
    /// Routing overrides
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Shared context window
    #[serde(default)]
    pub context: ContextConfig,
}

fn default_temperature() -> f32 {
    agentix_llm::completion::DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    agentix_llm::completion::DEFAULT_MAX_TOKENS
}

impl AppConfig {
    /// The slice the router is built from
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            providers: self.providers.clone(),
            routing: self.routing.clone(),
        }
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("AGENTIX_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false));

    if let Some(home) = dirs::home_dir() {
        let user_config = home.join(".agentix").join("config");
        builder = builder.add_source(File::with_name(&user_config.to_string_lossy()).required(false));
    }

    // 3. Environment variables (highest priority)
    // prefix_separator("_") makes AGENTIX_PROVIDERS__CLAUDE__API_KEY map to
    // providers.claude.api_key.
    let config = builder
        .add_source(
            Environment::with_prefix("AGENTIX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
