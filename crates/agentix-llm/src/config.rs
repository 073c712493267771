//! Configuration types for backends, routing and the shared context window
//!
//! These are plain serde structs. The binary layers them from TOML files and
//! `AGENTIX_*` environment variables; tests build them directly.

use crate::capability::TaskType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default shared-window budget, in estimated tokens
pub const DEFAULT_CONTEXT_MAX_TOKENS: usize = 200_000;

/// Default request timeout for hosted backends
pub const DEFAULT_HOSTED_TIMEOUT_SECS: u64 = 120;

/// Default request timeout for CLI and local backends
pub const DEFAULT_LOCAL_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Backend Configuration
// ============================================================================

/// Configuration slice for one backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Whether the backend should be loaded
    pub enabled: bool,
    /// API key (hosted backends); falls back to the backend's env vars
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model override
    pub default_model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Executable override (CLI backends)
    pub command: Option<String>,
}

impl BackendConfig {
    /// An enabled backend with everything else defaulted
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the executable
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Configured base URL, ignoring blanks
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        non_blank(self.base_url.as_deref())
    }

    /// Configured default model, ignoring blanks
    #[must_use]
    pub fn default_model(&self) -> Option<&str> {
        non_blank(self.default_model.as_deref())
    }

    /// Configured executable, ignoring blanks
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        non_blank(self.command.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Routing Configuration
// ============================================================================

/// Routing overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Backend to try first for every request; empty means none
    pub preferred_backend: Option<String>,
    /// Task type -> preferred backend
    pub task_routing: HashMap<String, String>,
    /// Task type -> ordered preference list, replacing the built-in row
    pub task_preferences: HashMap<String, Vec<String>>,
    /// Order for unknown task types, replacing the built-in fallback
    pub fallback_order: Vec<String>,
}

impl RoutingConfig {
    /// Preferred backend for a task when the caller named none
    #[must_use]
    pub fn preferred_for(&self, task: &TaskType) -> Option<&str> {
        non_blank(self.task_routing.get(task.as_str()).map(String::as_str))
            .or_else(|| non_blank(self.preferred_backend.as_deref()))
    }
}

// ============================================================================
// Router Configuration
// ============================================================================

/// Router configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Backend key -> configuration slice; missing keys count as disabled
    pub providers: IndexMap<String, BackendConfig>,
    /// Routing overrides
    pub routing: RoutingConfig,
}

impl RouterConfig {
    /// Add or replace a backend slice
    #[must_use]
    pub fn with_backend(mut self, key: impl Into<String>, config: BackendConfig) -> Self {
        self.providers.insert(key.into(), config);
        self
    }

    /// Configuration slice for a backend, if enabled
    #[must_use]
    pub fn enabled_backend(&self, key: &str) -> Option<&BackendConfig> {
        self.providers.get(key).filter(|c| c.enabled)
    }
}

// ============================================================================
// Shared Context Configuration
// ============================================================================

fn default_context_max_tokens() -> usize {
    DEFAULT_CONTEXT_MAX_TOKENS
}

/// Shared context window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Whether the window is created and persisted
    #[serde(default)]
    pub enabled: bool,
    /// Token budget
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,
    /// Snapshot file; empty means `~/.agentix/context.json`
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tokens: DEFAULT_CONTEXT_MAX_TOKENS,
            snapshot_path: None,
        }
    }
}

impl ContextConfig {
    /// Where the window snapshot lives
    #[must_use]
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        match non_blank(self.snapshot_path.as_deref()) {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::home_dir().map(|home| home.join(".agentix").join("context.json")),
        }
    }
}
