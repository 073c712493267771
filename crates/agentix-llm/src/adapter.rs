//! Backend adapter trait definition
//!
//! Every backend, whatever its shape, is driven through [`BackendAdapter`].
//! The router only ever reads the static descriptors, calls
//! `validate_config` once at construction, and calls `complete` per request.

use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a backend is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendShape {
    /// Network API authenticated with an API key
    HostedApi,
    /// Pre-authenticated command-line tool
    CliAuthenticated,
    /// HTTP service on a local or configurable base URL
    LocalHttp,
}

impl BackendShape {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostedApi => "hosted_api",
            Self::CliAuthenticated => "cli_authenticated",
            Self::LocalHttp => "local_http",
        }
    }
}

impl fmt::Display for BackendShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for backend adapters
#[async_trait::async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Stable backend key (e.g. `claude_cli`)
    fn name(&self) -> &str;

    /// How the backend is reached
    fn shape(&self) -> BackendShape;

    /// What the backend is good at
    fn capabilities(&self) -> &[Capability];

    /// Largest prompt, in estimated tokens, the backend accepts
    fn max_context_tokens(&self) -> usize;

    /// Model used when nothing more specific applies
    fn default_model(&self) -> &str;

    /// Best model for a task type, falling back to [`default_model`](Self::default_model)
    fn optimal_model_for(&self, task: &TaskType) -> String {
        let _ = task;
        self.default_model().to_string()
    }

    /// Whether the backend advertises a capability
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Whether a prompt of `size` estimated tokens fits
    fn can_handle_context(&self, size: usize) -> bool {
        size <= self.max_context_tokens()
    }

    /// Cheap reachability/auth check; never errors
    async fn validate_config(&self) -> bool;

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Per-task model table with a default
#[derive(Debug, Clone)]
pub struct ModelTable {
    default_model: String,
    by_task: &'static [(&'static str, &'static str)],
}

impl ModelTable {
    /// Create a table; `by_task` maps task-type strings to model ids
    #[must_use]
    pub fn new(
        default_model: impl Into<String>,
        by_task: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            default_model: default_model.into(),
            by_task,
        }
    }

    /// The default model
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Model for a task type, or the default for unlisted tasks
    #[must_use]
    pub fn model_for(&self, task: &TaskType) -> String {
        self.by_task
            .iter()
            .find(|(t, _)| *t == task.as_str())
            .map(|(_, m)| (*m).to_string())
            .unwrap_or_else(|| self.default_model.clone())
    }
}
