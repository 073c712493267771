//! Ollama - local inference backend (`ollama`)
//!
//! Talks to a local Ollama daemon over its native `/api/chat` endpoint.

use super::http::{build_client, map_send_error, probe_status, read_json, trim_base_url};
use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::config::{BackendConfig, DEFAULT_LOCAL_TIMEOUT_SECS};
use crate::error::{BackendErrorKind, Error, Result};
use crate::message::Message;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Backend key
pub const BACKEND_NAME: &str = "ollama";

/// Default Ollama model
pub const DEFAULT_MODEL: &str = "codellama";

/// Default Ollama API URL
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Most Ollama models support 4K-8K, some up to 32K
pub const MAX_CONTEXT_TOKENS: usize = 32_000;

/// Suggested models when the daemon cannot be asked
pub const SUGGESTED_MODELS: &[&str] = &[
    "codellama",
    "codellama:7b",
    "codellama:13b",
    "llama2:13b",
    "mistral:latest",
];

/// Capabilities
pub const CAPABILITIES: &[Capability] = &[
    Capability::CodeGeneration,
    Capability::CodeUnderstanding,
    Capability::FastInference,
    Capability::Planning,
];

const TASK_MODELS: &[(&str, &str)] = &[
    ("code_generation", "codellama:13b"),
    ("specification", "llama2:13b"),
    ("planning", "mistral:latest"),
    ("task_execution", "codellama:7b"),
    ("review", "codellama:13b"),
    ("fast_iteration", "codellama:7b"),
];

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelInfo>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelInfo {
    name: String,
}

// ============================================================================
// Adapter Implementation
// ============================================================================

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Request timeout (longer for local inference)
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LOCAL_TIMEOUT_SECS),
        }
    }
}

impl OllamaConfig {
    /// Build from a backend config slice, falling back to `OLLAMA_HOST`
    #[must_use]
    pub fn from_backend_config(config: &BackendConfig) -> Self {
        let base_url = config
            .base_url()
            .map(str::to_string)
            .or_else(|| std::env::var("OLLAMA_HOST").ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            base_url: trim_base_url(&base_url),
            default_model: config.default_model().unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_LOCAL_TIMEOUT_SECS)),
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(&url.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Ollama local backend
pub struct OllamaAdapter {
    client: Client,
    config: OllamaConfig,
    models: ModelTable,
}

impl OllamaAdapter {
    /// Create a new Ollama adapter
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = build_client(BACKEND_NAME, config.timeout)?;
        let models = ModelTable::new(config.default_model.clone(), TASK_MODELS);
        Ok(Self {
            client,
            config,
            models,
        })
    }

    /// Registry factory
    pub fn from_backend_config(config: &BackendConfig) -> Result<Self> {
        Self::new(OllamaConfig::from_backend_config(config))
    }

    /// List models pulled into the local daemon
    ///
    /// Falls back to [`SUGGESTED_MODELS`] when the daemon cannot be reached.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(models) => models,
            Err(e) => {
                warn!(backend = BACKEND_NAME, error = %e, "could not list models");
                SUGGESTED_MODELS.iter().map(|s| (*s).to_string()).collect()
            }
        }
    }

    async fn fetch_tags(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_send_error(BACKEND_NAME, &e))?;
        let tags: OllamaTagsResponse = read_json(BACKEND_NAME, response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait::async_trait]
impl BackendAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn shape(&self) -> BackendShape {
        BackendShape::LocalHttp
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    fn max_context_tokens(&self) -> usize {
        MAX_CONTEXT_TOKENS
    }

    fn default_model(&self) -> &str {
        self.models.default_model()
    }

    fn optimal_model_for(&self, task: &TaskType) -> String {
        self.models.model_for(task)
    }

    async fn validate_config(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        probe_status(&self.client, &url).await == Some(200)
    }

    #[instrument(skip(self, request), fields(backend = BACKEND_NAME))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model_or(self.default_model()).to_string();
        let body = OllamaChatRequest {
            model: &model,
            messages: &request.messages,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        };

        let url = format!("{}/api/chat", self.config.base_url);
        debug!("Sending request to Ollama: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(BACKEND_NAME, &e))?;

        let parsed: OllamaChatResponse = read_json(BACKEND_NAME, response).await?;

        let content = parsed
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| {
                Error::backend(
                    BACKEND_NAME,
                    BackendErrorKind::InvalidResponse,
                    "response had no message content",
                )
            })?;

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage::new(
                prompt.unwrap_or(0),
                completion.unwrap_or(0),
            )),
        };

        Ok(CompletionResponse {
            content,
            model: parsed.model.unwrap_or(model),
            usage,
            finish_reason: parsed.done_reason,
        })
    }
}
