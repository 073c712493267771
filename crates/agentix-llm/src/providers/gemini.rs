//! Google Gemini backend (`gemini`)
//!
//! This module implements the hosted Gemini backend against the REST
//! `generateContent` endpoint using reqwest.

use super::http::{build_client, map_send_error, read_json, trim_base_url};
use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::config::{BackendConfig, DEFAULT_HOSTED_TIMEOUT_SECS};
use crate::error::{BackendErrorKind, Error, Result};
use crate::message::{Message, MessageRole};
use crate::util::{mask_api_key, resolve_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Backend key
pub const BACKEND_NAME: &str = "gemini";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for the API key, in order
const API_KEY_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Placeholder turn for an empty conversation
const EMPTY_CONVERSATION_TURN: &str = "Continue";

/// Context window of the Gemini 1.5 family
pub const MAX_CONTEXT_TOKENS: usize = 2_000_000;

/// Capabilities shared by every Gemini-family backend
pub const CAPABILITIES: &[Capability] = &[
    Capability::FastInference,
    Capability::LongContext,
    Capability::Multimodal,
    Capability::CodeGeneration,
    Capability::CodeUnderstanding,
];

const TASK_MODELS: &[(&str, &str)] = &[
    ("code_generation", "gemini-1.5-flash"),
    ("task_execution", "gemini-1.5-flash"),
    ("specification", "gemini-1.5-pro"),
    ("planning", "gemini-1.5-pro"),
    ("review", "gemini-1.5-pro"),
    ("large_context", "gemini-1.5-pro"),
];

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

// ============================================================================
// Adapter Implementation
// ============================================================================

/// Gemini backend configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key; empty means not configured
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl GeminiConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_HOSTED_TIMEOUT_SECS),
        }
    }

    /// Build from a backend config slice, falling back to `GOOGLE_API_KEY`/`GEMINI_API_KEY`
    #[must_use]
    pub fn from_backend_config(config: &BackendConfig) -> Self {
        let api_key = resolve_api_key(config.api_key.as_deref(), API_KEY_VARS).unwrap_or_default();
        Self {
            api_key,
            base_url: trim_base_url(config.base_url().unwrap_or(DEFAULT_BASE_URL)),
            default_model: config.default_model().unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_HOSTED_TIMEOUT_SECS)),
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(&url.into());
        self
    }
}

/// Google Gemini backend
pub struct GeminiAdapter {
    client: Client,
    config: GeminiConfig,
    models: ModelTable,
}

impl GeminiAdapter {
    /// Create a new Gemini adapter
    pub fn new(config: GeminiConfig) -> Result<Self> {
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
        Self::new(GeminiConfig::from_backend_config(config))
    }

    /// Convert to Gemini contents; system text becomes `systemInstruction`
    fn convert_messages(messages: &[Message]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => system_parts.push(msg.content.as_str()),
                MessageRole::User => contents.push(GeminiContent::text(Some("user"), &msg.content)),
                MessageRole::Assistant => {
                    contents.push(GeminiContent::text(Some("model"), &msg.content));
                }
            }
        }

        if contents.is_empty() {
            contents.push(GeminiContent::text(Some("user"), EMPTY_CONVERSATION_TURN));
        }

        let system = (!system_parts.is_empty())
            .then(|| GeminiContent::text(None, system_parts.join("\n\n")));

        (system, contents)
    }
}

#[async_trait::async_trait]
impl BackendAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn shape(&self) -> BackendShape {
        BackendShape::HostedApi
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
        !self.config.api_key.trim().is_empty()
    }

    #[instrument(skip(self, request), fields(backend = BACKEND_NAME))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.config.api_key.is_empty() {
            return Err(Error::backend(
                BACKEND_NAME,
                BackendErrorKind::NotAuthenticated,
                "no API key configured",
            ));
        }

        let model = request.model_or(self.default_model()).to_string();
        let (system_instruction, contents) = Self::convert_messages(&request.messages);

        let body = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);
        debug!("Sending request to Gemini: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(BACKEND_NAME, &e))?;

        let parsed: GeminiResponse = read_json(BACKEND_NAME, response).await?;

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            Error::backend(
                BACKEND_NAME,
                BackendErrorKind::InvalidResponse,
                "response contained no candidates",
            )
        })?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                Error::backend(
                    BACKEND_NAME,
                    BackendErrorKind::InvalidResponse,
                    "candidate contained no text",
                )
            })?;

        let usage = parsed.usage_metadata.map(|u| {
            TokenUsage::new(u.prompt_token_count, u.candidates_token_count.unwrap_or(0))
        });

        Ok(CompletionResponse {
            content,
            model,
            usage,
            finish_reason: candidate.finish_reason,
        })
    }
}
