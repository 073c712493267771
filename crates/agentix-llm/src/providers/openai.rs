//! OpenAI - hosted chat completions backend (`openai`)
//!
//! This module implements the hosted OpenAI backend using async-openai.

use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::config::{BackendConfig, DEFAULT_HOSTED_TIMEOUT_SECS};
use crate::error::{BackendErrorKind, Error, Result};
use crate::message::{Message, MessageRole};
use crate::util::{mask_api_key, resolve_api_key, sanitize_error_for_user};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Backend key
pub const BACKEND_NAME: &str = "openai";

/// Default model
pub const DEFAULT_MODEL: &str = "codex-5.2-medium";

/// Environment variables checked for the API key
const API_KEY_VARS: &[&str] = &["OPENAI_API_KEY"];

/// Context window
pub const MAX_CONTEXT_TOKENS: usize = 128_000;

/// Capabilities shared by every OpenAI-family backend
pub const CAPABILITIES: &[Capability] = &[
    Capability::CodeGeneration,
    Capability::FastInference,
    Capability::FunctionCalling,
    Capability::CodeUnderstanding,
];

const TASK_MODELS: &[(&str, &str)] = &[
    ("code_generation", "codex-5.2-medium"),
    ("task_execution", "codex-5.2-medium"),
    ("specification", "codex-5.2-medium"),
    ("planning", "codex-5.2-medium"),
    ("review", "codex-5.2-medium"),
];

/// Classify an async-openai error by its rendered text
fn classify_error(message: &str) -> BackendErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("incorrect api key")
        || lower.contains("invalid_api_key")
        || lower.contains("unauthorized")
        || lower.contains("401")
    {
        BackendErrorKind::NotAuthenticated
    } else if lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("429") {
        BackendErrorKind::RateLimited
    } else if lower.contains("timed out") || lower.contains("timeout") {
        BackendErrorKind::Timeout
    } else if lower.contains("error sending request") || lower.contains("connect") {
        BackendErrorKind::Unreachable
    } else if lower.contains("deserialize") {
        BackendErrorKind::InvalidResponse
    } else {
        BackendErrorKind::Other
    }
}

/// OpenAI backend configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key; empty means not configured
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_HOSTED_TIMEOUT_SECS),
        }
    }

    /// Build from a backend config slice, falling back to `OPENAI_API_KEY`
    #[must_use]
    pub fn from_backend_config(config: &BackendConfig) -> Self {
        let api_key = resolve_api_key(config.api_key.as_deref(), API_KEY_VARS).unwrap_or_default();
        Self {
            api_key,
            base_url: config.base_url().map(str::to_string),
            default_model: config.default_model().unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_HOSTED_TIMEOUT_SECS)),
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI chat completions backend
pub struct OpenAiAdapter {
    client: Client<OpenAIConfig>,
    api_key_present: bool,
    timeout: Duration,
    models: ModelTable,
}

impl OpenAiAdapter {
    /// Creates a new adapter with the given configuration
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            api_key_present: !config.api_key.trim().is_empty(),
            timeout: config.timeout,
            models: ModelTable::new(config.default_model, TASK_MODELS),
        }
    }

    /// Registry factory
    pub fn from_backend_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(OpenAiConfig::from_backend_config(config)))
    }

    fn convert_message(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            MessageRole::User => ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            MessageRole::Assistant =>
            {
                #[allow(deprecated)]
                ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    function_call: None,
                    refusal: None,
                    audio: None,
                }
                .into()
            }
        }
    }
}

#[async_trait::async_trait]
impl BackendAdapter for OpenAiAdapter {
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
        self.api_key_present
    }

    #[instrument(skip(self, request), fields(backend = BACKEND_NAME))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if !self.api_key_present {
            return Err(Error::backend(
                BACKEND_NAME,
                BackendErrorKind::NotAuthenticated,
                "no API key configured",
            ));
        }

        let model = request.model_or(self.default_model()).to_string();

        let openai_request = CreateChatCompletionRequest {
            model: model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_completion_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            ..Default::default()
        };

        debug!("Sending request to OpenAI");

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(openai_request))
            .await
            .map_err(|_| {
                Error::backend(
                    BACKEND_NAME,
                    BackendErrorKind::Timeout,
                    format!("no response within {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e: async_openai::error::OpenAIError| {
                let text = e.to_string();
                Error::backend(BACKEND_NAME, classify_error(&text), sanitize_error_for_user(&text))
            })?;

        let choice = response.choices.first().ok_or_else(|| {
            Error::backend(
                BACKEND_NAME,
                BackendErrorKind::InvalidResponse,
                "response contained no choices",
            )
        })?;

        let content = choice.message.content.clone().ok_or_else(|| {
            Error::backend(
                BACKEND_NAME,
                BackendErrorKind::InvalidResponse,
                "response choice had no message content",
            )
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        Ok(CompletionResponse {
            content,
            model: response.model.clone(),
            usage,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
        })
    }
}
