//! Anthropic - Claude API backend (`claude`)
//!
//! This module implements the hosted Claude backend using reqwest.

use super::http::{build_client, map_send_error, read_json, trim_base_url};
use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::config::{BackendConfig, DEFAULT_HOSTED_TIMEOUT_SECS};
use crate::error::{BackendErrorKind, Error, Result};
use crate::message::{Message, MessageRole};
use crate::util::{mask_api_key, resolve_api_key, validate_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Backend key
pub const BACKEND_NAME: &str = "claude";

/// Anthropic API version
const API_VERSION: &str = "2023-06-01";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Environment variables checked for the API key
const API_KEY_VARS: &[&str] = &["ANTHROPIC_API_KEY"];

/// System prompt used when the conversation carries none
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful coding assistant.";

/// Placeholder turn for an empty conversation
const EMPTY_CONVERSATION_TURN: &str = "Continue";

/// Synthesized opening turn when the conversation does not start with the user
const OPENING_USER_TURN: &str = "Please help with the following task.";

/// Context window of the Claude 3.5 family
pub const MAX_CONTEXT_TOKENS: usize = 200_000;

/// Capabilities shared by every Claude-family backend
pub const CAPABILITIES: &[Capability] = &[
    Capability::CodeUnderstanding,
    Capability::LongContext,
    Capability::Planning,
    Capability::Refactoring,
    Capability::CodeGeneration,
];

const TASK_MODELS: &[(&str, &str)] = &[
    ("planning", "claude-3-5-sonnet-20241022"),
    ("refactoring", "claude-3-5-sonnet-20241022"),
    ("specification", "claude-3-5-sonnet-20241022"),
    ("code_generation", "claude-3-5-sonnet-20241022"),
    ("review", "claude-3-5-sonnet-20241022"),
];

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Adapter Implementation
// ============================================================================

/// Anthropic backend configuration
#[derive(Clone)]
pub struct AnthropicConfig {
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
impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
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

    /// Build from a backend config slice, falling back to `ANTHROPIC_API_KEY`
    #[must_use]
    pub fn from_backend_config(config: &BackendConfig) -> Self {
        let api_key = resolve_api_key(config.api_key.as_deref(), API_KEY_VARS).unwrap_or_default();
        let mut out = Self::new(api_key);
        if let Some(url) = config.base_url() {
            out.base_url = trim_base_url(url);
        }
        if let Some(model) = config.default_model() {
            out.default_model = model.to_string();
        }
        if let Some(secs) = config.timeout_secs {
            out.timeout = Duration::from_secs(secs);
        }
        out
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(&url.into());
        self
    }
}

/// Anthropic Claude backend
pub struct AnthropicAdapter {
    client: Client,
    config: AnthropicConfig,
    models: ModelTable,
}

impl AnthropicAdapter {
    /// Create a new Anthropic adapter
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = build_client(BACKEND_NAME, config.timeout)?;
        if let Some(problem) = validate_api_key(&config.api_key, "Anthropic") {
            debug!(backend = BACKEND_NAME, "{problem}");
        }
        let models = ModelTable::new(config.default_model.clone(), TASK_MODELS);
        Ok(Self {
            client,
            config,
            models,
        })
    }

    /// Registry factory
    pub fn from_backend_config(config: &BackendConfig) -> Result<Self> {
        Self::new(AnthropicConfig::from_backend_config(config))
    }

    /// Split out system text and make sure the first turn is the user's
    fn convert_messages(messages: &[Message]) -> (String, Vec<AnthropicMessage>) {
        let mut system_parts = Vec::new();
        let mut turns = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => {
                    if !msg.content.is_empty() {
                        system_parts.push(msg.content.as_str());
                    }
                }
                MessageRole::User | MessageRole::Assistant => turns.push(AnthropicMessage {
                    role: msg.role.as_str(),
                    content: msg.content.clone(),
                }),
            }
        }

        if turns.is_empty() {
            turns.push(AnthropicMessage {
                role: "user",
                content: EMPTY_CONVERSATION_TURN.to_string(),
            });
        } else if turns[0].role != "user" {
            turns.insert(
                0,
                AnthropicMessage {
                    role: "user",
                    content: OPENING_USER_TURN.to_string(),
                },
            );
        }

        let system = if system_parts.is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            system_parts.join("\n\n")
        };

        (system, turns)
    }

    /// Send request to Anthropic API
    async fn send_request(&self, request: &AnthropicRequest) -> Result<AnthropicResponse> {
        let url = format!("{}/v1/messages", self.config.base_url);

        debug!("Sending request to Anthropic: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| map_send_error(BACKEND_NAME, &e))?;

        read_json(BACKEND_NAME, response).await
    }
}

#[async_trait::async_trait]
impl BackendAdapter for AnthropicAdapter {
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
        let (system, messages) = Self::convert_messages(&request.messages);

        let anthropic_request = AnthropicRequest {
            model: model.clone(),
            max_tokens: request.max_tokens,
            system,
            messages,
            temperature: request.temperature,
        };

        let response = self.send_request(&anthropic_request).await?;

        let content = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(Error::backend(
                BACKEND_NAME,
                BackendErrorKind::InvalidResponse,
                "response contained no text content",
            ));
        }

        Ok(CompletionResponse {
            content,
            model: response.model.unwrap_or(model),
            usage: response
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
            finish_reason: response.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer, key: &str) -> AnthropicAdapter {
        AnthropicAdapter::new(AnthropicConfig::new(key).with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_system_split_out() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant("Hi there!"),
        ];

        let (system, converted) = AnthropicAdapter::convert_messages(&messages);

        assert_eq!(system, "You are helpful");
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_empty_conversation_gets_placeholder() {
        let (system, converted) =
            AnthropicAdapter::convert_messages(&[Message::system("only rules")]);
        assert_eq!(system, "only rules");
        assert_eq!(
            converted,
            vec![AnthropicMessage {
                role: "user",
                content: "Continue".to_string()
            }]
        );
    }

    #[test]
    fn test_assistant_first_gets_user_turn() {
        let (system, converted) =
            AnthropicAdapter::convert_messages(&[Message::assistant("Here is the plan")]);
        assert_eq!(system, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[0].content, "Please help with the following task.");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = AnthropicConfig::new("sk-ant-REDACTED");
        let debug_str = format!("{:?}", config);

        assert!(!debug_str.contains("1234567890"));
        assert!(debug_str.contains("sk-a...ghij"));
    }

    #[test]
    fn test_optimal_model_falls_back() {
        let adapter = AnthropicAdapter::new(AnthropicConfig::new("sk-ant-test-key")).unwrap();
        assert_eq!(
            adapter.optimal_model_for(&TaskType::Planning),
            "claude-3-5-sonnet-20241022"
        );
        assert_eq!(
            adapter.optimal_model_for(&TaskType::from("haiku_writing")),
            DEFAULT_MODEL
        );
    }

    #[tokio::test]
    async fn test_validate_requires_key() {
        let with_key = AnthropicAdapter::new(AnthropicConfig::new("sk-ant-test-key")).unwrap();
        assert!(with_key.validate_config().await);

        let without = AnthropicAdapter::new(AnthropicConfig::new("")).unwrap();
        assert!(!without.validate_config().await);

        let err = without
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert_eq!(err.backend_kind(), Some(BackendErrorKind::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test-key"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(json!({
                "system": "You are helpful",
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "model": "claude-3-5-sonnet-20241022",
                "content": [{"type": "text", "text": "Hi!"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server, "sk-ant-test-key");
        let response = adapter
            .complete(CompletionRequest::new(vec![
                Message::system("You are helpful"),
                Message::user("Hello"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.content, "Hi!");
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(12));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_authenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server, "sk-ant-wrong-key");
        let err = adapter
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert_eq!(err.backend_kind(), Some(BackendErrorKind::NotAuthenticated));
        let msg = err.to_string();
        assert!(msg.contains("claude"));
        assert!(!msg.contains("sk-ant-wrong-key"));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = adapter_for(&server, "sk-ant-test-key")
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert_eq!(err.backend_kind(), Some(BackendErrorKind::RateLimited));
    }
}
