//! OpenRouter backend (`openrouter`)
//!
//! OpenRouter fronts many vendors behind an OpenAI-compatible API, so this
//! adapter is a thin layer over [`ChatClient`](super::openai_compat).

use super::http::{build_client, trim_base_url};
use super::openai_compat::ChatClient;
use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::config::{BackendConfig, DEFAULT_HOSTED_TIMEOUT_SECS};
use crate::error::{BackendErrorKind, Error, Result};
use crate::util::{mask_api_key, resolve_api_key};
use reqwest::header::{HeaderMap, HeaderValue};
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Backend key
pub const BACKEND_NAME: &str = "openrouter";

/// Default model
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Attribution defaults sent as `HTTP-Referer` / `X-Title`
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_SITE_NAME: &str = "Agentix";

/// Conservative context window; the real limit depends on the routed model
pub const MAX_CONTEXT_TOKENS: usize = 128_000;

/// Capabilities
pub const CAPABILITIES: &[Capability] = &[
    Capability::CodeGeneration,
    Capability::CodeUnderstanding,
    Capability::Planning,
    Capability::FastInference,
    Capability::LongContext,
];

const TASK_MODELS: &[(&str, &str)] = &[
    ("specification", "anthropic/claude-3.5-sonnet"),
    ("planning", "anthropic/claude-3.5-sonnet"),
    ("code_generation", "openai/gpt-4-turbo"),
    ("task_execution", "google/gemini-pro-1.5"),
    ("refactoring", "anthropic/claude-3.5-sonnet"),
    ("review", "anthropic/claude-3.5-sonnet"),
    ("fast_iteration", "google/gemini-flash-1.5"),
    ("large_context", "google/gemini-pro-1.5"),
];

/// OpenRouter backend configuration
#[derive(Clone)]
pub struct OpenRouterConfig {
    /// API key; empty means not configured
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Sent as `HTTP-Referer`
    pub site_url: String,
    /// Sent as `X-Title`
    pub site_name: String,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("site_url", &self.site_url)
            .field("site_name", &self.site_name)
            .finish()
    }
}

impl OpenRouterConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_HOSTED_TIMEOUT_SECS),
        }
    }

    /// Build from a backend config slice, falling back to `OPENROUTER_*` env vars
    #[must_use]
    pub fn from_backend_config(config: &BackendConfig) -> Self {
        let api_key =
            resolve_api_key(config.api_key.as_deref(), &["OPENROUTER_API_KEY"]).unwrap_or_default();
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
        if let Ok(site_url) = std::env::var("OPENROUTER_SITE_URL") {
            out.site_url = site_url;
        }
        if let Ok(site_name) = std::env::var("OPENROUTER_SITE_NAME") {
            out.site_name = site_name;
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

/// OpenRouter backend
pub struct OpenRouterAdapter {
    chat: ChatClient,
    api_key_present: bool,
    models: ModelTable,
}

impl OpenRouterAdapter {
    /// Create a new OpenRouter adapter
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        let client = build_client(BACKEND_NAME, config.timeout)?;

        let mut headers = HeaderMap::new();
        for (name, value) in [("http-referer", &config.site_url), ("x-title", &config.site_name)] {
            let value = HeaderValue::from_str(value).map_err(|e| Error::BackendInit {
                backend: BACKEND_NAME.to_string(),
                reason: format!("invalid {name} header: {e}"),
            })?;
            headers.insert(name, value);
        }

        let chat = ChatClient::new(
            BACKEND_NAME,
            client,
            format!("{}/chat/completions", config.base_url),
        )
        .with_bearer(config.api_key.clone())
        .with_headers(headers);

        Ok(Self {
            chat,
            api_key_present: !config.api_key.trim().is_empty(),
            models: ModelTable::new(config.default_model, TASK_MODELS),
        })
    }

    /// Registry factory
    pub fn from_backend_config(config: &BackendConfig) -> Result<Self> {
        Self::new(OpenRouterConfig::from_backend_config(config))
    }
}

#[async_trait::async_trait]
impl BackendAdapter for OpenRouterAdapter {
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
        self.chat.chat(&request, &model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sends_attribution_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer or-test-key"))
            .and(header("http-referer", DEFAULT_SITE_URL))
            .and(header("x-title", DEFAULT_SITE_NAME))
            .and(body_partial_json(json!({"model": "openai/gpt-4-turbo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "openai/gpt-4-turbo",
                "choices": [{"message": {"role": "assistant", "content": "done"}, "finish_reason": "stop"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter =
            OpenRouterAdapter::new(OpenRouterConfig::new("or-test-key").with_base_url(server.uri()))
                .unwrap();
        let model = adapter.optimal_model_for(&TaskType::CodeGeneration);
        let response = adapter
            .complete(CompletionRequest::new(vec![Message::user("go")]).with_model(model))
            .await
            .unwrap();
        assert_eq!(response.content, "done");
    }

    #[tokio::test]
    async fn test_validate_requires_key() {
        let adapter = OpenRouterAdapter::new(OpenRouterConfig::new("")).unwrap();
        assert!(!adapter.validate_config().await);
    }
}
