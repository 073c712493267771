//! Local OpenAI-compatible backends (`local_openai`, `local_claude`, `local_gemini`)
//!
//! Each vendor's local bridge speaks the same `/v1/chat/completions`
//! protocol without an API key. A [`LocalProfile`] carries the per-vendor
//! defaults; one adapter type serves all three.

use super::http::{build_client, probe_status, trim_base_url};
use super::openai_compat::ChatClient;
use super::{anthropic, gemini, openai};
use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::config::{BackendConfig, DEFAULT_LOCAL_TIMEOUT_SECS};
use crate::error::Result;
use std::time::Duration;
use tracing::{instrument, warn};

/// Static description of one local bridge
#[derive(Debug, Clone, Copy)]
pub struct LocalProfile {
    /// Backend key
    pub name: &'static str,
    /// Base URL when neither config nor env var sets one
    pub default_base_url: &'static str,
    /// Environment variable overriding the base URL
    pub base_url_env: &'static str,
    /// Default model
    pub default_model: &'static str,
    /// Context window
    pub max_context_tokens: usize,
    /// Capabilities
    pub capabilities: &'static [Capability],
    /// Task type -> model
    pub task_models: &'static [(&'static str, &'static str)],
    /// Models reported when `/v1/models` cannot be reached
    pub suggested_models: &'static [&'static str],
}

/// Local OpenAI / Codex bridge
pub const LOCAL_OPENAI: LocalProfile = LocalProfile {
    name: "local_openai",
    default_base_url: "http://localhost:3002",
    base_url_env: "OPENAI_LOCAL_URL",
    default_model: "gpt-4-turbo",
    max_context_tokens: openai::MAX_CONTEXT_TOKENS,
    capabilities: openai::CAPABILITIES,
    task_models: &[
        ("code_generation", "gpt-4-turbo"),
        ("task_execution", "gpt-4-turbo"),
        ("specification", "gpt-4-turbo"),
        ("planning", "gpt-4-turbo"),
        ("review", "gpt-4-turbo"),
    ],
    suggested_models: &["gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"],
};

/// Local Claude bridge
pub const LOCAL_CLAUDE: LocalProfile = LocalProfile {
    name: "local_claude",
    default_base_url: "http://localhost:3000",
    base_url_env: "CLAUDE_LOCAL_URL",
    default_model: anthropic::DEFAULT_MODEL,
    max_context_tokens: anthropic::MAX_CONTEXT_TOKENS,
    capabilities: anthropic::CAPABILITIES,
    task_models: &[
        ("planning", "claude-3-5-sonnet-20241022"),
        ("refactoring", "claude-3-5-sonnet-20241022"),
        ("specification", "claude-3-5-sonnet-20241022"),
        ("code_generation", "claude-3-5-sonnet-20241022"),
        ("review", "claude-3-5-sonnet-20241022"),
    ],
    suggested_models: &["claude-3-5-sonnet-20241022"],
};

/// Local Gemini bridge
pub const LOCAL_GEMINI: LocalProfile = LocalProfile {
    name: "local_gemini",
    default_base_url: "http://localhost:3001",
    base_url_env: "GEMINI_LOCAL_URL",
    default_model: gemini::DEFAULT_MODEL,
    max_context_tokens: gemini::MAX_CONTEXT_TOKENS,
    capabilities: gemini::CAPABILITIES,
    task_models: &[
        ("code_generation", "gemini-1.5-flash"),
        ("task_execution", "gemini-1.5-flash"),
        ("specification", "gemini-1.5-pro"),
        ("planning", "gemini-1.5-pro"),
        ("review", "gemini-1.5-pro"),
        ("large_context", "gemini-1.5-pro"),
    ],
    suggested_models: &["gemini-1.5-flash", "gemini-1.5-pro"],
};

/// Adapter for a local OpenAI-compatible bridge
pub struct LocalHttpAdapter {
    profile: LocalProfile,
    base_url: String,
    chat: ChatClient,
    models: ModelTable,
}

impl LocalHttpAdapter {
    /// Create an adapter for `profile` at `base_url`
    pub fn new(profile: LocalProfile, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = trim_base_url(base_url);
        let client = build_client(profile.name, timeout)?;
        let chat = ChatClient::new(
            profile.name,
            client,
            format!("{}/v1/chat/completions", base_url),
        );
        Ok(Self {
            profile,
            base_url,
            chat,
            models: ModelTable::new(profile.default_model, profile.task_models),
        })
    }

    /// Registry factory: config `base_url`, then the profile's env var, then its default
    pub fn from_backend_config(profile: LocalProfile, config: &BackendConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .map(str::to_string)
            .or_else(|| {
                std::env::var(profile.base_url_env)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| profile.default_base_url.to_string());
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_LOCAL_TIMEOUT_SECS));

        let mut adapter = Self::new(profile, &base_url, timeout)?;
        if let Some(model) = config.default_model() {
            adapter.models = ModelTable::new(model, profile.task_models);
        }
        Ok(adapter)
    }

    /// Base URL this adapter talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List models served by the bridge
    ///
    /// Falls back to the profile's suggestions when `/v1/models` fails.
    pub async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/v1/models", self.base_url);
        match self.chat.list_models(&url).await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => self.suggested_models(),
            Err(e) => {
                warn!(backend = self.profile.name, error = %e, "could not list models");
                self.suggested_models()
            }
        }
    }

    fn suggested_models(&self) -> Vec<String> {
        self.profile
            .suggested_models
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl BackendAdapter for LocalHttpAdapter {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn shape(&self) -> BackendShape {
        BackendShape::LocalHttp
    }

    fn capabilities(&self) -> &[Capability] {
        self.profile.capabilities
    }

    fn max_context_tokens(&self) -> usize {
        self.profile.max_context_tokens
    }

    fn default_model(&self) -> &str {
        self.models.default_model()
    }

    fn optimal_model_for(&self, task: &TaskType) -> String {
        self.models.model_for(task)
    }

    async fn validate_config(&self) -> bool {
        let health = format!("{}/health", self.base_url);
        if probe_status(self.chat.http(), &health).await == Some(200) {
            return true;
        }
        let models = format!("{}/v1/models", self.base_url);
        matches!(probe_status(self.chat.http(), &models).await, Some(200 | 401))
    }

    #[instrument(skip(self, request), fields(backend = self.profile.name))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model_or(self.default_model()).to_string();
        self.chat.chat(&request, &model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendErrorKind;
    use crate::message::Message;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(profile: LocalProfile, uri: &str) -> LocalHttpAdapter {
        LocalHttpAdapter::new(profile, uri, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_profiles_follow_hosted_family() {
        let claude = adapter(LOCAL_CLAUDE, "http://localhost:3000");
        assert_eq!(claude.name(), "local_claude");
        assert_eq!(claude.max_context_tokens(), 200_000);
        assert!(claude.supports(Capability::Planning));

        let gemini = adapter(LOCAL_GEMINI, "http://localhost:3001/");
        assert_eq!(gemini.base_url(), "http://localhost:3001");
        assert_eq!(gemini.optimal_model_for(&TaskType::LargeContext), "gemini-1.5-pro");
        assert_eq!(gemini.shape(), BackendShape::LocalHttp);
    }

    #[tokio::test]
    async fn test_validate_prefers_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        assert!(adapter(LOCAL_OPENAI, &server.uri()).validate_config().await);
    }

    #[tokio::test]
    async fn test_validate_accepts_unauthorized_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        assert!(adapter(LOCAL_OPENAI, &server.uri()).validate_config().await);
    }

    #[tokio::test]
    async fn test_validate_rejects_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        assert!(!adapter(LOCAL_OPENAI, &server.uri()).validate_config().await);
    }

    #[tokio::test]
    async fn test_complete_against_bridge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "claude-3-5-sonnet-20241022",
                "messages": [{"role": "user", "content": "review this"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "LGTM"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = adapter(LOCAL_CLAUDE, &server.uri())
            .complete(CompletionRequest::new(vec![Message::user("review this")]))
            .await
            .unwrap();
        assert_eq!(response.content, "LGTM");
        assert_eq!(response.model, "claude-3-5-sonnet-20241022");
    }

    #[tokio::test]
    async fn test_malformed_response_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = adapter(LOCAL_GEMINI, &server.uri())
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert_eq!(err.backend_kind(), Some(BackendErrorKind::InvalidResponse));
        assert!(err.to_string().contains("local_gemini"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "gpt-4o"}, {"id": "gpt-4-turbo"}]
            })))
            .mount(&server)
            .await;
        let models = adapter(LOCAL_OPENAI, &server.uri()).list_models().await;
        assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-4-turbo".to_string()]);

        let models = adapter(LOCAL_OPENAI, "http://127.0.0.1:9").list_models().await;
        assert!(models.contains(&"gpt-4-turbo".to_string()));
    }
}
