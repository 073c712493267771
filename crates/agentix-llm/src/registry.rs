//! Backend registry
//!
//! Maps a backend key to the function that builds its adapter from a config
//! slice, plus the remediation shown when nothing could be loaded. The
//! router walks the registry in insertion order.

use crate::adapter::{BackendAdapter, BackendShape};
use crate::config::BackendConfig;
use crate::error::Result;
use crate::providers::{
    AnthropicAdapter, CliAdapter, GeminiAdapter, LocalHttpAdapter, OllamaAdapter, OpenAiAdapter,
    OpenRouterAdapter, CLAUDE_CLI, GEMINI_CLI, LOCAL_CLAUDE, LOCAL_GEMINI, LOCAL_OPENAI,
    OPENAI_CLI,
};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Builds an adapter from its configuration slice
pub type BackendFactory =
    Arc<dyn Fn(&BackendConfig) -> Result<Arc<dyn BackendAdapter>> + Send + Sync>;

/// One registered backend
#[derive(Clone)]
pub struct BackendEntry {
    /// Backend key
    pub key: String,
    /// How the backend is reached
    pub shape: BackendShape,
    /// Adapter constructor
    pub factory: BackendFactory,
    /// What the user should do to make this backend available
    pub remediation: String,
}

impl fmt::Debug for BackendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendEntry")
            .field("key", &self.key)
            .field("shape", &self.shape)
            .field("remediation", &self.remediation)
            .finish_non_exhaustive()
    }
}

/// Ordered backend-key -> constructor table
#[derive(Clone, Default)]
pub struct BackendRegistry {
    entries: IndexMap<String, BackendEntry>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.values()).finish()
    }
}

impl BackendRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            "claude",
            BackendShape::HostedApi,
            "set ANTHROPIC_API_KEY or providers.claude.api_key",
            |c| Ok(Arc::new(AnthropicAdapter::from_backend_config(c)?)),
        );
        registry.register(
            "openai",
            BackendShape::HostedApi,
            "set OPENAI_API_KEY or providers.openai.api_key",
            |c| Ok(Arc::new(OpenAiAdapter::from_backend_config(c)?)),
        );
        registry.register(
            "gemini",
            BackendShape::HostedApi,
            "set GOOGLE_API_KEY (or GEMINI_API_KEY) or providers.gemini.api_key",
            |c| Ok(Arc::new(GeminiAdapter::from_backend_config(c)?)),
        );
        registry.register(
            "openrouter",
            BackendShape::HostedApi,
            "set OPENROUTER_API_KEY or providers.openrouter.api_key",
            |c| Ok(Arc::new(OpenRouterAdapter::from_backend_config(c)?)),
        );
        registry.register(
            "claude_cli",
            BackendShape::CliAuthenticated,
            "install the Claude CLI and run `claude login`",
            |c| Ok(Arc::new(CliAdapter::from_backend_config(CLAUDE_CLI, c)?)),
        );
        registry.register(
            "gemini_cli",
            BackendShape::CliAuthenticated,
            "install the Gemini CLI and run `gemini login`",
            |c| Ok(Arc::new(CliAdapter::from_backend_config(GEMINI_CLI, c)?)),
        );
        registry.register(
            "openai_cli",
            BackendShape::CliAuthenticated,
            "install the OpenAI CLI and run `openai login`",
            |c| Ok(Arc::new(CliAdapter::from_backend_config(OPENAI_CLI, c)?)),
        );
        registry.register(
            "ollama",
            BackendShape::LocalHttp,
            "start Ollama (`ollama serve`) or set providers.ollama.base_url / OLLAMA_HOST",
            |c| Ok(Arc::new(OllamaAdapter::from_backend_config(c)?)),
        );
        registry.register(
            "local_openai",
            BackendShape::LocalHttp,
            "start the local OpenAI/Codex bridge or set providers.local_openai.base_url / OPENAI_LOCAL_URL",
            |c| Ok(Arc::new(LocalHttpAdapter::from_backend_config(LOCAL_OPENAI, c)?)),
        );
        registry.register(
            "local_claude",
            BackendShape::LocalHttp,
            "start the local Claude bridge or set providers.local_claude.base_url / CLAUDE_LOCAL_URL",
            |c| Ok(Arc::new(LocalHttpAdapter::from_backend_config(LOCAL_CLAUDE, c)?)),
        );
        registry.register(
            "local_gemini",
            BackendShape::LocalHttp,
            "start the local Gemini bridge or set providers.local_gemini.base_url / GEMINI_LOCAL_URL",
            |c| Ok(Arc::new(LocalHttpAdapter::from_backend_config(LOCAL_GEMINI, c)?)),
        );

        registry
    }

    /// Add or replace a backend
    ///
    /// Replacing keeps the key's original position.
    pub fn register<F>(
        &mut self,
        key: impl Into<String>,
        shape: BackendShape,
        remediation: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(&BackendConfig) -> Result<Arc<dyn BackendAdapter>> + Send + Sync + 'static,
    {
        let key = key.into();
        self.entries.insert(
            key.clone(),
            BackendEntry {
                key,
                shape,
                factory: Arc::new(factory),
                remediation: remediation.into(),
            },
        );
        self
    }

    /// Look up a backend
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BackendEntry> {
        self.entries.get(key)
    }

    /// Registered entries, in order
    pub fn entries(&self) -> impl Iterator<Item = &BackendEntry> {
        self.entries.values()
    }

    /// Registered keys, in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends_in_order() {
        let registry = BackendRegistry::builtin();
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(
            keys,
            vec![
                "claude",
                "openai",
                "gemini",
                "openrouter",
                "claude_cli",
                "gemini_cli",
                "openai_cli",
                "ollama",
                "local_openai",
                "local_claude",
                "local_gemini",
            ]
        );
        assert_eq!(
            registry.get("ollama").map(|e| e.shape),
            Some(BackendShape::LocalHttp)
        );
    }

    #[test]
    fn test_factories_build_named_adapters() {
        let registry = BackendRegistry::builtin();
        let config = BackendConfig::enabled();
        for entry in registry.entries() {
            let adapter = (entry.factory)(&config).unwrap();
            assert_eq!(adapter.name(), entry.key);
            assert_eq!(adapter.shape(), entry.shape);
        }
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = BackendRegistry::builtin();
        registry.register("openai", BackendShape::LocalHttp, "custom", |c| {
            Ok(Arc::new(OllamaAdapter::from_backend_config(c)?))
        });
        assert_eq!(registry.len(), 11);
        assert_eq!(registry.keys().nth(1), Some("openai"));
        assert_eq!(registry.get("openai").map(|e| e.remediation.as_str()), Some("custom"));
    }
}
