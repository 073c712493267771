//! Router request and response types

use crate::adapter::{BackendAdapter, BackendShape};
use crate::capability::{Capability, TaskType};
use crate::completion::{TokenUsage, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::message::Message;
use serde::{Deserialize, Serialize};

/// A request to route and complete
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Conversation to send
    pub messages: Vec<Message>,
    /// Kind of request, used to pick a backend
    pub task_type: TaskType,
    /// Explicit model; otherwise the chosen backend's optimal model
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Backend to try first
    pub preferred_backend: Option<String>,
    /// Capabilities the chosen backend must have
    pub required_capabilities: Vec<Capability>,
    /// Fold the request through the shared context window
    pub use_shared_context: bool,
}

impl RouteRequest {
    /// Create a request with default sampling settings
    #[must_use]
    pub fn new(messages: Vec<Message>, task_type: impl Into<TaskType>) -> Self {
        Self {
            messages,
            task_type: task_type.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            preferred_backend: None,
            required_capabilities: Vec::new(),
            use_shared_context: false,
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Prefer a backend
    #[must_use]
    pub fn prefer(mut self, backend: impl Into<String>) -> Self {
        self.preferred_backend = Some(backend.into());
        self
    }

    /// Require a capability
    #[must_use]
    pub fn require(mut self, capability: Capability) -> Self {
        if !self.required_capabilities.contains(&capability) {
            self.required_capabilities.push(capability);
        }
        self
    }

    /// Read and write the shared context window
    #[must_use]
    pub fn with_shared_context(mut self, enabled: bool) -> Self {
        self.use_shared_context = enabled;
        self
    }
}

/// Result of a routed completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedCompletion {
    /// Generated text
    pub content: String,
    /// Backend that served the request
    pub backend: String,
    /// Model that served the request
    pub model: String,
    /// Token usage, when the backend reports it
    pub usage: Option<TokenUsage>,
}

/// Static description of an active backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    /// Backend key
    pub name: String,
    /// How the backend is reached
    pub shape: BackendShape,
    /// Default model
    pub default_model: String,
    /// Context window
    pub max_context_tokens: usize,
    /// Capabilities
    pub capabilities: Vec<Capability>,
}

impl BackendInfo {
    /// Describe an adapter
    #[must_use]
    pub fn from_adapter(adapter: &dyn BackendAdapter) -> Self {
        Self {
            name: adapter.name().to_string(),
            shape: adapter.shape(),
            default_model: adapter.default_model().to_string(),
            max_context_tokens: adapter.max_context_tokens(),
            capabilities: adapter.capabilities().to_vec(),
        }
    }
}
