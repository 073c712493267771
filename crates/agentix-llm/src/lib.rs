//! Agentix LLM - backend routing and shared context
//!
//! This crate provides the backend layer for Agentix:
//! - Adapter: one uniform contract over every AI backend
//! - Providers: hosted APIs (Claude, OpenAI, Gemini, OpenRouter),
//!   pre-authenticated CLIs, and local HTTP bridges (Ollama and friends)
//! - Registry: backend key -> adapter constructor
//! - Router: capability-aware backend selection with task-type preferences
//! - Context: a token-bounded window several backends contribute to

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod capability;
pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod providers;
pub mod registry;
pub mod router;
pub mod token;
pub mod util;

pub use adapter::{BackendAdapter, BackendShape, ModelTable};
pub use capability::{Capability, TaskType};
pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use config::{BackendConfig, ContextConfig, RouterConfig, RoutingConfig};
pub use context::{
    BackendContribution, ContextMessage, ContextSummary, MessageFormat, ProjectedMessage,
    SharedContextWindow, SnapshotMetadata, WindowSnapshot,
};
pub use error::{BackendErrorKind, Error, Result};
pub use message::{Message, MessageRole};
pub use registry::{BackendEntry, BackendFactory, BackendRegistry};
pub use router::{
    BackendInfo, MockAdapter, ProviderRouter, RouteRequest, RoutedCompletion, SharedContext,
    TaskPreferences,
};
pub use token::{estimate_message_tokens, estimate_tokens};

// Re-export adapter types
pub use providers::{
    AnthropicAdapter, AnthropicConfig, CliAdapter, CliProfile, GeminiAdapter, GeminiConfig,
    LocalHttpAdapter, LocalProfile, OllamaAdapter, OllamaConfig, OpenAiAdapter, OpenAiConfig,
    OpenRouterAdapter, OpenRouterConfig,
};
