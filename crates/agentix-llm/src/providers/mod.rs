//! Concrete backend adapters
//!
//! - Hosted API: [`anthropic`] (`claude`), [`openai`], [`gemini`], [`openrouter`]
//! - CLI-authenticated: [`cli`] (`claude_cli`, `gemini_cli`, `openai_cli`)
//! - Local HTTP: [`ollama`], [`local`] (`local_openai`, `local_claude`, `local_gemini`)

mod http;
mod openai_compat;

pub mod anthropic;
pub mod cli;
pub mod gemini;
pub mod local;
pub mod ollama;
pub mod openai;
pub mod openrouter;

pub use anthropic::{AnthropicAdapter, AnthropicConfig};
pub use cli::{CliAdapter, CliProfile, Invocation, CLAUDE_CLI, GEMINI_CLI, OPENAI_CLI};
pub use gemini::{GeminiAdapter, GeminiConfig};
pub use local::{LocalHttpAdapter, LocalProfile, LOCAL_CLAUDE, LOCAL_GEMINI, LOCAL_OPENAI};
pub use ollama::{OllamaAdapter, OllamaConfig};
pub use openai::{OpenAiAdapter, OpenAiConfig};
pub use openrouter::{OpenRouterAdapter, OpenRouterConfig};
