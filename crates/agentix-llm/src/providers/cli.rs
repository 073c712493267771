//! CLI-authenticated backends (`claude_cli`, `gemini_cli`, `openai_cli`)
//!
//! These shell out to a vendor CLI the user has already logged in with.
//! There is no API key: the conversation is flattened into one prompt
//! string, passed as an argument, and stdout is the answer.

use super::{anthropic, gemini, openai};
use crate::adapter::{BackendAdapter, BackendShape, ModelTable};
use crate::capability::{Capability, TaskType};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::config::{BackendConfig, DEFAULT_LOCAL_TIMEOUT_SECS};
use crate::error::{BackendErrorKind, Error, Result};
use crate::message::Message;
use crate::util::sanitize_error_for_user;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Deadline for `--version` / `--help` probes
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// stderr fragments that mean the CLI is installed but not logged in
const AUTH_FAILURE_MARKERS: &[&str] = &["not logged in", "authentication", "unauthorized", "login"];

/// How the prompt is handed to the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// `<cmd> --print <prompt> --model <m>`
    Print,
    /// `<cmd> chat <prompt> --model <m>`
    ChatSubcommand,
}

/// Static description of one vendor CLI
#[derive(Debug, Clone, Copy)]
pub struct CliProfile {
    /// Backend key
    pub name: &'static str,
    /// Executable when config does not override it
    pub default_command: &'static str,
    /// Argument layout
    pub invocation: Invocation,
    /// Default model
    pub default_model: &'static str,
    /// Context window
    pub max_context_tokens: usize,
    /// Capabilities
    pub capabilities: &'static [Capability],
    /// Task type -> model
    pub task_models: &'static [(&'static str, &'static str)],
    /// Command that logs the user in
    pub login_command: &'static str,
    /// How to install the CLI
    pub install_hint: &'static str,
}

/// Claude Code CLI
pub const CLAUDE_CLI: CliProfile = CliProfile {
    name: "claude_cli",
    default_command: "claude",
    invocation: Invocation::Print,
    default_model: "claude-sonnet-4.5-20250514",
    max_context_tokens: anthropic::MAX_CONTEXT_TOKENS,
    capabilities: anthropic::CAPABILITIES,
    task_models: &[
        ("planning", "claude-opus-4.5-20250514"),
        ("refactoring", "claude-sonnet-4.5-20250514"),
        ("specification", "claude-opus-4.5-20250514"),
        ("code_generation", "claude-sonnet-4.5-20250514"),
        ("review", "claude-sonnet-4.5-20250514"),
    ],
    login_command: "claude login",
    install_hint: "npm install -g @anthropic-ai/claude-code",
};

/// Gemini CLI
pub const GEMINI_CLI: CliProfile = CliProfile {
    name: "gemini_cli",
    default_command: "gemini",
    invocation: Invocation::ChatSubcommand,
    default_model: "gemini-3.0-pro-high",
    max_context_tokens: gemini::MAX_CONTEXT_TOKENS,
    capabilities: gemini::CAPABILITIES,
    task_models: &[
        ("code_generation", "gemini-3.0-pro-low"),
        ("task_execution", "gemini-3.0-pro-low"),
        ("specification", "gemini-3.0-pro-high"),
        ("planning", "gemini-3.0-pro-high"),
        ("review", "gemini-3.0-pro-high"),
        ("large_context", "gemini-3.0-pro-high"),
    ],
    login_command: "gemini login",
    install_hint: "npm install -g @google/gemini-cli",
};

/// OpenAI / Codex CLI
pub const OPENAI_CLI: CliProfile = CliProfile {
    name: "openai_cli",
    default_command: "openai",
    invocation: Invocation::ChatSubcommand,
    default_model: openai::DEFAULT_MODEL,
    max_context_tokens: openai::MAX_CONTEXT_TOKENS,
    capabilities: openai::CAPABILITIES,
    task_models: &[
        ("code_generation", "codex-5.2-medium"),
        ("task_execution", "codex-5.2-medium"),
        ("specification", "codex-5.2-medium"),
        ("planning", "codex-5.2-medium"),
        ("review", "codex-5.2-medium"),
    ],
    login_command: "openai login",
    install_hint: "install the OpenAI CLI and put it on PATH",
};

/// Flatten a conversation into `"System: …\n\nUser: …\n\nAssistant: …"`
#[must_use]
pub fn build_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.prompt_label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Adapter that shells out to a pre-authenticated vendor CLI
pub struct CliAdapter {
    profile: CliProfile,
    command: String,
    timeout: Duration,
    models: ModelTable,
}

impl CliAdapter {
    /// Create an adapter for `profile` using its default executable
    #[must_use]
    pub fn new(profile: CliProfile) -> Self {
        Self {
            profile,
            command: profile.default_command.to_string(),
            timeout: Duration::from_secs(DEFAULT_LOCAL_TIMEOUT_SECS),
            models: ModelTable::new(profile.default_model, profile.task_models),
        }
    }

    /// Registry factory
    pub fn from_backend_config(profile: CliProfile, config: &BackendConfig) -> Result<Self> {
        let mut adapter = Self::new(profile);
        if let Some(command) = config.command() {
            adapter.command = command.to_string();
        }
        if let Some(secs) = config.timeout_secs {
            adapter.timeout = Duration::from_secs(secs);
        }
        if let Some(model) = config.default_model() {
            adapter.models = ModelTable::new(model, profile.task_models);
        }
        Ok(adapter)
    }

    /// Override the executable
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Override the completion deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for one completion
    fn completion_args(&self, prompt: String, model: &str) -> Vec<String> {
        match self.profile.invocation {
            Invocation::Print => vec![
                "--print".to_string(),
                prompt,
                "--model".to_string(),
                model.to_string(),
            ],
            Invocation::ChatSubcommand => vec![
                "chat".to_string(),
                prompt,
                "--model".to_string(),
                model.to_string(),
            ],
        }
    }

    /// Run `<cmd> <arg>` and report whether it exited 0 within the probe deadline
    async fn probe(&self, arg: &str) -> bool {
        let mut cmd = Command::new(&self.command);
        cmd.arg(arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(PROBE_TIMEOUT, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(backend = self.profile.name, command = %self.command, error = %e, "probe failed to start");
                false
            }
            Err(_) => {
                debug!(backend = self.profile.name, arg, "probe timed out");
                false
            }
        }
    }

    fn classify_failure(&self, stderr: &str, code: Option<i32>) -> Error {
        let trimmed = stderr.trim();
        let lower = trimmed.to_lowercase();
        if AUTH_FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
            return Error::backend(
                self.profile.name,
                BackendErrorKind::NotAuthenticated,
                format!("run `{}`", self.profile.login_command),
            );
        }
        let detail = if trimmed.is_empty() {
            match code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            sanitize_error_for_user(trimmed)
        };
        Error::backend(self.profile.name, BackendErrorKind::Other, detail)
    }
}

#[async_trait::async_trait]
impl BackendAdapter for CliAdapter {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn shape(&self) -> BackendShape {
        BackendShape::CliAuthenticated
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
        self.probe("--version").await && self.probe("--help").await
    }

    #[instrument(skip(self, request), fields(backend = self.profile.name))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model_or(self.default_model()).to_string();
        let prompt = build_prompt(&request.messages);

        let mut cmd = Command::new(&self.command);
        cmd.args(self.completion_args(prompt, &model))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(command = %self.command, model = %model, "running CLI backend");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::backend(
                    self.profile.name,
                    BackendErrorKind::Timeout,
                    format!("no response within {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::backend(
                        self.profile.name,
                        BackendErrorKind::Unreachable,
                        format!("`{}` not found; {}", self.command, self.profile.install_hint),
                    )
                } else {
                    Error::backend(
                        self.profile.name,
                        BackendErrorKind::Other,
                        sanitize_error_for_user(&e.to_string()),
                    )
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classify_failure(&stderr, output.status.code()));
        }

        Ok(CompletionResponse::text(
            String::from_utf8_lossy(&output.stdout).trim(),
            model,
        ))
    }
}
