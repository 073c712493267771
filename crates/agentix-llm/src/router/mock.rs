//! Mock backend adapter for testing
//!
//! Answers with a canned reply or a canned error and records every request
//! it receives.

use crate::adapter::{BackendAdapter, BackendShape};
use crate::capability::Capability;
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{BackendErrorKind, Error, Result};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Outcome {
    Reply(String),
    Fail(BackendErrorKind, String),
}

/// A configurable in-memory backend
#[derive(Debug)]
pub struct MockAdapter {
    name: String,
    capabilities: Vec<Capability>,
    max_context_tokens: usize,
    default_model: String,
    valid: bool,
    outcome: Outcome,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl MockAdapter {
    /// A valid backend with every capability and a 100k context
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            outcome: Outcome::Reply(format!("mock response from {name}")),
            name,
            capabilities: Capability::ALL.to_vec(),
            max_context_tokens: 100_000,
            default_model: "mock-model".to_string(),
            valid: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set capabilities
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    /// Set the context window
    #[must_use]
    pub fn with_max_context_tokens(mut self, max: usize) -> Self {
        self.max_context_tokens = max;
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Fail `validate_config`
    #[must_use]
    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Answer every request with `reply`
    #[must_use]
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.outcome = Outcome::Reply(reply.into());
        self
    }

    /// Fail every request
    #[must_use]
    pub fn with_error(mut self, kind: BackendErrorKind, detail: impl Into<String>) -> Self {
        self.outcome = Outcome::Fail(kind, detail.into());
        self
    }

    /// Requests received so far
    #[must_use]
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of requests received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl BackendAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> BackendShape {
        BackendShape::LocalHttp
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn validate_config(&self) -> bool {
        self.valid
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model_or(&self.default_model).to_string();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        match &self.outcome {
            Outcome::Reply(reply) => Ok(CompletionResponse::text(reply.clone(), model)),
            Outcome::Fail(kind, detail) => Err(Error::backend(self.name.clone(), *kind, detail.clone())),
        }
    }
}
