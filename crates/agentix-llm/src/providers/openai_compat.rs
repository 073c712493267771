//! OpenAI-compatible chat wire format
//!
//! Shared by OpenRouter and the local OpenAI-compatible servers. The hosted
//! OpenAI backend goes through `async-openai` instead.

use super::http::{map_send_error, read_json};
use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{BackendErrorKind, Error, Result};
use crate::message::Message;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelEntry {
    pub id: String,
}

impl ChatResponse {
    /// Pull `choices[0].message.content` out, or fail as an invalid response
    pub(crate) fn into_completion(self, backend: &str, model: &str) -> Result<CompletionResponse> {
        let usage = self
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));
        let model = self.model.unwrap_or_else(|| model.to_string());

        let first = self.choices.into_iter().next().ok_or_else(|| {
            Error::backend(
                backend,
                BackendErrorKind::InvalidResponse,
                "response contained no choices",
            )
        })?;
        let content = first
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| {
                Error::backend(
                    backend,
                    BackendErrorKind::InvalidResponse,
                    "response choice had no message content",
                )
            })?;

        Ok(CompletionResponse {
            content,
            model,
            usage,
            finish_reason: first.finish_reason,
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Minimal chat-completions client for one OpenAI-compatible endpoint
pub(crate) struct ChatClient {
    backend: &'static str,
    client: Client,
    chat_url: String,
    bearer: Option<String>,
    headers: HeaderMap,
}

impl ChatClient {
    pub(crate) fn new(backend: &'static str, client: Client, chat_url: String) -> Self {
        Self {
            backend,
            client,
            chat_url,
            bearer: None,
            headers: HeaderMap::new(),
        }
    }

    pub(crate) fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub(crate) fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// POST a chat completion and decode the first choice
    pub(crate) async fn chat(
        &self,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        debug!(backend = self.backend, url = %self.chat_url, "sending chat completion");

        let mut builder = self
            .client
            .post(&self.chat_url)
            .headers(self.headers.clone())
            .json(&body);
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(self.backend, &e))?;

        let parsed: ChatResponse = read_json(self.backend, response).await?;
        parsed.into_completion(self.backend, model)
    }

    /// GET a `/models` listing and return the ids
    pub(crate) async fn list_models(&self, url: &str) -> Result<Vec<String>> {
        let mut builder = self.client.get(url).headers(self.headers.clone());
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(self.backend, &e))?;
        let list: ModelList = read_json(self.backend, response).await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}
