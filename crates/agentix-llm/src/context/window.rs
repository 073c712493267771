//! Token-bounded shared message window

use super::message::{ContextMessage, MessageFormat, ProjectedMessage};
use crate::config::DEFAULT_CONTEXT_MAX_TOKENS;
use crate::message::{Message, MessageRole};
use crate::token::estimate_tokens;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Smallest budget a window accepts
const MIN_MAX_TOKENS: usize = 1;

/// Shared context window
///
/// Messages are kept in append order. After every insertion the oldest
/// messages are evicted until the running estimate fits the budget, except
/// that a leading system message outlives everything that can be evicted
/// instead, and the window is never emptied by eviction.
///
/// The window has no internal locking. Exactly one caller mutates it at a
/// time; the router enforces this by holding the surrounding
/// `SharedContext` mutex only between awaits.
#[derive(Debug, Clone)]
pub struct SharedContextWindow {
    pub(super) messages: Vec<ContextMessage>,
    pub(super) max_tokens: usize,
    pub(super) estimated_tokens: usize,
    pub(super) backend_counts: BTreeMap<String, usize>,
}

impl Default for SharedContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_MAX_TOKENS)
    }
}

/// Aggregate view of the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Messages currently held
    pub total_messages: usize,
    /// Running token estimate
    pub estimated_tokens: usize,
    /// Token budget
    pub max_tokens: usize,
    /// `estimated_tokens / max_tokens` as a percentage
    pub utilization_percent: f64,
    /// Backend -> messages it contributed
    pub per_backend_counts: BTreeMap<String, usize>,
    /// Timestamp of the first message
    pub oldest_timestamp: Option<DateTime<Utc>>,
    /// Timestamp of the last message
    pub newest_timestamp: Option<DateTime<Utc>>,
}

/// One backend's share of the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendContribution {
    /// Messages contributed
    pub message_count: usize,
    /// Estimated tokens across those messages
    pub estimated_tokens: usize,
    /// Share of all messages, as a percentage
    pub share_percent: f64,
    /// Distinct models used, sorted
    pub models: Vec<String>,
}

impl SharedContextWindow {
    /// Create an empty window with a token budget
    ///
    /// A zero budget is raised to one token so the window can always be
    /// saved and restored.
    #[must_use]
    pub fn new(max_tokens: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_tokens: max_tokens.max(MIN_MAX_TOKENS),
            estimated_tokens: 0,
            backend_counts: BTreeMap::new(),
        }
    }

    /// Append a message, then evict until the budget holds
    ///
    /// Returns the stored record. It may already have been evicted if it
    /// alone overflows a window that starts with a system message.
    pub fn add_message(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
        backend: Option<&str>,
        model: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> ContextMessage {
        let message = ContextMessage::new(role, content)
            .attributed(backend, model)
            .with_metadata(metadata.unwrap_or_default());
        self.push(message.clone());
        self.evict_if_needed();
        message
    }

    /// Append a pre-built record, then evict until the budget holds
    pub fn push_message(&mut self, message: ContextMessage) {
        self.push(message);
        self.evict_if_needed();
    }

    fn push(&mut self, message: ContextMessage) {
        self.estimated_tokens += estimate_tokens(&message.content);
        if let Some(backend) = &message.backend {
            *self.backend_counts.entry(backend.clone()).or_insert(0) += 1;
        }
        self.messages.push(message);
    }

    fn forget(&mut self, message: &ContextMessage) {
        self.estimated_tokens = self
            .estimated_tokens
            .saturating_sub(estimate_tokens(&message.content));
        if let Some(backend) = &message.backend {
            if let Some(count) = self.backend_counts.get_mut(backend) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.backend_counts.remove(backend);
                }
            }
        }
    }

    /// Evict oldest messages while over budget
    ///
    /// Returns how many messages were removed.
    pub fn evict_if_needed(&mut self) -> usize {
        let mut evicted = 0;
        while self.estimated_tokens > self.max_tokens && self.messages.len() > 1 {
            let index = usize::from(self.messages[0].role == MessageRole::System);
            let removed = self.messages.remove(index);
            self.forget(&removed);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.messages.len(),
                estimated_tokens = self.estimated_tokens,
                max_tokens = self.max_tokens,
                "Evicted context messages"
            );
        }
        evicted
    }

    /// Read the window in a given shape, optionally limited to one backend
    #[must_use]
    pub fn messages(&self, format: MessageFormat, backend: Option<&str>) -> Vec<ProjectedMessage> {
        self.messages
            .iter()
            .filter(|m| backend.map_or(true, |b| m.backend.as_deref() == Some(b)))
            .map(|m| m.project(format))
            .collect()
    }

    /// Whole window as plain messages
    #[must_use]
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.iter().map(ContextMessage::to_message).collect()
    }

    /// Stored records, oldest first
    #[must_use]
    pub fn entries(&self) -> &[ContextMessage] {
        &self.messages
    }

    /// The `count` most recent records
    #[must_use]
    pub fn recent(&self, count: usize) -> &[ContextMessage] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    /// Number of messages held
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Running token estimate
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    /// Token budget
    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Change the token budget, evicting if the window no longer fits
    ///
    /// Returns how many messages were removed. Zero is raised to one token.
    pub fn set_max_tokens(&mut self, max_tokens: usize) -> usize {
        self.max_tokens = max_tokens.max(MIN_MAX_TOKENS);
        self.evict_if_needed()
    }

    /// Backend -> messages currently held
    #[must_use]
    pub fn backend_counts(&self) -> &BTreeMap<String, usize> {
        &self.backend_counts
    }

    /// Aggregate view
    #[must_use]
    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            total_messages: self.messages.len(),
            estimated_tokens: self.estimated_tokens,
            max_tokens: self.max_tokens,
            utilization_percent: percent(self.estimated_tokens, self.max_tokens),
            per_backend_counts: self.backend_counts.clone(),
            oldest_timestamp: self.messages.first().map(|m| m.timestamp),
            newest_timestamp: self.messages.last().map(|m| m.timestamp),
        }
    }

    /// Per-backend breakdown of the window
    #[must_use]
    pub fn backend_contributions(&self) -> BTreeMap<String, BackendContribution> {
        let total = self.messages.len();
        let mut models: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut tokens: BTreeMap<&str, usize> = BTreeMap::new();

        for message in &self.messages {
            if let Some(backend) = message.backend.as_deref() {
                *tokens.entry(backend).or_insert(0) += estimate_tokens(&message.content);
                let entry = models.entry(backend).or_default();
                if let Some(model) = message.model.as_deref() {
                    entry.insert(model);
                }
            }
        }

        self.backend_counts
            .iter()
            .map(|(backend, &count)| {
                let contribution = BackendContribution {
                    message_count: count,
                    estimated_tokens: tokens.get(backend.as_str()).copied().unwrap_or(0),
                    share_percent: percent(count, total),
                    models: models
                        .get(backend.as_str())
                        .map(|set| set.iter().map(|m| (*m).to_string()).collect())
                        .unwrap_or_default(),
                };
                (backend.clone(), contribution)
            })
            .collect()
    }

    /// Drop everything, or everything except system messages
    pub fn clear(&mut self, keep_system: bool) {
        let kept: Vec<ContextMessage> = if keep_system {
            self.messages
                .drain(..)
                .filter(|m| m.role == MessageRole::System)
                .collect()
        } else {
            Vec::new()
        };
        self.replace_messages(kept);
    }

    /// Replace the contents and recompute every aggregate
    pub(super) fn replace_messages(&mut self, messages: Vec<ContextMessage>) {
        self.messages.clear();
        self.estimated_tokens = 0;
        self.backend_counts.clear();
        for message in messages {
            self.push(message);
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
