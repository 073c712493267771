//! Provider router implementation
//!
//! Holds the backends that passed validation and picks one per request:
//! explicit preference, then the task type's preference row, then any
//! remaining viable backend.

use super::preferences::TaskPreferences;
use super::types::{BackendInfo, RouteRequest, RoutedCompletion};
use crate::adapter::BackendAdapter;
use crate::capability::{Capability, TaskType};
use crate::completion::CompletionRequest;
use crate::config::{RouterConfig, RoutingConfig};
use crate::context::SharedContextWindow;
use crate::error::{Error, Result};
use crate::message::{Message, MessageRole};
use crate::registry::{BackendEntry, BackendRegistry};
use crate::token::estimate_message_tokens;
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Shared context window handle
///
/// The router locks it only while folding messages in or recording a reply,
/// never across an adapter call. Callers must not run two `complete` calls
/// against the same window at once; the lock keeps each step consistent but
/// does not order whole calls.
pub type SharedContext = Arc<Mutex<SharedContextWindow>>;

/// Capability-aware router over the active backends
pub struct ProviderRouter {
    adapters: IndexMap<String, Arc<dyn BackendAdapter>>,
    preferences: TaskPreferences,
    routing: RoutingConfig,
    shared_context: Option<SharedContext>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("backends", &self.available_backends())
            .field("shared_context", &self.shared_context.is_some())
            .finish()
    }
}

impl ProviderRouter {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Build every enabled backend from configuration
    ///
    /// Backends that fail to build or validate are logged and skipped. Fails
    /// only when none are left, listing how to configure each candidate.
    pub async fn from_config(config: &RouterConfig, registry: &BackendRegistry) -> Result<Self> {
        for (key, backend) in &config.providers {
            if backend.enabled && registry.get(key).is_none() {
                warn!(backend = %key, "Ignoring unknown backend in configuration");
            }
        }

        let mut enabled: Vec<&BackendEntry> = Vec::new();
        let mut built: Vec<Arc<dyn BackendAdapter>> = Vec::new();

        for entry in registry.entries() {
            let Some(backend_config) = config.enabled_backend(&entry.key) else {
                continue;
            };
            enabled.push(entry);

            match (entry.factory)(backend_config) {
                Ok(adapter) => built.push(adapter),
                Err(e) => warn!(backend = %entry.key, error = %e, "Skipping backend"),
            }
        }

        let adapters = activate(built).await;
        if adapters.is_empty() {
            let candidates = if enabled.is_empty() {
                registry.entries().collect()
            } else {
                enabled
            };
            return Err(Error::Configuration(remediation_message(&candidates)));
        }

        Ok(Self::with_adapters(adapters).with_routing(config.routing.clone()))
    }

    /// Build a router from pre-built adapters, keeping those that validate
    pub async fn new(adapters: Vec<Arc<dyn BackendAdapter>>) -> Result<Self> {
        let names: Vec<String> = adapters.iter().map(|a| a.name().to_string()).collect();
        let active = activate(adapters).await;
        if active.is_empty() {
            return Err(Error::Configuration(format!(
                "no AI backend is available; none of [{}] passed validation",
                names.join(", ")
            )));
        }
        Ok(Self::with_adapters(active))
    }

    fn with_adapters(adapters: IndexMap<String, Arc<dyn BackendAdapter>>) -> Self {
        Self {
            adapters,
            preferences: TaskPreferences::builtin(),
            routing: RoutingConfig::default(),
            shared_context: None,
        }
    }

    /// Replace the preference table
    ///
    /// Rows and fallback order from the routing configuration still win
    /// over the new table.
    #[must_use]
    pub fn with_preferences(mut self, mut preferences: TaskPreferences) -> Self {
        preferences.apply_overrides(&self.routing);
        self.preferences = preferences;
        self
    }

    /// Attach a shared context window
    #[must_use]
    pub fn with_shared_context(mut self, context: SharedContext) -> Self {
        self.shared_context = Some(context);
        self
    }

    /// Apply routing overrides, including preference rows
    #[must_use]
    pub fn with_routing(mut self, routing: RoutingConfig) -> Self {
        self.preferences.apply_overrides(&routing);
        self.routing = routing;
        self
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Active backend names, in registration order
    #[must_use]
    pub fn available_backends(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// An active adapter
    #[must_use]
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.get(name).cloned()
    }

    /// Describe one active backend
    pub fn backend_info(&self, name: &str) -> Result<BackendInfo> {
        self.adapters
            .get(name)
            .map(|a| BackendInfo::from_adapter(a.as_ref()))
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))
    }

    /// Describe every active backend
    #[must_use]
    pub fn all_backend_info(&self) -> Vec<BackendInfo> {
        self.adapters
            .values()
            .map(|a| BackendInfo::from_adapter(a.as_ref()))
            .collect()
    }

    /// Preference table in use
    #[must_use]
    pub fn preferences(&self) -> &TaskPreferences {
        &self.preferences
    }

    /// The attached shared context window
    #[must_use]
    pub fn shared_context(&self) -> Option<SharedContext> {
        self.shared_context.clone()
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Pick the backend for a request
    ///
    /// A viable preferred backend always wins; then the task's preference
    /// row; then any active backend in registration order.
    pub fn select_adapter(
        &self,
        task: &TaskType,
        context_size: usize,
        preferred: Option<&str>,
        required: &[Capability],
    ) -> Result<Arc<dyn BackendAdapter>> {
        let viable = |adapter: &Arc<dyn BackendAdapter>| {
            adapter.can_handle_context(context_size) && required.iter().all(|c| adapter.supports(*c))
        };

        if let Some(name) = preferred {
            match self.adapters.get(name) {
                Some(adapter) if viable(adapter) => return Ok(Arc::clone(adapter)),
                Some(_) => debug!(backend = name, context_size, "Preferred backend not viable"),
                None => debug!(backend = name, "Preferred backend not active"),
            }
        }

        for name in self.preferences.order_for(task) {
            if let Some(adapter) = self.adapters.get(name).filter(|a| viable(*a)) {
                return Ok(Arc::clone(adapter));
            }
        }

        if let Some(adapter) = self.adapters.values().find(|a| viable(*a)) {
            debug!(backend = adapter.name(), task = %task, "Falling back outside preference row");
            return Ok(Arc::clone(adapter));
        }

        Err(Error::NoViableBackend {
            task_type: task.as_str().to_string(),
            context_size,
        })
    }

    /// Route a request and complete it
    ///
    /// The chosen backend's error is returned as is; no other backend is
    /// tried within the same call.
    #[instrument(skip(self, request), fields(task = %request.task_type))]
    pub async fn complete(&self, request: RouteRequest) -> Result<RoutedCompletion> {
        let RouteRequest {
            messages,
            task_type,
            model,
            temperature,
            max_tokens,
            preferred_backend,
            required_capabilities,
            use_shared_context,
        } = request;

        let window = if use_shared_context {
            if self.shared_context.is_none() {
                warn!("Shared context requested but no window is attached");
            }
            self.shared_context.as_ref()
        } else {
            None
        };

        let messages = match window {
            Some(window) => fold_into_window(window, &messages),
            None => messages,
        };

        let context_size = estimate_message_tokens(&messages);
        let preferred = preferred_backend
            .as_deref()
            .or_else(|| self.routing.preferred_for(&task_type));
        let adapter =
            self.select_adapter(&task_type, context_size, preferred, &required_capabilities)?;

        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| adapter.optimal_model_for(&task_type));

        info!(
            backend = adapter.name(),
            model = %model,
            context_size,
            "Routing completion"
        );

        let response = adapter
            .complete(CompletionRequest {
                model: Some(model.clone()),
                messages,
                temperature,
                max_tokens,
            })
            .await?;

        if let Some(window) = window {
            record_reply(window, adapter.name(), &model, &response.content);
        }

        let served_model = if response.model.is_empty() {
            model
        } else {
            response.model
        };

        Ok(RoutedCompletion {
            content: response.content,
            backend: adapter.name().to_string(),
            model: served_model,
            usage: response.usage,
        })
    }
}

/// Validate adapters in order, keeping those that pass
async fn activate(
    adapters: Vec<Arc<dyn BackendAdapter>>,
) -> IndexMap<String, Arc<dyn BackendAdapter>> {
    let mut active = IndexMap::new();
    for adapter in adapters {
        let name = adapter.name().to_string();
        if active.contains_key(&name) {
            warn!(backend = %name, "Duplicate backend name, keeping the first");
            continue;
        }
        if adapter.validate_config().await {
            info!(backend = %name, shape = %adapter.shape(), "Registered backend");
            active.insert(name, adapter);
        } else {
            warn!(backend = %name, "Backend failed validation, skipping");
        }
    }
    active
}

fn remediation_message(entries: &[&BackendEntry]) -> String {
    let mut message =
        String::from("no AI backend is available. Configure at least one of the following:");
    for entry in entries {
        let _ = write!(
            message,
            "\n  - {} ({}): {}",
            entry.key, entry.shape, entry.remediation
        );
    }
    message
}

/// Add the request's user turns to the window and read the whole window back
fn fold_into_window(window: &SharedContext, messages: &[Message]) -> Vec<Message> {
    let mut window = window.lock().unwrap_or_else(|e| e.into_inner());
    for message in messages.iter().filter(|m| m.role == MessageRole::User) {
        window.add_message(MessageRole::User, message.content.clone(), None, None, None);
    }
    window.to_messages()
}

fn record_reply(window: &SharedContext, backend: &str, model: &str, content: &str) {
    let mut window = window.lock().unwrap_or_else(|e| e.into_inner());
    window.add_message(
        MessageRole::Assistant,
        content,
        Some(backend),
        Some(model),
        None,
    );
}
