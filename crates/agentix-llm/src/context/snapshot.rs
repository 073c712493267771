//! Persisted window form

use super::message::ContextMessage;
use super::window::SharedContextWindow;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Ordered messages plus the aggregates they imply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// Messages, oldest first
    pub messages: Vec<ContextMessage>,
    /// Aggregates at save time
    pub metadata: SnapshotMetadata,
}

/// Aggregates recorded alongside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Running token estimate
    #[serde(default, alias = "total_tokens")]
    pub estimated_tokens: usize,
    /// Token budget
    pub max_tokens: usize,
    /// Backend -> message count
    #[serde(default, alias = "providers_used")]
    pub per_backend_counts: BTreeMap<String, usize>,
    /// When the snapshot was taken
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

impl SharedContextWindow {
    /// Capture the current state
    #[must_use]
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            messages: self.messages.clone(),
            metadata: SnapshotMetadata {
                estimated_tokens: self.estimated_tokens,
                max_tokens: self.max_tokens,
                per_backend_counts: self.backend_counts.clone(),
                saved_at: Utc::now(),
            },
        }
    }

    /// Build a window from a snapshot
    pub fn from_snapshot(snapshot: WindowSnapshot) -> Result<Self> {
        let mut window = Self::default();
        window.restore(snapshot)?;
        Ok(window)
    }

    /// Replace this window's state with a snapshot's
    ///
    /// Aggregates are recomputed from the messages; persisted ones are
    /// only compared. Nothing changes unless the snapshot is accepted.
    pub fn restore(&mut self, snapshot: WindowSnapshot) -> Result<()> {
        let WindowSnapshot { messages, metadata } = snapshot;
        if metadata.max_tokens == 0 {
            return Err(Error::ContextWindow(
                "snapshot max_tokens must be greater than zero".to_string(),
            ));
        }

        let mut restored = Self::new(metadata.max_tokens);
        restored.replace_messages(messages);

        if restored.estimated_tokens != metadata.estimated_tokens
            || restored.backend_counts != metadata.per_backend_counts
        {
            warn!(
                persisted_tokens = metadata.estimated_tokens,
                recomputed_tokens = restored.estimated_tokens,
                "Snapshot aggregates disagree with its messages; using recomputed values"
            );
        }

        let evicted = restored.evict_if_needed();
        if evicted > 0 {
            warn!(evicted, "Restored snapshot exceeded its budget");
        }

        *self = restored;
        Ok(())
    }

    /// Write the window to `path` as pretty JSON, creating parent directories
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| Error::ContextWindow(format!("failed to serialize snapshot: {e}")))?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), messages = self.messages.len(), "Saved context window");
        Ok(())
    }

    /// Read a snapshot from `path` and restore it
    ///
    /// On any failure the window is left as it was.
    pub fn restore_snapshot(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let snapshot: WindowSnapshot = serde_json::from_str(&json).map_err(|e| {
            Error::ContextWindow(format!("malformed snapshot {}: {e}", path.display()))
        })?;
        self.restore(snapshot)?;
        debug!(path = %path.display(), messages = self.messages.len(), "Restored context window");
        Ok(())
    }
}
