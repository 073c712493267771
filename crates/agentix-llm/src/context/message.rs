//! Context window records and projections

use crate::message::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One message held by the shared window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Message role
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// Backend that produced the message
    #[serde(default, alias = "provider")]
    pub backend: Option<String>,
    /// Model that produced the message
    #[serde(default)]
    pub model: Option<String>,
    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// When the message was added
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ContextMessage {
    /// Create a message stamped with the current time
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            backend: None,
            model: None,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attribute the message to a backend and model
    #[must_use]
    pub fn attributed(mut self, backend: Option<&str>, model: Option<&str>) -> Self {
        self.backend = backend.map(str::to_string);
        self.model = model.map(str::to_string);
        self
    }

    /// Attach metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Plain `{role, content}` form
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }

    /// Project into the requested shape
    #[must_use]
    pub fn project(&self, format: MessageFormat) -> ProjectedMessage {
        match format {
            MessageFormat::Standard => ProjectedMessage::Standard {
                role: self.role,
                content: self.content.clone(),
            },
            MessageFormat::Attributed => ProjectedMessage::Attributed {
                role: self.role,
                content: self.content.clone(),
                backend: self.backend.clone(),
                model: self.model.clone(),
            },
            MessageFormat::Full => ProjectedMessage::Full(self.clone()),
        }
    }
}

/// Shape of a window read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Role and content
    #[default]
    Standard,
    /// Role, content, backend and model
    Attributed,
    /// The whole record, metadata and timestamp included
    Full,
}

impl MessageFormat {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Attributed => "attributed",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "openai" => Ok(Self::Standard),
            "attributed" => Ok(Self::Attributed),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown message format '{other}' (expected standard, attributed or full)"
            )),
        }
    }
}

/// Read-only view of a window message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectedMessage {
    /// `{role, content}`
    Standard {
        /// Message role
        role: MessageRole,
        /// Message text
        content: String,
    },
    /// `{role, content, backend, model}`
    Attributed {
        /// Message role
        role: MessageRole,
        /// Message text
        content: String,
        /// Producing backend
        backend: Option<String>,
        /// Producing model
        model: Option<String>,
    },
    /// Full record
    Full(ContextMessage),
}

impl ProjectedMessage {
    /// Message role
    #[must_use]
    pub fn role(&self) -> MessageRole {
        match self {
            Self::Standard { role, .. } | Self::Attributed { role, .. } => *role,
            Self::Full(message) => message.role,
        }
    }

    /// Message text
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Standard { content, .. } | Self::Attributed { content, .. } => content,
            Self::Full(message) => &message.content,
        }
    }
}
