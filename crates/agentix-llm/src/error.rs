//! Error types for agentix-llm

use std::fmt;
use thiserror::Error;

/// Why a backend call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Credentials missing, expired or rejected
    NotAuthenticated,
    /// Executable not installed or endpoint not reachable
    Unreachable,
    /// The call exceeded its deadline
    Timeout,
    /// The backend throttled the request
    RateLimited,
    /// The backend answered with something we could not parse
    InvalidResponse,
    /// Anything else (non-zero exit, unexpected HTTP status, ...)
    Other,
}

impl BackendErrorKind {
    /// Short label used in logs and error messages
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not authenticated",
            Self::Unreachable => "not installed or unreachable",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::InvalidResponse => "invalid response",
            Self::Other => "error",
        }
    }

    /// Actionable hint shown after the error detail
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotAuthenticated => Some("re-run the backend's login flow or check its API key"),
            Self::Unreachable => Some("install or start the backend, or pick another one"),
            Self::Timeout => Some("retry, raise timeout_secs, or pick a faster backend"),
            _ => None,
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn hint_suffix(kind: &BackendErrorKind) -> String {
    kind.hint()
        .map(|h| format!(" (hint: {h})"))
        .unwrap_or_default()
}

/// Agentix LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// No backend became active; the router cannot be built
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single backend failed to construct
    #[error("backend '{backend}' failed to initialize: {reason}")]
    BackendInit {
        /// Backend key
        backend: String,
        /// What went wrong
        reason: String,
    },

    /// No active backend satisfies the context size / capabilities of a request
    #[error("no available backend can handle task type '{task_type}' with context size {context_size}")]
    NoViableBackend {
        /// Task type of the request
        task_type: String,
        /// Estimated context size in tokens
        context_size: usize,
    },

    /// The selected backend failed to complete the request
    #[error("backend '{backend}' {kind}: {detail}{}", hint_suffix(.kind))]
    Backend {
        /// Backend that was attempted
        backend: String,
        /// Failure category
        kind: BackendErrorKind,
        /// Sanitized detail from the backend
        detail: String,
    },

    /// Lookup of a backend that is not active
    #[error("backend '{0}' not available")]
    UnknownBackend(String),

    /// Malformed or unusable context window snapshot
    #[error("context window error: {0}")]
    ContextWindow(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a backend error
    pub fn backend(
        backend: impl Into<String>,
        kind: BackendErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            kind,
            detail: detail.into(),
        }
    }

    /// Failure category, if this is a backend error
    #[must_use]
    pub fn backend_kind(&self) -> Option<BackendErrorKind> {
        match self {
            Self::Backend { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
