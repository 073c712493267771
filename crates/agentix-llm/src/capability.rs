//! Backend capabilities and task types
//!
//! `Capability` is a closed set describing what a backend is good at.
//! `TaskType` is an open set: the workflow may send any string, and unknown
//! values route through the fallback preference order instead of failing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Capability
// ============================================================================

/// Something a backend can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Writing new code
    CodeGeneration,
    /// Reading and explaining existing code
    CodeUnderstanding,
    /// Very large prompts
    LongContext,
    /// Low-latency responses
    FastInference,
    /// Multi-step reasoning
    Planning,
    /// Restructuring existing code
    Refactoring,
    /// Tool / function calling
    FunctionCalling,
    /// Images and other non-text input
    Multimodal,
}

impl Capability {
    /// All capabilities, in declaration order
    pub const ALL: [Capability; 8] = [
        Self::CodeGeneration,
        Self::CodeUnderstanding,
        Self::LongContext,
        Self::FastInference,
        Self::Planning,
        Self::Refactoring,
        Self::FunctionCalling,
        Self::Multimodal,
    ];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::CodeUnderstanding => "code_understanding",
            Self::LongContext => "long_context",
            Self::FastInference => "fast_inference",
            Self::Planning => "planning",
            Self::Refactoring => "refactoring",
            Self::FunctionCalling => "function_calling",
            Self::Multimodal => "multimodal",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

// ============================================================================
// Task Type
// ============================================================================

/// Kind of generation request, used to look up a backend preference order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Writing a change specification
    Specification,
    /// Turning a specification into a plan
    Planning,
    /// Breaking a plan into tasks
    Tasks,
    /// Writing code
    CodeGeneration,
    /// Carrying out a single task
    TaskExecution,
    /// Restructuring code
    Refactoring,
    /// Reviewing a change
    Review,
    /// Requests with very large prompts
    LargeContext,
    /// Quick edit/run loops
    FastIteration,
    /// Cheapest acceptable backend
    CostEffective,
    /// Any other task string
    Other(String),
}

impl TaskType {
    /// Known task types, in declaration order
    pub const KNOWN: [TaskType; 10] = [
        Self::Specification,
        Self::Planning,
        Self::Tasks,
        Self::CodeGeneration,
        Self::TaskExecution,
        Self::Refactoring,
        Self::Review,
        Self::LargeContext,
        Self::FastIteration,
        Self::CostEffective,
    ];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Specification => "specification",
            Self::Planning => "planning",
            Self::Tasks => "tasks",
            Self::CodeGeneration => "code_generation",
            Self::TaskExecution => "task_execution",
            Self::Refactoring => "refactoring",
            Self::Review => "review",
            Self::LargeContext => "large_context",
            Self::FastIteration => "fast_iteration",
            Self::CostEffective => "cost_effective",
            Self::Other(s) => s,
        }
    }

    /// Whether this is one of the known task types
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Default for TaskType {
    fn default() -> Self {
        Self::CodeGeneration
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|t| t.as_str() == s)
            .cloned()
            .unwrap_or_else(|| Self::Other(s.to_string()))
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
