//! Task-type preference table
//!
//! Routing data only: for each task type, the order in which backends are
//! tried. The router still falls through to any viable backend when none of
//! a row's entries qualify.

use crate::capability::TaskType;
use crate::config::RoutingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hosted families whose CLI and local siblings follow them in every row
const FAMILIES: [&str; 3] = ["claude", "openai", "gemini"];

/// Appended to every row
const AGGREGATOR: &str = "openrouter";

const BUILTIN_ROWS: &[(&str, &[&str])] = &[
    ("specification", &["claude", "gemini", "openai"]),
    ("planning", &["claude", "openai", "gemini"]),
    ("tasks", &["claude", "openai", "gemini"]),
    ("code_generation", &["openai", "gemini", "claude"]),
    ("task_execution", &["gemini", "openai", "claude"]),
    ("refactoring", &["claude", "openai", "gemini"]),
    ("review", &["claude", "openai", "gemini"]),
    ("large_context", &["gemini", "claude", "openai"]),
    ("fast_iteration", &["gemini", "openai", "claude"]),
    (
        "cost_effective",
        &[
            "ollama",
            "local_openai",
            "local_claude",
            "local_gemini",
            "gemini",
            "openrouter",
            "openai",
            "claude",
        ],
    ),
];

const BUILTIN_FALLBACK: &[&str] = &["openai", "claude", "gemini"];

/// Task type -> ordered backend names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPreferences {
    rows: HashMap<String, Vec<String>>,
    fallback: Vec<String>,
}

impl Default for TaskPreferences {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TaskPreferences {
    /// Table with no rows and no fallback order
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rows: HashMap::new(),
            fallback: Vec::new(),
        }
    }

    /// Built-in table, expanded with CLI and local siblings
    #[must_use]
    pub fn builtin() -> Self {
        let rows = BUILTIN_ROWS
            .iter()
            .map(|(task, order)| ((*task).to_string(), expand(order)))
            .collect();
        Self {
            rows,
            fallback: expand(BUILTIN_FALLBACK),
        }
    }

    /// Replace one row, used verbatim
    #[must_use]
    pub fn with_row<I, S>(mut self, task: impl Into<TaskType>, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_row(task, order);
        self
    }

    /// Replace one row, used verbatim
    pub fn set_row<I, S>(&mut self, task: impl Into<TaskType>, order: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let task = task.into();
        self.rows.insert(
            task.as_str().to_string(),
            order.into_iter().map(Into::into).collect(),
        );
    }

    /// Replace the order used for task types without a row
    #[must_use]
    pub fn with_fallback<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback = order.into_iter().map(Into::into).collect();
        self
    }

    /// Apply rows and fallback order from configuration
    pub fn apply_overrides(&mut self, routing: &RoutingConfig) {
        for (task, order) in &routing.task_preferences {
            self.set_row(task.as_str(), order.iter().cloned());
        }
        if !routing.fallback_order.is_empty() {
            self.fallback = routing.fallback_order.clone();
        }
    }

    /// Preference order for a task type
    #[must_use]
    pub fn order_for(&self, task: &TaskType) -> &[String] {
        self.rows
            .get(task.as_str())
            .map_or(self.fallback.as_slice(), Vec::as_slice)
    }

    /// Order used for task types without a row
    #[must_use]
    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }
}

/// Follow each hosted family with its CLI and local siblings, append the
/// aggregator, drop repeats
fn expand(order: &[&str]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !expanded.contains(&name) {
            expanded.push(name);
        }
    };

    for name in order {
        push((*name).to_string());
        if FAMILIES.contains(name) {
            push(format!("{name}_cli"));
            push(format!("local_{name}"));
        }
    }
    push(AGGREGATOR.to_string());
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(order: &[String]) -> Vec<&str> {
        order.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_planning_row_follows_families() {
        let prefs = TaskPreferences::builtin();
        assert_eq!(
            names(prefs.order_for(&TaskType::Planning)),
            vec![
                "claude",
                "claude_cli",
                "local_claude",
                "openai",
                "openai_cli",
                "local_openai",
                "gemini",
                "gemini_cli",
                "local_gemini",
                "openrouter",
            ]
        );
    }

    #[test]
    fn test_empty_table_uses_only_given_rows() {
        let prefs = TaskPreferences::empty().with_row(TaskType::Review, ["ollama"]);
        assert_eq!(names(prefs.order_for(&TaskType::Review)), vec!["ollama"]);
        assert!(prefs.order_for(&TaskType::Planning).is_empty());
        assert!(prefs.fallback().is_empty());
    }

    #[test]
    fn test_cost_effective_row_has_no_repeats() {
        let prefs = TaskPreferences::builtin();
        let order = names(prefs.order_for(&TaskType::CostEffective));
        assert_eq!(
            &order[..6],
            &["ollama", "local_openai", "local_claude", "local_gemini", "gemini", "gemini_cli"]
        );
        assert_eq!(order.iter().filter(|n| **n == "openrouter").count(), 1);
        assert_eq!(order.len(), 11);
    }

    #[test]
    fn test_every_known_task_has_a_row() {
        let prefs = TaskPreferences::builtin();
        for task in TaskType::KNOWN.iter() {
            assert_ne!(prefs.order_for(task), prefs.fallback(), "{task}");
        }
    }

    #[test]
    fn test_unknown_task_uses_fallback() {
        let prefs = TaskPreferences::builtin();
        let order = names(prefs.order_for(&TaskType::from("poetry")));
        assert_eq!(&order[..3], &["openai", "openai_cli", "local_openai"]);
        assert_eq!(order.last(), Some(&"openrouter"));
    }

    #[test]
    fn test_config_overrides_replace_rows() {
        let mut routing = RoutingConfig::default();
        routing
            .task_preferences
            .insert("review".to_string(), vec!["ollama".to_string()]);
        routing.fallback_order = vec!["gemini".to_string()];

        let mut prefs = TaskPreferences::builtin();
        prefs.apply_overrides(&routing);

        assert_eq!(names(prefs.order_for(&TaskType::Review)), vec!["ollama"]);
        assert_eq!(names(prefs.order_for(&TaskType::from("poetry"))), vec!["gemini"]);
        assert_eq!(prefs.order_for(&TaskType::Planning).len(), 10);
    }
}
