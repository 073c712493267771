//! Common utilities for backend adapters
//!
//! Helpers shared by the hosted, CLI and local adapters: key masking for
//! logs and scrubbing of provider error text before it reaches a user.

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Maximum length of error detail carried in a backend error
pub const MAX_ERROR_DETAIL_CHARS: usize = 300;

/// Sensitive patterns to filter from error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "api_key",
    "api-key",
    "apikey",
    "x-api-key",
    "authorization",
    "bearer",
    "secret",
    "password",
    "credential",
];

/// Path prefixes that reveal local layout
const PATH_PREFIXES: &[&str] = &["/home/", "/Users/", "/root/", "/tmp/", "C:\\"];

/// Mask API key for safe display in logs
///
/// # Examples
/// ```
/// use agentix_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }
    let head: String = chars[..KEY_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncate to at most `max_chars` characters without splitting a char
#[must_use]
pub fn truncate_safe(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Sanitize error text for user display
///
/// Text mentioning credentials is replaced wholesale, local paths are
/// hidden, and the result is truncated to [`MAX_ERROR_DETAIL_CHARS`].
///
/// # Examples
/// ```
/// use agentix_llm::util::sanitize_error_for_user;
/// assert_eq!(
///     sanitize_error_for_user("Invalid api_key provided"),
///     "An API error occurred. Please try again."
/// );
/// assert_eq!(sanitize_error_for_user("Connection timeout"), "Connection timeout");
/// ```
#[must_use]
pub fn sanitize_error_for_user(error: &str) -> String {
    let lower = error.to_lowercase();

    for pattern in SENSITIVE_PATTERNS {
        if lower.contains(pattern) {
            return "An API error occurred. Please try again.".to_string();
        }
    }

    let scrubbed = error
        .split(' ')
        .map(|word| {
            if PATH_PREFIXES.iter().any(|p| word.contains(p)) {
                "<path>"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let trimmed = scrubbed.trim();
    let truncated = truncate_safe(trimmed, MAX_ERROR_DETAIL_CHARS);
    if truncated.len() < trimmed.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// Resolve an API key from config, then from the listed environment variables
#[must_use]
pub fn resolve_api_key(configured: Option<&str>, env_vars: &[&str]) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_vars
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        })
}

/// Validate API key is not empty and has minimum length
///
/// Returns an error message if validation fails, None if valid.
#[must_use]
pub fn validate_api_key(key: &str, backend: &str) -> Option<String> {
    if key.is_empty() {
        return Some(format!("{} API key is required", backend));
    }
    if key.len() < MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return Some(format!("{} API key appears to be invalid (too short)", backend));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key_long() {
        let key = "sk-1234567890abcdefghij";
        let masked = mask_api_key(key);
        assert_eq!(masked, "sk-1...ghij");
        assert!(!masked.contains("567890"));
    }

    #[test]
    fn test_mask_api_key_short() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key(""), "****");
    }

    #[test]
    fn test_sanitize_error_with_bearer() {
        let sanitized = sanitize_error_for_user("Bearer token expired");
        assert_eq!(sanitized, "An API error occurred. Please try again.");
    }

    #[test]
    fn test_sanitize_error_hides_paths() {
        let sanitized = sanitize_error_for_user("cannot open /home/dev/.config/claude.json");
        assert_eq!(sanitized, "cannot open <path>");
    }

    #[test]
    fn test_sanitize_error_truncates() {
        let long = "x".repeat(1000);
        let sanitized = sanitize_error_for_user(&long);
        assert_eq!(sanitized.chars().count(), MAX_ERROR_DETAIL_CHARS + 3);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_truncate_safe_multibyte() {
        assert_eq!(truncate_safe("héllo", 2), "hé");
        assert_eq!(truncate_safe("hi", 10), "hi");
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        assert_eq!(
            resolve_api_key(Some("  sk-config-key  "), &["AGENTIX_TEST_UNSET_KEY_VAR"]),
            Some("sk-config-key".to_string())
        );
        assert_eq!(resolve_api_key(Some(""), &["AGENTIX_TEST_UNSET_KEY_VAR"]), None);
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("", "Test").is_some());
        assert!(validate_api_key("short", "Test").is_some());
        assert!(validate_api_key("valid-api-key-12345", "Test").is_none());
    }
}
