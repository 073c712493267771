//! Token estimation
//!
//! Routing and window eviction only need an estimate that grows with the
//! content, so this uses a character-length heuristic rather than a real
//! tokenizer.

use crate::message::Message;

/// Characters per estimated token
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate tokens in a string (~4 characters per token)
///
/// # Examples
/// ```
/// use agentix_llm::token::estimate_tokens;
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcdefgh"), 2);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Estimate tokens for a whole conversation
///
/// Contents are joined with a single space before estimating.
#[must_use]
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    let separators = messages.len().saturating_sub(1);
    (chars + separators) / CHARS_PER_TOKEN
}
