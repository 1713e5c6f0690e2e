//! Input validation for turns
//!
//! Malformed input is rejected before any state is loaded or locked.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,50}$").expect("valid session id pattern"));

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("session id must be 3-50 characters of letters, digits, '-' or '_'")]
    SessionId,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },
}

pub fn validate_session_id(id: &str) -> Result<(), ValidationError> {
    if SESSION_ID.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::SessionId)
    }
}

/// Normalise a user message: control characters other than newlines and
/// tabs are removed and surrounding whitespace trimmed.
pub fn sanitize_message(raw: &str, max_chars: usize) -> Result<String, ValidationError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = cleaned.chars().count();
    if len > max_chars {
        return Err(ValidationError::MessageTooLong { len, max: max_chars });
    }
    Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids() {
        assert!(validate_session_id("abc").is_ok());
        assert!(validate_session_id("class-7B_jazz").is_ok());
        assert!(validate_session_id(&"x".repeat(50)).is_ok());

        assert_eq!(validate_session_id("ab"), Err(ValidationError::SessionId));
        assert!(validate_session_id(&"x".repeat(51)).is_err());
        assert!(validate_session_id("has space").is_err());
        assert!(validate_session_id("../etc").is_err());
        assert!(validate_session_id("").is_err());
    }

    #[test]
    fn test_message_is_cleaned() {
        assert_eq!(
            sanitize_message("  hello\u{0}\u{7} jazz\n  ", 100).unwrap(),
            "hello jazz"
        );
        assert_eq!(sanitize_message("a\tb\nc", 100).unwrap(), "a\tb\nc");
    }

    #[test]
    fn test_empty_message_rejected() {
        assert_eq!(sanitize_message("   \n", 10), Err(ValidationError::EmptyMessage));
        assert_eq!(sanitize_message("\u{1b}\u{0}", 10), Err(ValidationError::EmptyMessage));
    }

    #[test]
    fn test_length_counted_in_characters() {
        assert!(sanitize_message(&"é".repeat(10), 10).is_ok());
        assert_eq!(
            sanitize_message(&"é".repeat(11), 10),
            Err(ValidationError::MessageTooLong { len: 11, max: 10 })
        );
    }
}
