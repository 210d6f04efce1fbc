//! Document field validation.

use crate::error::CoreError;

/// Maximum length of a document name, in bytes.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of document content, in bytes (2 MiB).
pub const MAX_CONTENT_LEN: usize = 2 * 1024 * 1024;

/// Validate a document name (non-empty after trimming, <= 200 bytes).
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate document content size.
pub fn validate_content(content: &str) -> Result<(), CoreError> {
    if content.len() > MAX_CONTENT_LEN {
        return Err(CoreError::Validation(format!(
            "Content must be at most {MAX_CONTENT_LEN} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name_passes() {
        assert!(validate_name("Getting Started").is_ok());
    }

    #[test]
    fn empty_or_blank_name_fails() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn overlong_name_fails() {
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn empty_content_is_allowed() {
        assert!(validate_content("").is_ok());
    }

    #[test]
    fn oversized_content_fails() {
        assert!(validate_content(&"x".repeat(MAX_CONTENT_LEN + 1)).is_err());
    }
}
