//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_IDENTIFIER_LENGTH: usize = 64;
const MAX_WORD_LENGTH: usize = 64;
const MAX_ANSWER_LENGTH: usize = 128;

/// Validates a player or room identifier: 1–64 characters drawn from ASCII
/// alphanumerics, `_`, and `-`.
///
/// Keeping the charset this tight also keeps identifiers safe as document
/// field-path segments in the storage layer.
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LENGTH {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "identifier must be 1-{MAX_IDENTIFIER_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("identifier_format");
        err.message =
            Some("identifier may only contain ASCII letters, digits, `_`, and `-`".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a word-chain submission: 1–64 alphabetic characters.
pub fn validate_word(word: &str) -> Result<(), ValidationError> {
    let trimmed = word.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_WORD_LENGTH {
        let mut err = ValidationError::new("word_length");
        err.message = Some(format!("word must be 1-{MAX_WORD_LENGTH} characters").into());
        return Err(err);
    }

    if !trimmed.chars().all(char::is_alphabetic) {
        let mut err = ValidationError::new("word_format");
        err.message = Some("word may only contain letters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a catch-the-word guess: non-empty free text up to 128 characters.
pub fn validate_answer(answer: &str) -> Result<(), ValidationError> {
    let trimmed = answer.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_ANSWER_LENGTH {
        let mut err = ValidationError::new("answer_length");
        err.message = Some(format!("answer must be 1-{MAX_ANSWER_LENGTH} characters").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identifiers() {
        assert!(validate_identifier("alice").is_ok());
        assert!(validate_identifier("room-42").is_ok());
        assert!(validate_identifier("user_7A").is_ok());
    }

    #[test]
    fn invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("dotted.path").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn valid_words() {
        assert!(validate_word("tiger").is_ok());
        assert!(validate_word("  Tiger ").is_ok());
    }

    #[test]
    fn invalid_words() {
        assert!(validate_word("").is_err());
        assert!(validate_word("   ").is_err());
        assert!(validate_word("two words").is_err());
        assert!(validate_word("word42").is_err());
    }

    #[test]
    fn answers_allow_free_text() {
        assert!(validate_answer("ice cream").is_ok());
        assert!(validate_answer("").is_err());
        assert!(validate_answer(&"a".repeat(200)).is_err());
    }
}
