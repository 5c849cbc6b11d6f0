//! Tool name and module prefix validation rules

use thiserror::Error;

/// Maximum length for tool names and module prefixes
pub const MAX_NAME_LENGTH: usize = 64;

/// Error type for name validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameValidationError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name too long ({length} chars, max {max})")]
    TooLong { length: usize, max: usize },

    #[error("name must start with a lowercase ASCII letter")]
    InvalidStart,

    #[error("name can only contain lowercase ASCII letters, digits and underscores (found {found:?})")]
    InvalidCharacter { found: char },

    #[error("module prefix must end with an underscore")]
    PrefixNotTerminated,
}

/// Validator for registry names
pub struct NameValidator;

impl NameValidator {
    /// Validate a tool name.
    ///
    /// # Validation Rules
    ///
    /// - Non-empty, at most [`MAX_NAME_LENGTH`] characters
    /// - Starts with a lowercase ASCII letter
    /// - Only lowercase ASCII letters, digits and `_`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mediagate_core::identifiers::NameValidator;
    ///
    /// assert!(NameValidator::validate_tool_name("img_generate").is_ok());
    /// assert!(NameValidator::validate_tool_name("Img-Generate").is_err());
    /// assert!(NameValidator::validate_tool_name("").is_err());
    /// ```
    pub fn validate_tool_name(name: &str) -> Result<&str, NameValidationError> {
        if name.is_empty() {
            return Err(NameValidationError::Empty);
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(NameValidationError::TooLong {
                length: name.len(),
                max: MAX_NAME_LENGTH,
            });
        }

        if !name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
            return Err(NameValidationError::InvalidStart);
        }

        if let Some(found) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        {
            return Err(NameValidationError::InvalidCharacter { found });
        }

        Ok(name)
    }

    /// Validate a module namespace prefix such as `img_`.
    ///
    /// Same character rules as tool names, plus a trailing `_` so that one
    /// prefix can never be a partial word of another tool name.
    pub fn validate_prefix(prefix: &str) -> Result<&str, NameValidationError> {
        Self::validate_tool_name(prefix)?;
        if !prefix.ends_with('_') {
            return Err(NameValidationError::PrefixNotTerminated);
        }
        Ok(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_namespaced_names() {
        assert!(NameValidator::validate_tool_name("vid_generate").is_ok());
        assert!(NameValidator::validate_tool_name("img_tag2").is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            NameValidator::validate_tool_name(""),
            Err(NameValidationError::Empty)
        );
        assert_eq!(
            NameValidator::validate_tool_name("_hidden"),
            Err(NameValidationError::InvalidStart)
        );
        assert_eq!(
            NameValidator::validate_tool_name("img-generate"),
            Err(NameValidationError::InvalidCharacter { found: '-' })
        );
        assert!(matches!(
            NameValidator::validate_tool_name(&"a".repeat(65)),
            Err(NameValidationError::TooLong { length: 65, .. })
        ));
    }

    #[test]
    fn prefixes_must_end_with_underscore() {
        assert!(NameValidator::validate_prefix("img_").is_ok());
        assert_eq!(
            NameValidator::validate_prefix("img"),
            Err(NameValidationError::PrefixNotTerminated)
        );
    }
}
