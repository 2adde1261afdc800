//! Input validation for register usernames
//!
//! Fields are private to force validation through `Username::new`.

use std::fmt;

const MIN_LEN: usize = 1;
const MAX_LEN: usize = 64;

/// Validation errors for register input
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid length for {field}: expected {min}-{max}, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Validated username
///
/// # Validation Rules
/// - Characters: a-z, A-Z, 0-9, _
/// - Length: 1-64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > MAX_LEN {
            return Err(ValidationError::InvalidLength {
                field: "username",
                min: MIN_LEN,
                max: MAX_LEN,
                actual: name.len(),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                value: name.to_string(),
                expected: "a-z, A-Z, 0-9, _",
            });
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        let longest = "x".repeat(MAX_LEN);
        for name in ["a", "alice", "Alice_01", "_", longest.as_str()] {
            assert_eq!(Username::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(
            Username::new(""),
            Err(ValidationError::InvalidLength { actual: 0, .. })
        ));
        assert!(matches!(
            Username::new(&"x".repeat(MAX_LEN + 1)),
            Err(ValidationError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_invalid_format() {
        for name in ["al ice", "alice!", "ali.ce", "alice@mint", "ålice", "a-b"] {
            assert!(
                matches!(Username::new(name), Err(ValidationError::InvalidFormat { .. })),
                "accepted {:?}",
                name
            );
        }
    }

    #[test]
    fn test_no_trimming() {
        assert!(Username::new(" alice").is_err());
    }
}
