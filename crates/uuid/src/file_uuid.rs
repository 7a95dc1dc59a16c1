//! Canonical UUID wrapper used for the `uuid` column of file records.

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Canonical external identifier (32 lowercase hex characters, no hyphens).
///
/// Once constructed the contained value is guaranteed canonical, so it can be written to
/// the metadata store and compared as a plain string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileUuid(Uuid);

impl Default for FileUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl FileUuid {
    /// Generates a new random (version 4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }

        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("'{}': {}", input, e)))
    }

    /// Returns true if `input` is exactly 32 characters of `0-9a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for FileUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for FileUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileUuid::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_canonical() {
        let id = FileUuid::new().to_string();
        assert_eq!(id.len(), 32);
        assert!(FileUuid::is_canonical(&id));
    }

    #[test]
    fn test_new_values_differ() {
        assert_ne!(FileUuid::new(), FileUuid::new());
    }

    #[test]
    fn test_parse_accepts_canonical() {
        let parsed = FileUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        assert_eq!(parsed.to_string(), "550e8400e29b41d4a716446655440000");
    }

    #[test]
    fn test_parse_rejects_hyphenated() {
        let result = FileUuid::parse("550e8400-e29b-41d4-a716-446655440000");
        match result {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("32 lowercase hex")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_bad_lengths() {
        assert!(FileUuid::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(FileUuid::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(FileUuid::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(FileUuid::parse("").is_err());
    }

    #[test]
    fn test_from_str_round_trip() {
        let original = FileUuid::new();
        let parsed: FileUuid = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }
}
