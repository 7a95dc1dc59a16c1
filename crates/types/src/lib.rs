//! Validated value types shared by the filestore crates.
//!
//! Values are checked once at construction; code holding one of these types can rely on
//! its invariant without re-validating.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing a content hash.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The input was not 32 lowercase hexadecimal characters
    #[error("MD5 digest must be 32 lowercase hex characters, got: '{0}'")]
    InvalidDigest(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded MD5 digest of a file's exact byte content.
///
/// Always 32 lowercase hexadecimal characters. The digest is only used to spread files
/// across shard directories; two files with the same digest are still stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Md5Hash(String);

impl Md5Hash {
    /// Length of the hex form.
    pub const HEX_LEN: usize = 32;

    /// Builds the hash from raw digest bytes.
    pub fn from_bytes(bytes: &[u8; 16]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Validates a hex digest read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidDigest`] unless `input` is exactly 32 lowercase hex
    /// characters.
    pub fn parse(input: &str) -> Result<Self, HashError> {
        let valid = input.len() == Self::HEX_LEN
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(HashError::InvalidDigest(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The three two-character groups used as nested shard directory names.
    pub fn shard_segments(&self) -> [&str; 3] {
        [&self.0[0..2], &self.0[2..4], &self.0[4..6]]
    }
}

impl std::fmt::Display for Md5Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Md5Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Md5Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for Md5Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
