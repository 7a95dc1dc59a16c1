//! External file identifiers.
//!
//! Every stored file may carry an opaque UUID next to its numeric id. The numeric id is what
//! places a file on disk; the UUID is only handed out to outside systems so they never learn
//! (or guess) sequential ids. It plays no part in path derivation.
//!
//! Identifiers use a *canonical* representation: **32 lowercase hexadecimal characters**
//! (no hyphens), the same value produced by `Uuid::new_v4().simple().to_string()`.
//!
//! - [`FileUuid::new`] allocates a fresh identifier.
//! - [`FileUuid::parse`] validates a stored or externally supplied value; non-canonical
//!   input (uppercase, hyphenated, wrong length, non-hex) is rejected.

mod file_uuid;

pub use file_uuid::FileUuid;

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
