//! Constants for the on-disk layout and filename policy.

/// Default upper bound for the sanitized part of a leaf filename.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 128;

/// Number of nested shard directories between the storage root and a file.
pub const SHARD_DEPTH: usize = 3;

/// Stem used when sanitizing strips every character of a name.
pub const FALLBACK_STEM: &str = "file";

/// Longest extension kept by the sanitizer.
pub const MAX_EXTENSION_LENGTH: usize = 16;

/// Folder created under a legacy store directory to hold files.
pub const LEGACY_FILE_FOLDER_NAME: &str = "file";

/// Replacement for characters outside the allowed filename set.
pub(crate) const PLACEHOLDER: char = '_';
