//! Filestore disk layer
//!
//! This crate owns everything that touches the storage root directly: turning display names
//! into safe filenames, deriving the sharded location of a file, hashing content, detecting
//! MIME types and the handful of disk primitives the lifecycle code is built from.
//!
//! It knows nothing about the metadata store. Callers hand it record identity (numeric id,
//! content hash, display name) and get back paths and bytes.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! └── d4/                 # content hash characters 0..2
//!     └── 1d/             # content hash characters 2..4
//!         └── 8c/         # content hash characters 4..6
//!             └── 42-quarterly_report.pdf   # <id>-<sanitized name>
//! ```
//!
//! Three levels of two hex characters keep every directory at 256 entries or fewer. The id
//! prefix on the leaf name means identical content stored twice lands in two separate files.
//!
//! ## Example Usage
//!
//! ```no_run
//! use filestore_files::{layout, FilesService};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("/var/lib/filestore"))?;
//! let hash = filestore_files::digest::hash_bytes(b"hello");
//! let relative = layout::relative_path(42, &hash, "Hello World.TXT", 128);
//! service.write(&relative, b"hello")?;
//! # Ok(())
//! # }
//! ```

mod constants;
pub mod digest;
mod files;
pub mod layout;
pub mod mime;
pub mod sanitize;
pub mod size;

pub use constants::{
    DEFAULT_MAX_NAME_LENGTH, FALLBACK_STEM, LEGACY_FILE_FOLDER_NAME, MAX_EXTENSION_LENGTH,
    SHARD_DEPTH,
};
pub use files::{concatenate_into_scratch, FilesService};
pub use mime::{InferMimeDetector, MimeDetector};
pub use sanitize::{sanitize, tidy_display_name};
pub use size::human_size;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (absolute path or directory traversal)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Expected file is missing on disk
    #[error("File not found: {}", .0.display())]
    NotFound(std::path::PathBuf),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for disk operations.
pub type FilesResult<T> = Result<T, FilesError>;
