//! # Filestore Core
//!
//! Lifecycle of stored files: a metadata row per file plus its bytes below a sharded
//! storage root.
//!
//! - [`FileStore`] stores, uploads, merges, copies, reads and deletes files
//! - [`HandlerRegistry`] resolves records to pictures, PDFs or emails by MIME type
//! - expiry scheduling and the orphan and empty-directory cleanup passes
//! - [`SqliteMetadataStore`] keeps the `file` table
//!
//! Disk-level work (sanitising names, shard layout, MIME detection) lives in
//! `filestore-files`; this crate decides when it happens and keeps the metadata in step.
//!
//! **No CLI concerns**: argument parsing, environment variables and output formatting belong
//! in `filestore-cli`.

mod backfill;
pub mod cleanup;
pub mod config;
mod error;
mod expiration;
mod info;
pub mod metadata;
pub mod paths;
mod record;
mod store;
pub mod subtype;

pub use cleanup::{BatchReport, CleanupMode, CLEANUP_PAGE_SIZE, LEAF_MAX_DEPTH};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use expiration::DEFAULT_EXPIRATION_DELAY_HOURS;
pub use info::FileInfo;
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use record::{FileRecord, NewFileRecord, PendingUpload};
pub use store::FileStore;
pub use subtype::{
    EmailMessage, FileKind, FileObject, Handler, HandlerRegistry, PdfDocument, Picture,
    StoredFile,
};
