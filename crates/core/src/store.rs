//! File lifecycle: store, upload, merge, copy, read and delete.
//!
//! Creating a file is a two-phase protocol:
//!
//! 1. insert a metadata row (name, content hash, created) to obtain the id
//! 2. resolve the storage path from that id, put the bytes there, then record the detected
//!    MIME type and size
//!
//! A failure in phase 2 leaves the row from phase 1 behind. No rollback is attempted; the
//! orphan cleanup pass removes such rows.

use crate::config::StoreConfig;
use crate::info::FileInfo;
use crate::metadata::{format_timestamp, MetadataStore};
use crate::paths::{ensure_path_resolved, stored_or_expected_path};
use crate::record::{FileRecord, NewFileRecord, PendingUpload};
use crate::subtype::{FileObject, HandlerRegistry, StoredFile, SubtypeCache};
use crate::{StoreError, StoreResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use filestore_files::{
    concatenate_into_scratch, digest, human_size, tidy_display_name, FilesService,
    InferMimeDetector, MimeDetector, SHARD_DEPTH,
};
use filestore_types::{Md5Hash, NonEmptyText};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Entry point for every operation on stored files.
pub struct FileStore<M> {
    config: StoreConfig,
    files: Option<FilesService>,
    pub(crate) metadata: M,
    detector: Box<dyn MimeDetector>,
    handlers: HandlerRegistry,
    cache: RefCell<SubtypeCache>,
}

impl<M: MetadataStore> FileStore<M> {
    /// Creates a store with the `infer` based MIME detector and the built-in subtype
    /// handlers.
    ///
    /// An unconfigured storage root is accepted here; the operations that need it fail
    /// with [`StoreError::Configuration`] instead.
    pub fn new(config: StoreConfig, metadata: M) -> StoreResult<Self> {
        let files = match config.storage_root() {
            Ok(root) => Some(FilesService::new(root)?),
            Err(_) => None,
        };

        Ok(Self {
            config,
            files,
            metadata,
            detector: Box::new(InferMimeDetector),
            handlers: HandlerRegistry::with_builtin_handlers(),
            cache: RefCell::new(SubtypeCache::default()),
        })
    }

    pub fn with_mime_detector(mut self, detector: Box<dyn MimeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self.cache.borrow_mut().clear();
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub(crate) fn files(&self) -> StoreResult<&FilesService> {
        self.files.as_ref().ok_or_else(|| {
            StoreError::Configuration("no storage root has been configured".into())
        })
    }

    /// Stores `content` under the display name `name`.
    pub fn store(
        &self,
        name: &str,
        content: &[u8],
        created: Option<DateTime<Utc>>,
    ) -> StoreResult<StoredFile> {
        let files = self.files()?;
        let md5sum = digest::hash_bytes(content);

        self.create(name, md5sum, created, |relative| {
            Ok(files.write(relative, content)?)
        })
    }

    /// Moves an uploaded temporary file into the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UploadFailed`] when the temporary file is missing or cannot be
    /// moved.
    pub fn upload(&self, upload: &PendingUpload) -> StoreResult<StoredFile> {
        let files = self.files()?;

        if upload.tmp_path.as_os_str().is_empty() || !upload.tmp_path.is_file() {
            return Err(StoreError::UploadFailed(format!(
                "temporary file '{}' for '{}' is missing",
                upload.tmp_path.display(),
                upload.name
            )));
        }

        let md5sum = digest::hash_file(&upload.tmp_path).map_err(|e| {
            StoreError::UploadFailed(format!(
                "cannot read temporary file {}: {}",
                upload.tmp_path.display(),
                e
            ))
        })?;

        self.create(&upload.name, md5sum, None, |relative| {
            files
                .move_into(&upload.tmp_path, relative)
                .map_err(|e| StoreError::UploadFailed(e.to_string()))
        })
    }

    /// Uploads every entry with a non-zero announced size, in order.
    ///
    /// Stops at the first failure. Files stored before the failure stay stored.
    pub fn upload_multiple(&self, batch: &[PendingUpload]) -> StoreResult<Vec<StoredFile>> {
        batch
            .iter()
            .filter(|upload| upload.size > 0)
            .map(|upload| self.upload(upload))
            .collect()
    }

    /// Stores the concatenated content of `sources`, in order, as a new file.
    ///
    /// Concatenation happens in the scratch directory; the result is moved into place in
    /// one step, so the final location never holds partial content.
    pub fn merge<F: FileObject>(&self, name: &str, sources: &[F]) -> StoreResult<StoredFile> {
        let files = self.files()?;
        if sources.is_empty() {
            return Err(StoreError::InvalidInput(
                "merge needs at least one source file".into(),
            ));
        }

        let source_paths = sources
            .iter()
            .map(|source| self.absolute_path(source))
            .collect::<StoreResult<Vec<PathBuf>>>()?;

        let scratch = concatenate_into_scratch(&source_paths, &self.config.scratch_dir())?;
        let md5sum = digest::hash_file(&scratch)?;

        let merged = self.create(name, md5sum, None, |relative| {
            Ok(files.move_into(&scratch, relative)?)
        })?;
        tracing::debug!(
            "merged {} files into file #{}",
            sources.len(),
            merged.id()
        );
        Ok(merged)
    }

    /// Stores a copy of `file`'s content as a new, unrelated file.
    pub fn copy<F: FileObject>(&self, file: &F, new_name: Option<&str>) -> StoreResult<StoredFile> {
        let content = self.get_contents(file)?;
        let name = new_name.unwrap_or(file.record().name.as_str());
        self.store(name, &content, None)
    }

    /// Deletes the metadata row, then the bytes, then any shard directories left empty.
    ///
    /// Both the row and the bytes are always attempted. Pruning never reaches above the
    /// shard directories.
    pub fn delete<F: FileObject>(&self, file: &F) -> StoreResult<()> {
        let files = self.files()?;
        let record = file.record();
        let relative = stored_or_expected_path(record, self.config.max_name_length());

        self.cache.borrow_mut().invalidate(record.id);

        let metadata_result = self.metadata.delete(record.id);
        let disk_result = files.remove(&relative).map_err(StoreError::from);

        if let Ok(removed) = &disk_result {
            if !removed {
                tracing::warn!("file #{} had no bytes at {}", record.id, relative);
            }
            for dir in files.prune_empty_ancestors(&relative, SHARD_DEPTH) {
                tracing::debug!("removed empty directory {}", dir.display());
            }
        }

        match (metadata_result, disk_result) {
            (Ok(_), Ok(_)) => {
                tracing::info!("deleted file #{}", record.id);
                Ok(())
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(metadata), Err(disk)) => Err(StoreError::DeleteFailed {
                id: record.id,
                metadata: Box::new(metadata),
                disk: Box::new(disk),
            }),
        }
    }

    /// Returns the record's storage path, resolving and persisting it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if no storage root is configured.
    pub fn resolve_path(&self, record: &mut FileRecord) -> StoreResult<String> {
        self.files()?;
        ensure_path_resolved(&self.metadata, record, self.config.max_name_length())
    }

    /// Absolute location of a file's bytes.
    pub fn absolute_path<F: FileObject>(&self, file: &F) -> StoreResult<PathBuf> {
        let relative = stored_or_expected_path(file.record(), self.config.max_name_length());
        Ok(self.files()?.absolute_path(&relative)?)
    }

    pub fn get_by_id(&self, id: i64) -> StoreResult<StoredFile> {
        if self.config.cache_resolved() {
            if let Some(cached) = self.cache.borrow().get(id) {
                return Ok(cached);
            }
        }

        let record = self
            .metadata
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("file #{}", id)))?;
        Ok(self.materialize(record))
    }

    /// Reads the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the bytes are missing on disk.
    pub fn get_contents<F: FileObject>(&self, file: &F) -> StoreResult<Vec<u8>> {
        let relative = stored_or_expected_path(file.record(), self.config.max_name_length());
        Ok(self.files()?.read(&relative)?)
    }

    /// Summary of a file, with its content base64-encoded unless `exclude_content` is set.
    pub fn get_info<F: FileObject>(&self, file: &F, exclude_content: bool) -> StoreResult<FileInfo> {
        let record = file.record();
        let content = if exclude_content {
            None
        } else {
            Some(general_purpose::STANDARD.encode(self.get_contents(file)?))
        };

        Ok(FileInfo {
            id: record.id,
            name: record.name.to_string(),
            mime_type: record.mime_type.clone(),
            size: record.size,
            created: format_timestamp(record.created),
            human_size: record.size.map(human_size),
            content,
        })
    }

    /// Resolves a record to its registered kind and refreshes the cache entry.
    pub(crate) fn materialize(&self, record: FileRecord) -> StoredFile {
        let resolved = self.handlers.resolve(record);
        if self.config.cache_resolved() {
            self.cache.borrow_mut().insert(resolved.clone());
        }
        resolved
    }

    pub(crate) fn forget(&self, id: i64) {
        self.cache.borrow_mut().invalidate(id);
    }

    fn create<P>(
        &self,
        name: &str,
        md5sum: Md5Hash,
        created: Option<DateTime<Utc>>,
        place: P,
    ) -> StoreResult<StoredFile>
    where
        P: FnOnce(&str) -> StoreResult<PathBuf>,
    {
        let name = display_name(name)?;
        let mut record = self.metadata.insert(&NewFileRecord {
            name,
            md5sum,
            created: created.unwrap_or_else(Utc::now),
        })?;

        let relative = self.resolve_path(&mut record)?;
        let absolute = place(&relative)?;

        self.record_content_details(&mut record, &absolute)?;
        self.metadata.update(&record)?;

        tracing::info!(
            "stored file #{} ({}, {} bytes) at {}",
            record.id,
            record.mime_type.as_deref().unwrap_or("unknown"),
            record.size.unwrap_or_default(),
            relative
        );
        Ok(self.materialize(record))
    }

    fn record_content_details(&self, record: &mut FileRecord, absolute: &Path) -> StoreResult<()> {
        record.mime_type = Some(self.detector.detect(absolute)?);
        record.size = Some(std::fs::metadata(absolute)?.len());
        Ok(())
    }
}

fn display_name(name: &str) -> StoreResult<NonEmptyText> {
    NonEmptyText::new(tidy_display_name(name))
        .map_err(|_| StoreError::InvalidInput("file name cannot be empty".into()))
}
