//! Reconciliation passes between the metadata store and the storage root.
//!
//! - [`FileStore::cleanup_orphans`] removes rows whose bytes are missing.
//! - [`FileStore::cleanup_leaves`] removes empty shard directories, children first.
//!
//! Both run to completion. A failure on one item is logged and recorded in the
//! [`BatchReport`], then the pass moves on. Both passes only check state at the moment they
//! look at an item; a file written between that check and the removal can still lose its
//! row or directory. Re-running a pass is always safe.

use crate::metadata::MetadataStore;
use crate::paths::stored_or_expected_path;
use crate::store::FileStore;
use crate::StoreResult;
use filestore_files::SHARD_DEPTH;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Rows fetched per metadata query.
pub const CLEANUP_PAGE_SIZE: usize = 100;

/// Deepest directory level visited by the leaf pass, matching the shard depth.
pub const LEAF_MAX_DEPTH: usize = SHARD_DEPTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupMode {
    /// Report what would be removed without changing anything
    DryRun,
    Execute,
}

impl CleanupMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, CleanupMode::DryRun)
    }
}

/// Outcome of one cleanup pass.
///
/// In dry-run mode `succeeded` lists what a real run would remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchReport<T> {
    pub dry_run: bool,
    pub succeeded: Vec<T>,
    pub failed: Vec<(T, String)>,
}

impl<T> BatchReport<T> {
    fn new(mode: CleanupMode) -> Self {
        Self {
            dry_run: mode.is_dry_run(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl<M: MetadataStore> FileStore<M> {
    /// Removes metadata rows (and their dependent rows) whose file is missing on disk.
    ///
    /// Ids are read in pages of [`CLEANUP_PAGE_SIZE`] and each row is loaded on its own. A
    /// row that cannot be decoded is reported as failed and skipped. Deleted rows shift later
    /// rows forward, so the offset only advances past rows that remain.
    pub fn cleanup_orphans(&self, mode: CleanupMode) -> StoreResult<BatchReport<i64>> {
        let files = self.files()?;
        let max_name_length = self.config().max_name_length();
        let mut report = BatchReport::new(mode);
        let mut offset = 0;

        loop {
            let ids = self.metadata.page_ids(CLEANUP_PAGE_SIZE, offset)?;
            let fetched = ids.len();

            for id in ids {
                let record = match self.metadata.get(id) {
                    Ok(Some(record)) => record,
                    // Gone since the page was read; it no longer occupies an offset.
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("cannot read file #{}: {}", id, e);
                        report.failed.push((id, e.to_string()));
                        offset += 1;
                        continue;
                    }
                };

                let relative = stored_or_expected_path(&record, max_name_length);
                if files.exists(&relative) {
                    offset += 1;
                    continue;
                }

                if mode.is_dry_run() {
                    tracing::info!("file #{} ({}) not found", record.id, relative);
                    report.succeeded.push(record.id);
                    offset += 1;
                    continue;
                }

                tracing::info!("file #{} ({}) not found; deleting", record.id, relative);
                match self.metadata.delete(record.id) {
                    Ok(_) => {
                        self.forget(record.id);
                        report.succeeded.push(record.id);
                    }
                    Err(e) => {
                        tracing::warn!("failed to delete file #{}: {}", record.id, e);
                        report.failed.push((record.id, e.to_string()));
                        offset += 1;
                    }
                }
            }

            if fetched < CLEANUP_PAGE_SIZE {
                break;
            }
        }

        tracing::info!(
            "orphan cleanup{}: {} removed, {} failed",
            if report.dry_run { " (dry run)" } else { "" },
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Removes empty directories below the storage root, down to [`LEAF_MAX_DEPTH`] levels.
    ///
    /// Children are visited before their parents, so a parent emptied by this pass is
    /// removed in the same run. The storage root itself is never removed. A dry run
    /// reports the same directories a real run would remove.
    pub fn cleanup_leaves(&self, mode: CleanupMode) -> StoreResult<BatchReport<PathBuf>> {
        let root = self.files()?.root_directory();
        let mut report = BatchReport::new(mode);
        let mut removed: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(LEAF_MAX_DEPTH)
            .contents_first(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    tracing::warn!("cannot walk {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();

            match remaining_entries(dir, &removed) {
                Ok(0) => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("cannot read {}: {}", dir.display(), e);
                    report.failed.push((dir.to_path_buf(), e.to_string()));
                    continue;
                }
            }

            if mode.is_dry_run() {
                tracing::info!("{}", dir.display());
            } else if let Err(e) = fs::remove_dir(dir) {
                tracing::warn!("cannot remove {}: {}", dir.display(), e);
                report.failed.push((dir.to_path_buf(), e.to_string()));
                continue;
            } else {
                tracing::debug!("removed {}", dir.display());
            }

            removed.insert(dir.to_path_buf());
            report.succeeded.push(dir.to_path_buf());
        }

        tracing::info!(
            "leaf cleanup{}: {} removed, {} failed",
            if report.dry_run { " (dry run)" } else { "" },
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Entries of `dir` that are not already (or, in a dry run, notionally) removed.
fn remaining_entries(dir: &Path, removed: &HashSet<PathBuf>) -> io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        if !removed.contains(&entry?.path()) {
            count += 1;
        }
    }
    Ok(count)
}
