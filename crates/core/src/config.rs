//! Storage configuration.
//!
//! Resolved once at process start-up and handed to [`crate::FileStore::new`]. Nothing in the
//! core reads environment variables; that is left to the binary.

use crate::{StoreError, StoreResult};
use filestore_files::{DEFAULT_MAX_NAME_LENGTH, LEGACY_FILE_FOLDER_NAME};
use std::path::{Path, PathBuf};

/// Configuration for a [`crate::FileStore`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    storage_root: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    max_name_length: usize,
    cache_resolved: bool,
}

impl StoreConfig {
    /// Configuration rooted at an existing directory.
    ///
    /// The root is canonicalised here so every later path is derived from the same absolute
    /// location.
    pub fn new(storage_root: impl AsRef<Path>) -> StoreResult<Self> {
        let storage_root = storage_root.as_ref();
        if !storage_root.is_dir() {
            return Err(StoreError::Configuration(format!(
                "storage root {} does not exist or is not a directory",
                storage_root.display()
            )));
        }

        let storage_root = storage_root.canonicalize().map_err(|e| {
            StoreError::Configuration(format!(
                "cannot resolve storage root {}: {}",
                storage_root.display(),
                e
            ))
        })?;

        Ok(Self {
            storage_root: Some(storage_root),
            ..Self::unconfigured()
        })
    }

    /// Configuration using the deprecated store directory option.
    ///
    /// Files live in the `file` folder below `store_dir`, which is created when missing.
    pub fn from_store_dir(store_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let store_dir = store_dir.as_ref();
        if !store_dir.is_dir() {
            return Err(StoreError::Configuration(format!(
                "store directory {} does not exist or is not a directory",
                store_dir.display()
            )));
        }

        let root = store_dir.join(LEGACY_FILE_FOLDER_NAME);
        std::fs::create_dir_all(&root)?;
        Self::new(root)
    }

    /// Configuration without a storage root. Every storage operation fails with
    /// [`StoreError::Configuration`].
    pub fn unconfigured() -> Self {
        Self {
            storage_root: None,
            scratch_dir: None,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            cache_resolved: true,
        }
    }

    pub fn with_scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.scratch_dir = Some(scratch_dir);
        self
    }

    pub fn with_max_name_length(mut self, max_name_length: usize) -> Self {
        self.max_name_length = max_name_length.max(1);
        self
    }

    pub fn with_cache_resolved(mut self, cache_resolved: bool) -> Self {
        self.cache_resolved = cache_resolved;
        self
    }

    /// The canonical storage root.
    pub fn storage_root(&self) -> StoreResult<&Path> {
        self.storage_root.as_deref().ok_or_else(|| {
            StoreError::Configuration("no storage root has been configured".into())
        })
    }

    /// Directory used for merge scratch files; the system temporary directory by default.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_name_length(&self) -> usize {
        self.max_name_length
    }

    pub fn cache_resolved(&self) -> bool {
        self.cache_resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_canonicalises_root() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("store");
        std::fs::create_dir(&nested).unwrap();

        let config = StoreConfig::new(nested.join("..").join("store")).unwrap();

        assert_eq!(config.storage_root().unwrap(), nested.canonicalize().unwrap());
        assert_eq!(config.max_name_length(), DEFAULT_MAX_NAME_LENGTH);
        assert!(config.cache_resolved());
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let result = StoreConfig::new(temp.path().join("missing"));
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[test]
    fn test_unconfigured_root_is_configuration_error() {
        let config = StoreConfig::unconfigured();
        assert!(matches!(
            config.storage_root(),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_store_dir_uses_file_folder() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::from_store_dir(temp.path()).unwrap();

        let expected = temp.path().join("file").canonicalize().unwrap();
        assert_eq!(config.storage_root().unwrap(), expected);
    }

    #[test]
    fn test_scratch_dir_defaults_to_temp() {
        let config = StoreConfig::unconfigured();
        assert_eq!(config.scratch_dir(), std::env::temp_dir());

        let config = config.with_scratch_dir(PathBuf::from("/srv/scratch"));
        assert_eq!(config.scratch_dir(), PathBuf::from("/srv/scratch"));
    }
}
