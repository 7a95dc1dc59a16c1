//! Storage-root scoped disk operations
//!
//! [`FilesService`] is bound to one canonicalised storage root and resolves every relative
//! path against it. It never decides *where* a file goes (see [`crate::layout`]); it only
//! writes, moves, reads and removes at the paths it is given.
//!
//! # Safety Model
//!
//! - The root is canonicalised once at construction
//! - Relative paths must consist of plain components; absolute paths and `..` are rejected
//! - Directory pruning stops at the root and never removes it

use crate::{FilesError, FilesResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;

/// Service for the bytes of stored files below one storage root.
#[derive(Debug, Clone)]
pub struct FilesService {
    /// Canonicalised storage root
    root_directory: PathBuf,
}

impl FilesService {
    /// Creates a new `FilesService` for an existing storage root.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> FilesResult<Self> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Returns the canonicalised storage root.
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Resolves a stored relative path against the root.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] for empty or absolute paths and for paths that
    /// contain anything other than plain components.
    pub fn absolute_path(&self, relative: &str) -> FilesResult<PathBuf> {
        let candidate = Path::new(relative);
        let plain = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if relative.is_empty() || !plain {
            return Err(FilesError::InvalidPath(format!(
                "Stored path must be relative to the storage root: '{}'",
                relative
            )));
        }

        Ok(self.root_directory.join(candidate))
    }

    /// Returns true if a regular file exists at `relative`.
    pub fn exists(&self, relative: &str) -> bool {
        self.absolute_path(relative)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Writes `content` to `relative`, creating intermediate directories.
    pub fn write(&self, relative: &str, content: &[u8]) -> FilesResult<PathBuf> {
        let destination = self.absolute_path(relative)?;
        ensure_parent(&destination)?;

        fs::write(&destination, content).map_err(|e| {
            FilesError::Io(io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", destination.display(), e),
            ))
        })?;

        Ok(destination)
    }

    /// Moves an existing file into place at `relative`, creating intermediate directories.
    pub fn move_into(&self, source: &Path, relative: &str) -> FilesResult<PathBuf> {
        let destination = self.absolute_path(relative)?;
        ensure_parent(&destination)?;

        move_file(source, &destination).map_err(|e| {
            FilesError::Io(io::Error::new(
                e.kind(),
                format!(
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    e
                ),
            ))
        })?;

        Ok(destination)
    }

    /// Reads the full content of a stored file.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] if no file exists at `relative`.
    pub fn read(&self, relative: &str) -> FilesResult<Vec<u8>> {
        let path = self.absolute_path(relative)?;
        if !path.is_file() {
            return Err(FilesError::NotFound(path));
        }

        fs::read(&path).map_err(|e| {
            FilesError::Io(io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", path.display(), e),
            ))
        })
    }

    /// Removes a stored file. Returns `false` if there was nothing to remove.
    pub fn remove(&self, relative: &str) -> FilesResult<bool> {
        let path = self.absolute_path(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::Io(io::Error::new(
                e.kind(),
                format!("Failed to remove {}: {}", path.display(), e),
            ))),
        }
    }

    /// Removes the directory holding `relative` and up to `levels - 1` of its ancestors,
    /// innermost first, for as long as each one is empty.
    ///
    /// Stops at the first non-empty directory or at the storage root, which is never
    /// removed. Failures end the walk quietly: pruning is an optimisation and the leaf
    /// directory cleanup pass picks up anything left behind.
    pub fn prune_empty_ancestors(&self, relative: &str, levels: usize) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        let Ok(path) = self.absolute_path(relative) else {
            return removed;
        };

        let mut current = path.parent().map(Path::to_path_buf);
        for _ in 0..levels {
            let Some(dir) = current else { break };
            if dir == self.root_directory || !dir.starts_with(&self.root_directory) {
                break;
            }

            match is_empty_dir(&dir) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::debug!("cannot inspect {}: {}", dir.display(), e);
                    break;
                }
            }

            if let Err(e) = fs::remove_dir(&dir) {
                tracing::debug!("cannot remove {}: {}", dir.display(), e);
                break;
            }

            current = dir.parent().map(Path::to_path_buf);
            removed.push(dir);
        }

        removed
    }
}

/// Moves a file, falling back to copy-and-remove when a rename is not possible (for example
/// across filesystems).
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    copy_into_place(source, destination)?;
    if let Err(e) = fs::remove_file(source) {
        if let Err(cleanup) = fs::remove_file(destination) {
            tracing::warn!(
                "cannot remove {} after failed move: {}",
                destination.display(),
                cleanup
            );
        }
        return Err(e);
    }

    Ok(())
}

/// Copies `source` into a temporary sibling of `destination` and renames it into place.
///
/// `destination` either ends up with the full contents or is left untouched.
fn copy_into_place(source: &Path, destination: &Path) -> io::Result<()> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut input = fs::File::open(source)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".incoming-")
        .tempfile_in(parent)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file_mut().sync_all()?;
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

/// Concatenates `sources`, in order, into a fresh temporary file inside `scratch_dir`.
///
/// The returned [`TempPath`] deletes the scratch file when dropped, so a caller that fails
/// before moving it into place leaves nothing behind.
///
/// # Errors
///
/// Returns [`FilesError::NotFound`] if any source is missing.
pub fn concatenate_into_scratch(sources: &[PathBuf], scratch_dir: &Path) -> FilesResult<TempPath> {
    fs::create_dir_all(scratch_dir)?;

    let mut scratch = tempfile::Builder::new()
        .prefix("merge-")
        .tempfile_in(scratch_dir)?;

    for source in sources {
        let mut input = fs::File::open(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FilesError::NotFound(source.clone()),
            _ => FilesError::Io(e),
        })?;
        io::copy(&mut input, scratch.as_file_mut())?;
    }

    scratch.as_file_mut().flush()?;
    Ok(scratch.into_temp_path())
}

fn ensure_parent(path: &Path) -> FilesResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            FilesError::Io(io::Error::new(
                e.kind(),
                format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ),
            ))
        })?;
    }
    Ok(())
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> FilesService {
        let root = temp.path().join("store");
        fs::create_dir_all(&root).unwrap();
        FilesService::new(&root).unwrap()
    }

    #[test]
    fn test_new_root_not_exists() {
        let temp = TempDir::new().unwrap();
        let result = FilesService::new(&temp.path().join("missing"));
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let result = FilesService::new(&root);
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_absolute_path_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        assert!(matches!(
            service.absolute_path("../escape"),
            Err(FilesError::InvalidPath(_))
        ));
        assert!(matches!(
            service.absolute_path("/etc/passwd"),
            Err(FilesError::InvalidPath(_))
        ));
        assert!(matches!(
            service.absolute_path(""),
            Err(FilesError::InvalidPath(_))
        ));
        assert!(service.absolute_path("ab/cd/ef/1-a.txt").is_ok());
    }

    #[test]
    fn test_write_read_remove() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let written = service.write("ab/cd/ef/1-a.txt", b"Hello, World!").unwrap();
        assert!(written.starts_with(service.root_directory()));
        assert!(service.exists("ab/cd/ef/1-a.txt"));
        assert_eq!(service.read("ab/cd/ef/1-a.txt").unwrap(), b"Hello, World!");

        assert!(service.remove("ab/cd/ef/1-a.txt").unwrap());
        assert!(!service.remove("ab/cd/ef/1-a.txt").unwrap());
        assert!(matches!(
            service.read("ab/cd/ef/1-a.txt"),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    fn test_move_into_consumes_source() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let source = temp.path().join("upload.tmp");
        fs::write(&source, b"uploaded").unwrap();

        service.move_into(&source, "11/22/33/5-upload.bin").unwrap();

        assert!(!source.exists());
        assert_eq!(service.read("11/22/33/5-upload.bin").unwrap(), b"uploaded");
    }

    #[test]
    fn test_copy_into_place_leaves_no_staging_files() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.bin");
        let target_dir = temp.path().join("target");
        fs::create_dir_all(&target_dir).unwrap();
        let destination = target_dir.join("7-copy.bin");
        fs::write(&source, b"copied across devices").unwrap();
        fs::write(&destination, b"stale").unwrap();

        copy_into_place(&source, &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"copied across devices");
        assert!(source.exists());
        let names: Vec<_> = fs::read_dir(&target_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("7-copy.bin")]);
    }

    #[test]
    fn test_copy_into_place_failure_leaves_destination_absent() {
        let temp = TempDir::new().unwrap();
        let target_dir = temp.path().join("target");
        fs::create_dir_all(&target_dir).unwrap();
        let destination = target_dir.join("7-copy.bin");

        let result = copy_into_place(&temp.path().join("missing"), &destination);

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
        assert!(!destination.exists());
        assert_eq!(fs::read_dir(&target_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_move_file_missing_source_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("moved.bin");

        assert!(move_file(&temp.path().join("missing"), &destination).is_err());
        assert!(!destination.exists());
    }

    #[test]
    fn test_prune_stops_at_non_empty_and_root() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        service.write("aa/bb/cc/1-a.txt", b"a").unwrap();
        service.write("aa/dd/ee/2-b.txt", b"b").unwrap();

        service.remove("aa/bb/cc/1-a.txt").unwrap();
        let removed = service.prune_empty_ancestors("aa/bb/cc/1-a.txt", 3);

        let root = service.root_directory();
        assert_eq!(removed, vec![root.join("aa/bb/cc"), root.join("aa/bb")]);
        assert!(root.join("aa").is_dir());
        assert!(root.join("aa/dd/ee/2-b.txt").is_file());
    }

    #[test]
    fn test_prune_never_removes_root() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        service.write("aa/bb/cc/1-a.txt", b"a").unwrap();
        service.remove("aa/bb/cc/1-a.txt").unwrap();

        let removed = service.prune_empty_ancestors("aa/bb/cc/1-a.txt", 10);

        assert_eq!(removed.len(), 3);
        assert!(service.root_directory().is_dir());
    }

    #[test]
    fn test_concatenate_into_scratch() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("one");
        let second = temp.path().join("two");
        fs::write(&first, b"abc").unwrap();
        fs::write(&second, b"def").unwrap();
        let scratch_dir = temp.path().join("scratch");

        let merged = concatenate_into_scratch(&[first, second], &scratch_dir).unwrap();

        assert!(merged.starts_with(&scratch_dir));
        assert_eq!(fs::read(&merged).unwrap(), b"abcdef");
    }

    #[test]
    fn test_concatenate_missing_source_cleans_up() {
        let temp = TempDir::new().unwrap();
        let scratch_dir = temp.path().join("scratch");

        let result = concatenate_into_scratch(&[temp.path().join("missing")], &scratch_dir);

        assert!(matches!(result, Err(FilesError::NotFound(_))));
        assert_eq!(fs::read_dir(&scratch_dir).unwrap().count(), 0);
    }
}
