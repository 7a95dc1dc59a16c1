use filestore_files::FilesError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("filestore is not properly configured: {0}")]
    Configuration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("metadata store error: {0}")]
    Metadata(#[from] rusqlite::Error),
    #[error("uuid error: {0}")]
    Uuid(#[from] filestore_uuid::UuidError),
    #[error("delete of file #{id} failed: metadata={metadata}; disk={disk}")]
    DeleteFailed {
        id: i64,
        metadata: Box<StoreError>,
        disk: Box<StoreError>,
    },
}

impl From<FilesError> for StoreError {
    fn from(error: FilesError) -> Self {
        match error {
            FilesError::InvalidRootDirectory(message) => StoreError::Configuration(message),
            FilesError::NotFound(path) => StoreError::NotFound(path.display().to_string()),
            FilesError::InvalidPath(message) => StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                message,
            )),
            FilesError::Io(e) => StoreError::Io(e),
        }
    }
}

impl From<filestore_types::TextError> for StoreError {
    fn from(error: filestore_types::TextError) -> Self {
        StoreError::InvalidInput(error.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
