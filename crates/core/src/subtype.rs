//! Subtype resolution.
//!
//! A stored file is always a [`FileRecord`]. Depending on its MIME type it may also be
//! treated as a picture, a PDF or an email, provided a handler for that kind is registered.
//! Classification is a pure function of the MIME type and the registry; building the
//! specialised value is the handler's job.

use crate::record::FileRecord;
use std::collections::HashMap;

const PICTURE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/tiff",
    "image/svg+xml",
    "image/webp",
];

const PDF_MIME_TYPES: &[&str] = &["application/pdf"];

const EMAIL_MIME_TYPES: &[&str] = &["message/rfc822"];

/// Kind of a stored file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Generic,
    Picture,
    Pdf,
    Email,
}

impl FileKind {
    /// Classifies a MIME type. Unknown or missing types are [`FileKind::Generic`].
    pub fn classify(mime_type: Option<&str>) -> Self {
        let Some(mime_type) = mime_type else {
            return FileKind::Generic;
        };
        let mime_type = mime_type.trim().to_ascii_lowercase();

        if PICTURE_MIME_TYPES.contains(&mime_type.as_str()) {
            FileKind::Picture
        } else if PDF_MIME_TYPES.contains(&mime_type.as_str()) {
            FileKind::Pdf
        } else if EMAIL_MIME_TYPES.contains(&mime_type.as_str()) {
            FileKind::Email
        } else {
            FileKind::Generic
        }
    }
}

/// Capabilities shared by every kind of stored file.
pub trait FileObject {
    fn record(&self) -> &FileRecord;

    fn kind(&self) -> FileKind;

    fn id(&self) -> i64 {
        self.record().id
    }
}

impl FileObject for FileRecord {
    fn record(&self) -> &FileRecord {
        self
    }

    fn kind(&self) -> FileKind {
        FileKind::Generic
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    record: FileRecord,
}

impl Picture {
    pub fn from_record(record: FileRecord) -> StoredFile {
        StoredFile::Picture(Self { record })
    }

    /// SVG pictures are markup rather than a raster image.
    pub fn is_vector(&self) -> bool {
        self.record.mime_type.as_deref() == Some("image/svg+xml")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdfDocument {
    record: FileRecord,
}

impl PdfDocument {
    pub fn from_record(record: FileRecord) -> StoredFile {
        StoredFile::Pdf(Self { record })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    record: FileRecord,
}

impl EmailMessage {
    pub fn from_record(record: FileRecord) -> StoredFile {
        StoredFile::Email(Self { record })
    }
}

macro_rules! impl_file_object {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl FileObject for $ty {
                fn record(&self) -> &FileRecord {
                    &self.record
                }

                fn kind(&self) -> FileKind {
                    $kind
                }
            }
        )*
    };
}

impl_file_object!(
    Picture => FileKind::Picture,
    PdfDocument => FileKind::Pdf,
    EmailMessage => FileKind::Email,
);

/// A file record resolved to its most specific registered kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredFile {
    File(FileRecord),
    Picture(Picture),
    Pdf(PdfDocument),
    Email(EmailMessage),
}

impl StoredFile {
    pub fn into_record(self) -> FileRecord {
        match self {
            StoredFile::File(record) => record,
            StoredFile::Picture(picture) => picture.record,
            StoredFile::Pdf(pdf) => pdf.record,
            StoredFile::Email(email) => email.record,
        }
    }

    pub fn as_picture(&self) -> Option<&Picture> {
        match self {
            StoredFile::Picture(picture) => Some(picture),
            _ => None,
        }
    }
}

impl FileObject for StoredFile {
    fn record(&self) -> &FileRecord {
        match self {
            StoredFile::File(record) => record,
            StoredFile::Picture(picture) => picture.record(),
            StoredFile::Pdf(pdf) => pdf.record(),
            StoredFile::Email(email) => email.record(),
        }
    }

    fn kind(&self) -> FileKind {
        match self {
            StoredFile::File(_) => FileKind::Generic,
            StoredFile::Picture(_) => FileKind::Picture,
            StoredFile::Pdf(_) => FileKind::Pdf,
            StoredFile::Email(_) => FileKind::Email,
        }
    }
}

/// Constructor that re-materialises a record as a specialised kind.
pub type Handler = fn(FileRecord) -> StoredFile;

/// Maps file kinds to the handler that builds them.
///
/// A kind without a handler resolves to a plain [`StoredFile::File`]; that is never an
/// error.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<FileKind, Handler>,
}

impl HandlerRegistry {
    /// Registry with no handlers; everything resolves as a generic file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the picture, PDF and email handlers installed.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::empty();
        registry.register(FileKind::Picture, Picture::from_record);
        registry.register(FileKind::Pdf, PdfDocument::from_record);
        registry.register(FileKind::Email, EmailMessage::from_record);
        registry
    }

    /// Installs a handler. Registering for [`FileKind::Generic`] has no effect.
    pub fn register(&mut self, kind: FileKind, handler: Handler) {
        if kind != FileKind::Generic {
            self.handlers.insert(kind, handler);
        }
    }

    pub fn unregister(&mut self, kind: FileKind) {
        self.handlers.remove(&kind);
    }

    /// The kind a MIME type resolves to with the handlers currently registered.
    pub fn classify(&self, mime_type: Option<&str>) -> FileKind {
        match FileKind::classify(mime_type) {
            kind if self.handlers.contains_key(&kind) => kind,
            _ => FileKind::Generic,
        }
    }

    pub fn resolve(&self, record: FileRecord) -> StoredFile {
        let kind = self.classify(record.mime_type.as_deref());
        match self.handlers.get(&kind) {
            Some(handler) => handler(record),
            None => StoredFile::File(record),
        }
    }
}

/// Resolved files keyed by id.
///
/// Entries are replaced whenever the store rewrites a record and dropped on deletion;
/// nothing expires on its own.
#[derive(Debug, Default)]
pub struct SubtypeCache {
    entries: HashMap<i64, StoredFile>,
}

impl SubtypeCache {
    pub fn get(&self, id: i64) -> Option<StoredFile> {
        self.entries.get(&id).cloned()
    }

    pub fn insert(&mut self, file: StoredFile) {
        self.entries.insert(file.id(), file);
    }

    pub fn invalidate(&mut self, id: i64) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
