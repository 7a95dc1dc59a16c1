//! The file record and the inputs that create one.

use crate::subtype::FileKind;
use chrono::{DateTime, Utc};
use filestore_types::{Md5Hash, NonEmptyText};
use filestore_uuid::FileUuid;
use std::path::PathBuf;

/// Metadata row describing one stored file.
///
/// `id` is assigned by the metadata store and never changes. `path` stays `None` until the
/// storage path has been resolved and is never rewritten afterwards. `mime_type` and `size`
/// are only known once the bytes are on disk, so a record with any of the three unset is
/// still being created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub name: NonEmptyText,
    pub path: Option<String>,
    pub md5sum: Md5Hash,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub created: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub uuid: Option<FileUuid>,
}

impl FileRecord {
    pub fn kind(&self) -> FileKind {
        FileKind::classify(self.mime_type.as_deref())
    }

    pub fn is_picture(&self) -> bool {
        self.kind() == FileKind::Picture
    }

    pub fn is_pdf(&self) -> bool {
        self.kind() == FileKind::Pdf
    }

    pub fn is_email(&self) -> bool {
        self.kind() == FileKind::Email
    }

    /// True once path, MIME type and size have all been recorded.
    pub fn is_complete(&self) -> bool {
        self.path.is_some() && self.mime_type.is_some() && self.size.is_some()
    }

    /// True if the record is scheduled for expiry at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|expires| expires < now)
    }
}

/// Fields known before the first insert.
#[derive(Clone, Debug)]
pub struct NewFileRecord {
    pub name: NonEmptyText,
    pub md5sum: Md5Hash,
    pub created: DateTime<Utc>,
}

/// An upload whose bytes already sit in a temporary location.
#[derive(Clone, Debug)]
pub struct PendingUpload {
    /// Display name supplied by the uploader
    pub name: String,
    /// Temporary file holding the uploaded bytes; moved into place on success
    pub tmp_path: PathBuf,
    /// Size announced by the uploader; zero-sized entries are skipped by batch uploads
    pub size: u64,
}

impl PendingUpload {
    pub fn new(name: impl Into<String>, tmp_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            tmp_path: tmp_path.into(),
            size,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_record(id: i64, mime_type: Option<&str>) -> FileRecord {
        FileRecord {
            id,
            name: NonEmptyText::new("sample.bin").unwrap(),
            path: None,
            md5sum: Md5Hash::parse("5d41402abc4b2a76b9719d911017c592").unwrap(),
            mime_type: mime_type.map(str::to_owned),
            size: None,
            created: Utc::now(),
            expiration_date: None,
            uuid: None,
        }
    }

    #[test]
    fn test_kind_predicates() {
        assert!(sample_record(1, Some("image/png")).is_picture());
        assert!(sample_record(1, Some("application/pdf")).is_pdf());
        assert!(sample_record(1, Some("message/rfc822")).is_email());

        let generic = sample_record(1, Some("text/plain"));
        assert!(!generic.is_picture() && !generic.is_pdf() && !generic.is_email());
        assert_eq!(sample_record(1, None).kind(), FileKind::Generic);
    }

    #[test]
    fn test_is_expired_at() {
        let now = Utc::now();
        let mut record = sample_record(1, None);
        assert!(!record.is_expired_at(now));

        record.expiration_date = Some(now - Duration::minutes(1));
        assert!(record.is_expired_at(now));

        record.expiration_date = Some(now + Duration::minutes(1));
        assert!(!record.is_expired_at(now));
    }

    #[test]
    fn test_is_complete() {
        let mut record = sample_record(1, Some("text/plain"));
        assert!(!record.is_complete());
        record.path = Some("aa/bb/cc/1-sample.bin".into());
        record.size = Some(3);
        assert!(record.is_complete());
    }
}
