//! Path resolution for file records.
//!
//! A record's storage path is derived once from `(id, md5sum, name)` and then frozen: it is
//! written to the record and the metadata store, and every later lookup reuses the stored
//! value. Renaming a record therefore never moves its bytes.

use crate::metadata::MetadataStore;
use crate::record::FileRecord;
use crate::StoreResult;
use filestore_files::layout;

/// Path a record would be stored at if it had not been resolved yet.
///
/// Pure; reads neither the disk nor the metadata store.
pub fn expected_path(record: &FileRecord, max_name_length: usize) -> String {
    layout::relative_path(
        record.id,
        &record.md5sum,
        record.name.as_str(),
        max_name_length,
    )
}

/// The stored path if there is one, the expected path otherwise.
pub fn stored_or_expected_path(record: &FileRecord, max_name_length: usize) -> String {
    record
        .path
        .clone()
        .unwrap_or_else(|| expected_path(record, max_name_length))
}

/// Returns the record's path, computing and persisting it first if it is still unset.
pub(crate) fn ensure_path_resolved<M: MetadataStore>(
    metadata: &M,
    record: &mut FileRecord,
    max_name_length: usize,
) -> StoreResult<String> {
    if let Some(path) = &record.path {
        return Ok(path.clone());
    }

    let path = expected_path(record, max_name_length);
    record.path = Some(path.clone());
    metadata.update(record)?;
    tracing::debug!("resolved path of file #{} to {}", record.id, path);

    Ok(path)
}
