//! Assigns external identifiers to rows created before identifiers existed.

use crate::cleanup::CLEANUP_PAGE_SIZE;
use crate::metadata::MetadataStore;
use crate::store::FileStore;
use crate::{StoreError, StoreResult};
use filestore_uuid::FileUuid;

impl<M: MetadataStore> FileStore<M> {
    /// Gives every row without a uuid a fresh one. Returns how many rows were updated.
    ///
    /// Works through the rows a page at a time; each update removes the row from the next
    /// page query, so the query always starts from the beginning.
    pub fn generate_missing_uuids(&self) -> StoreResult<usize> {
        let mut generated = 0;

        loop {
            let ids = self.metadata.ids_without_uuid(CLEANUP_PAGE_SIZE)?;
            if ids.is_empty() {
                break;
            }

            for id in ids {
                let mut record = self
                    .metadata
                    .get(id)?
                    .ok_or_else(|| StoreError::NotFound(format!("file #{}", id)))?;
                record.uuid = Some(FileUuid::new());
                self.metadata.update(&record)?;
                self.forget(id);
                generated += 1;
            }
        }

        tracing::info!("generated {} uuids", generated);
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::MetadataStore;
    use crate::store::tests::test_store;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_generate_missing_uuids() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        for i in 0..3 {
            store.store(&format!("{}.txt", i), b"x", None).unwrap();
        }

        assert_eq!(store.generate_missing_uuids().unwrap(), 3);
        assert_eq!(store.generate_missing_uuids().unwrap(), 0);

        let uuids: HashSet<String> = store
            .metadata()
            .page_ids(10, 0)
            .unwrap()
            .into_iter()
            .map(|id| {
                let record = store.metadata().get(id).unwrap().unwrap();
                record.uuid.unwrap().to_string()
            })
            .collect();
        assert_eq!(uuids.len(), 3);
    }

    #[test]
    fn test_generate_missing_uuids_spans_pages() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        for i in 0..105 {
            store.store(&format!("{}.txt", i), b"x", None).unwrap();
        }

        assert_eq!(store.generate_missing_uuids().unwrap(), 105);
        assert!(store.metadata().ids_without_uuid(10).unwrap().is_empty());
    }
}
