//! Expiry scheduling. Collecting expired files is left to an external reaper, which lists
//! them with [`FileStore::get_expired`] and deletes them.

use crate::metadata::MetadataStore;
use crate::store::FileStore;
use crate::subtype::{FileObject, StoredFile};
use crate::{StoreError, StoreResult};
use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Delay used by [`FileStore::expire`] when the caller gives none.
pub const DEFAULT_EXPIRATION_DELAY_HOURS: i64 = 2;

impl<M: MetadataStore> FileStore<M> {
    /// Schedules `file` to expire `delay` from now (two hours by default).
    ///
    /// Only the expiration date is written. The returned file is read back from the
    /// metadata store, so it also reflects changes made since `file` was loaded.
    pub fn expire<F: FileObject>(&self, file: &F, delay: Option<Duration>) -> StoreResult<StoredFile> {
        let delay = delay.unwrap_or_else(|| Duration::hours(DEFAULT_EXPIRATION_DELAY_HOURS));
        let expiration_date = (Utc::now() + delay).trunc_subsecs(0);

        let expiring = self.write_expiration(file.id(), Some(expiration_date))?;
        tracing::debug!("file #{} expires at {}", file.id(), expiration_date);
        Ok(expiring)
    }

    pub fn cancel_expiration<F: FileObject>(&self, file: &F) -> StoreResult<StoredFile> {
        self.write_expiration(file.id(), None)
    }

    fn write_expiration(
        &self,
        id: i64,
        expiration_date: Option<DateTime<Utc>>,
    ) -> StoreResult<StoredFile> {
        self.metadata.set_expiration(id, expiration_date)?;
        let record = self
            .metadata
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("file #{}", id)))?;
        Ok(self.materialize(record))
    }

    /// Files whose expiration date is set and already past. Order is unspecified.
    pub fn get_expired(&self) -> StoreResult<Vec<StoredFile>> {
        let ids = self.metadata.expired_ids(Utc::now())?;

        let mut expired = Vec::with_capacity(ids.len());
        for id in ids {
            match self.metadata.get(id)? {
                Some(record) => expired.push(self.materialize(record)),
                None => return Err(StoreError::NotFound(format!("file #{}", id))),
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::MetadataStore;
    use crate::store::tests::test_store;
    use crate::subtype::FileObject;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_expire_defaults_to_two_hours() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        let file = store.store("a.txt", b"a", None).unwrap();

        let before = Utc::now();
        let expiring = store.expire(&file, None).unwrap();
        let expires = expiring.record().expiration_date.unwrap();

        assert!(expires >= before + Duration::hours(2) - Duration::seconds(1));
        assert!(expires <= Utc::now() + Duration::hours(2));
        assert!(store.get_expired().unwrap().is_empty());
    }

    #[test]
    fn test_get_expired_only_returns_past_dates() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        let past = store.store("past.txt", b"1", None).unwrap();
        let future = store.store("future.txt", b"2", None).unwrap();
        let _never = store.store("never.txt", b"3", None).unwrap();

        store.expire(&past, Some(Duration::hours(-1))).unwrap();
        store.expire(&future, Some(Duration::hours(1))).unwrap();

        let expired: Vec<i64> = store
            .get_expired()
            .unwrap()
            .iter()
            .map(|file| file.id())
            .collect();
        assert_eq!(expired, vec![past.id()]);
    }

    #[test]
    fn test_cancel_expiration() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        let file = store.store("a.txt", b"a", None).unwrap();

        let expiring = store.expire(&file, Some(Duration::minutes(-5))).unwrap();
        assert_eq!(store.get_expired().unwrap().len(), 1);

        let cancelled = store.cancel_expiration(&expiring).unwrap();
        assert_eq!(cancelled.record().expiration_date, None);
        assert!(store.get_expired().unwrap().is_empty());
        assert_eq!(
            store.metadata().get(file.id()).unwrap().unwrap().expiration_date,
            None
        );
    }

    #[test]
    fn test_expire_with_stale_file_keeps_newer_columns() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        let stale = store.store("a.txt", b"a", None).unwrap();
        assert_eq!(store.generate_missing_uuids().unwrap(), 1);
        let assigned = store.metadata().get(stale.id()).unwrap().unwrap().uuid;
        assert!(assigned.is_some());

        let expiring = store.expire(&stale, None).unwrap();
        assert_eq!(expiring.record().uuid, assigned);
        assert_eq!(
            store.metadata().get(stale.id()).unwrap().unwrap().uuid,
            assigned
        );

        let cancelled = store.cancel_expiration(&stale).unwrap();
        assert_eq!(cancelled.record().uuid, assigned);
        assert_eq!(cancelled.record().expiration_date, None);
        assert_eq!(
            store.metadata().get(stale.id()).unwrap().unwrap().uuid,
            assigned
        );
    }

    #[test]
    fn test_expire_deleted_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        let file = store.store("a.txt", b"a", None).unwrap();
        store.delete(&file).unwrap();

        assert!(matches!(
            store.expire(&file, None),
            Err(crate::StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_expire_updates_cached_file() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        let file = store.store("a.txt", b"a", None).unwrap();

        store.expire(&file, None).unwrap();

        assert!(store
            .get_by_id(file.id())
            .unwrap()
            .record()
            .expiration_date
            .is_some());
    }
}
