//! Metadata store for file records.
//!
//! The lifecycle code only talks to [`MetadataStore`]. [`SqliteMetadataStore`] is the
//! bundled implementation; it keeps one `file` table and optionally clears dependent tables
//! (for example `picture.file_id`) together with a file row.

use crate::record::{FileRecord, NewFileRecord};
use crate::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use filestore_types::{Md5Hash, NonEmptyText};
use filestore_uuid::FileUuid;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// Timestamp format of the `created` and `expiration_date` columns (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FILE_COLUMNS: &str =
    "id, name, path, md5sum, mime_type, size, created, expiration_date, uuid";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    path TEXT,
    md5sum TEXT NOT NULL,
    mime_type TEXT,
    size INTEGER,
    created TEXT NOT NULL,
    expiration_date TEXT,
    uuid TEXT
);
CREATE INDEX IF NOT EXISTS file_expiration_date ON file (expiration_date);
CREATE UNIQUE INDEX IF NOT EXISTS file_uuid ON file (uuid);
";

/// Row-level access to file records.
pub trait MetadataStore {
    /// Persists a new row and returns it with its assigned id.
    fn insert(&self, new_record: &NewFileRecord) -> StoreResult<FileRecord>;

    fn get(&self, id: i64) -> StoreResult<Option<FileRecord>>;

    /// Rewrites every mutable column of an existing row.
    fn update(&self, record: &FileRecord) -> StoreResult<()>;

    /// Sets or clears the expiration date of a row, leaving every other column alone.
    fn set_expiration(
        &self,
        id: i64,
        expiration_date: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Deletes a row and its dependent rows. Returns `false` if no row had this id.
    fn delete(&self, id: i64) -> StoreResult<bool>;

    /// Row ids in ascending order, `LIMIT limit OFFSET offset`.
    ///
    /// Only ids are read, so a row that fails to decode cannot hide the rows after it.
    fn page_ids(&self, limit: usize, offset: usize) -> StoreResult<Vec<i64>>;

    /// Ids of rows whose expiration date is set and strictly before `now`.
    fn expired_ids(&self, now: DateTime<Utc>) -> StoreResult<Vec<i64>>;

    /// Up to `limit` ids of rows without a uuid, lowest first.
    fn ids_without_uuid(&self, limit: usize) -> StoreResult<Vec<i64>>;
}

/// A table whose rows reference `file.id` and go away with the file.
#[derive(Clone, Debug)]
struct DependentTable {
    table: String,
    column: String,
}

/// SQLite-backed [`MetadataStore`].
#[derive(Debug)]
pub struct SqliteMetadataStore {
    conn: Connection,
    dependents: Vec<DependentTable>,
}

impl SqliteMetadataStore {
    /// Opens (or creates) a database file and ensures the `file` table exists.
    ///
    /// `picture.file_id` is registered as a dependent table.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        let store = Self {
            conn,
            dependents: Vec::new(),
        };
        store.with_dependent_table("picture", "file_id")
    }

    /// Registers a table whose rows are deleted together with the file they reference.
    ///
    /// Tables that do not exist in the database are skipped at delete time.
    pub fn with_dependent_table(mut self, table: &str, column: &str) -> StoreResult<Self> {
        for identifier in [table, column] {
            let valid = !identifier.is_empty()
                && identifier
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(StoreError::InvalidInput(format!(
                    "invalid SQL identifier '{}'",
                    identifier
                )));
            }
        }

        if !self.dependents.iter().any(|d| d.table == table) {
            self.dependents.push(DependentTable {
                table: table.to_owned(),
                column: column.to_owned(),
            });
        }
        Ok(self)
    }

    /// Underlying connection, for callers that maintain their own tables.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn insert(&self, new_record: &NewFileRecord) -> StoreResult<FileRecord> {
        self.conn.execute(
            "INSERT INTO file (name, md5sum, created) VALUES (?1, ?2, ?3)",
            params![
                new_record.name.as_str(),
                new_record.md5sum.as_str(),
                format_timestamp(new_record.created),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?.ok_or_else(|| {
            StoreError::NotFound(format!("file #{} vanished after insert", id))
        })
    }

    fn get(&self, id: i64) -> StoreResult<Option<FileRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM file WHERE id = ?1", FILE_COLUMNS),
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn update(&self, record: &FileRecord) -> StoreResult<()> {
        let size = record
            .size
            .map(i64::try_from)
            .transpose()
            .map_err(|_| StoreError::InvalidInput(format!("file #{} is too large", record.id)))?;

        let changed = self.conn.execute(
            "UPDATE file SET name = ?1, path = ?2, mime_type = ?3, size = ?4,
                expiration_date = ?5, uuid = ?6
             WHERE id = ?7",
            params![
                record.name.as_str(),
                record.path,
                record.mime_type,
                size,
                record.expiration_date.map(format_timestamp),
                record.uuid.as_ref().map(|uuid| uuid.to_string()),
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("file #{}", record.id)));
        }
        Ok(())
    }

    fn set_expiration(
        &self,
        id: i64,
        expiration_date: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE file SET expiration_date = ?1 WHERE id = ?2",
            params![expiration_date.map(format_timestamp), id],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("file #{}", id)));
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;

        for dependent in &self.dependents {
            if Self::table_exists(&tx, &dependent.table)? {
                tx.execute(
                    &format!(
                        "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
                        dependent.table, dependent.column
                    ),
                    params![id],
                )?;
            }
        }
        let deleted = tx.execute("DELETE FROM file WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(deleted > 0)
    }

    fn page_ids(&self, limit: usize, offset: usize) -> StoreResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM file ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let ids = stmt
            .query_map(params![to_sql_count(limit), to_sql_count(offset)], |row| {
                row.get(0)
            })?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn expired_ids(&self, now: DateTime<Utc>) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM file
             WHERE expiration_date IS NOT NULL AND expiration_date < ?1
             ORDER BY id",
        )?;
        let ids = stmt
            .query_map(params![format_timestamp(now)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn ids_without_uuid(&self, limit: usize) -> StoreResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM file WHERE uuid IS NULL ORDER BY id LIMIT ?1")?;
        let ids = stmt
            .query_map(params![to_sql_count(limit)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn conversion_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

#[derive(Debug, thiserror::Error)]
#[error("invalid stored value '{0}'")]
struct InvalidColumn(String);

fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|value| parse_timestamp(&value).ok_or_else(|| conversion_error(index, InvalidColumn(value))))
        .transpose()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let name: String = row.get(1)?;
    let md5sum: String = row.get(3)?;
    let size: Option<i64> = row.get(5)?;
    let uuid: Option<String> = row.get(8)?;

    let created = timestamp_column(row, 6)?
        .ok_or_else(|| conversion_error(6, InvalidColumn("NULL".into())))?;

    Ok(FileRecord {
        id: row.get(0)?,
        name: NonEmptyText::new(&name).map_err(|e| conversion_error(1, e))?,
        path: row.get(2)?,
        md5sum: Md5Hash::parse(&md5sum).map_err(|e| conversion_error(3, e))?,
        mime_type: row.get(4)?,
        size: size
            .map(u64::try_from)
            .transpose()
            .map_err(|e| conversion_error(5, e))?,
        created,
        expiration_date: timestamp_column(row, 7)?,
        uuid: uuid
            .map(|value| FileUuid::parse(&value))
            .transpose()
            .map_err(|e| conversion_error(8, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Timelike};

    fn new_record(name: &str) -> NewFileRecord {
        NewFileRecord {
            name: NonEmptyText::new(name).unwrap(),
            md5sum: Md5Hash::parse("5d41402abc4b2a76b9719d911017c592").unwrap(),
            created: Utc::now(),
        }
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let first = store.insert(&new_record("a.txt")).unwrap();
        let second = store.insert(&new_record("a.txt")).unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.path, None);
        assert_eq!(first.mime_type, None);
        assert_eq!(first.size, None);
        assert_eq!(first.created.nanosecond(), 0);
    }

    #[test]
    fn test_update_and_get() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let mut record = store.insert(&new_record("report.pdf")).unwrap();

        record.path = Some("5d/41/40/1-report.pdf".into());
        record.mime_type = Some("application/pdf".into());
        record.size = Some(1234);
        record.uuid = Some(FileUuid::new());
        store.update(&record).unwrap();

        assert_eq!(store.get(record.id).unwrap(), Some(record));
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let mut record = store.insert(&new_record("a")).unwrap();
        store.delete(record.id).unwrap();

        record.size = Some(1);
        assert!(matches!(store.update(&record), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_clears_dependent_rows() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("CREATE TABLE picture (id INTEGER PRIMARY KEY, file_id INTEGER)")
            .unwrap();
        let record = store.insert(&new_record("photo.jpg")).unwrap();
        store
            .connection()
            .execute("INSERT INTO picture (file_id) VALUES (?1)", params![record.id])
            .unwrap();

        assert!(store.delete(record.id).unwrap());
        assert!(!store.delete(record.id).unwrap());

        let remaining: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM picture", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(store.get(record.id).unwrap(), None);
    }

    #[test]
    fn test_dependent_table_rejects_bad_identifier() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let result = store.with_dependent_table("picture; DROP TABLE file", "file_id");
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_page_is_ordered_and_bounded() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.insert(&new_record(&format!("{}.txt", i))).unwrap();
        }

        let first = store.page_ids(2, 0).unwrap();
        let last = store.page_ids(2, 4).unwrap();

        assert_eq!(first.len(), 2);
        assert!(first[0] < first[1]);
        assert_eq!(last.len(), 1);
        assert!(store.page_ids(2, 5).unwrap().is_empty());
    }

    #[test]
    fn test_set_expiration_touches_only_that_column() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let mut record = store.insert(&new_record("keep.txt")).unwrap();
        record.path = Some("5d/41/40/1-keep.txt".into());
        record.uuid = Some(FileUuid::new());
        store.update(&record).unwrap();

        let when = parse_timestamp("2030-01-01 08:00:00").unwrap();
        store.set_expiration(record.id, Some(when)).unwrap();

        let stored = store.get(record.id).unwrap().unwrap();
        assert_eq!(stored.expiration_date, Some(when));
        assert_eq!(stored.path, record.path);
        assert_eq!(stored.uuid, record.uuid);

        store.set_expiration(record.id, None).unwrap();
        assert_eq!(store.get(record.id).unwrap().unwrap().expiration_date, None);
    }

    #[test]
    fn test_set_expiration_missing_row_is_not_found() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        assert!(matches!(
            store.set_expiration(99, None),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_expired_ids_strictly_before_now() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let now = Utc::now();

        let mut past = store.insert(&new_record("past")).unwrap();
        past.expiration_date = Some(now - Duration::hours(1));
        store.update(&past).unwrap();

        let mut future = store.insert(&new_record("future")).unwrap();
        future.expiration_date = Some(now + Duration::hours(1));
        store.update(&future).unwrap();

        store.insert(&new_record("never")).unwrap();

        assert_eq!(store.expired_ids(now).unwrap(), vec![past.id]);
    }

    #[test]
    fn test_ids_without_uuid() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let mut with_uuid = store.insert(&new_record("a")).unwrap();
        with_uuid.uuid = Some(FileUuid::new());
        store.update(&with_uuid).unwrap();
        let without = store.insert(&new_record("b")).unwrap();

        assert_eq!(store.ids_without_uuid(100).unwrap(), vec![without.id]);
    }

    #[test]
    fn test_corrupt_row_is_metadata_error() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO file (name, md5sum, created) VALUES ('x', 'not-a-hash', '2024-01-01 00:00:00')",
                [],
            )
            .unwrap();
        let id = store.connection().last_insert_rowid();

        assert!(matches!(store.get(id), Err(StoreError::Metadata(_))));
        assert_eq!(store.page_ids(10, 0).unwrap(), vec![id]);
    }

    #[test]
    fn test_timestamp_round_trip_format() {
        let parsed = parse_timestamp("2024-02-29 13:45:07").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-02-29 13:45:07");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
