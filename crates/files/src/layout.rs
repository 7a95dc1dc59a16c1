//! Deterministic placement of a file below the storage root.

use crate::sanitize::sanitize;
use filestore_types::Md5Hash;

/// Relative directory for a content hash: `<hh>/<hh>/<hh>`.
pub fn shard_dir(hash: &Md5Hash) -> String {
    hash.shard_segments().join("/")
}

/// Leaf filename: `<id>-<sanitized name>`.
pub fn leaf_name(id: i64, name: &str, max_name_length: usize) -> String {
    format!("{}-{}", id, sanitize(name, max_name_length))
}

/// Relative path of a record: `<hh>/<hh>/<hh>/<id>-<sanitized name>`.
///
/// This is a pure function of its inputs. Callers persist the result once and keep using
/// the stored value, so later renames never move a file.
pub fn relative_path(id: i64, hash: &Md5Hash, name: &str, max_name_length: usize) -> String {
    format!(
        "{}/{}",
        shard_dir(hash),
        leaf_name(id, name, max_name_length)
    )
}
