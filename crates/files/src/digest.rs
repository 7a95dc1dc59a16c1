//! Content hashing.
//!
//! The digest is computed once, at creation, from the exact bytes that end up on disk.

use filestore_types::Md5Hash;
use md5::{Digest, Md5};
use std::fs;
use std::io;
use std::path::Path;

/// Hashes an in-memory buffer.
pub fn hash_bytes(content: &[u8]) -> Md5Hash {
    let digest: [u8; 16] = Md5::digest(content).into();
    Md5Hash::from_bytes(&digest)
}

/// Hashes a file by streaming it, without loading it into memory.
pub fn hash_file(path: &Path) -> io::Result<Md5Hash> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    let digest: [u8; 16] = hasher.finalize().into();
    Ok(Md5Hash::from_bytes(&digest))
}
