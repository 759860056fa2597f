//! Utility functions for the disk store

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::constants::{ENTRIES_DIR, INDEX_FILE};

/// Convert a version key to a SHA256 hash for use as a filename
pub fn key_to_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Blob file name for a version and content hash.
///
/// Including the content hash means an overwrite never touches the file an
/// existing index entry points at.
pub fn blob_file_name(key: &str, sha256: &str) -> String {
    format!("{}-{}.data", key_to_hash(key), sha256)
}

pub fn entries_dir(root: &Path) -> PathBuf {
    root.join(ENTRIES_DIR)
}

pub fn index_path(root: &Path) -> PathBuf {
    root.join(INDEX_FILE)
}
