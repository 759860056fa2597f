//! Error types for disk store operations

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum DiskCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage full: cannot store entry")]
    StorageFull,

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),
}

impl DiskCacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiskCacheError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

// Conversion to StorageError
impl From<DiskCacheError> for StorageError {
    fn from(err: DiskCacheError) -> Self {
        match err {
            DiskCacheError::Io(e) => StorageError::Io(e),
            DiskCacheError::Serialization(e) => StorageError::Index(e.to_string()),
            DiskCacheError::StorageFull => StorageError::StorageFull,
            DiskCacheError::IndexCorrupted(msg) => StorageError::Index(msg),
        }
    }
}
