//! Storage error types
//!
//! This module defines error types for binary storage operations.

use thiserror::Error;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// No artifact stored under the requested version
    #[error("agent binaries {0} not found")]
    NotFound(String),

    /// I/O error from the underlying backend
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata index could not be read or written
    #[error("storage index error: {0}")]
    Index(String),

    /// Backend refused the write because it is out of space
    #[error("storage full: cannot store agent binaries")]
    StorageFull,

    /// A handle was closed more than once
    #[error("{0} already closed")]
    AlreadyClosed(&'static str),

    /// Two handles failed to close; the first error is the primary cause
    #[error("{first} (also: {second})")]
    CloseFailed {
        #[source]
        first: Box<StorageError>,
        second: Box<StorageError>,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Combine the results of closing two handles.
    ///
    /// The first failure is kept as the primary error; a second failure is
    /// attached to it instead of being dropped.
    pub fn combine(first: Result<(), StorageError>, second: Result<(), StorageError>) -> Result<(), StorageError> {
        match (first, second) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(first), Err(second)) => Err(StorageError::CloseFailed {
                first: Box::new(first),
                second: Box::new(second),
            }),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Index(err.to_string())
    }
}
