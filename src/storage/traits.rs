//! Storage trait definitions
//!
//! [`StorageProvider`] hands out request-scoped [`ToolsStorage`] handles.
//! Every handle, and every [`ArtifactReader`] opened through it, must be
//! closed exactly once; closing twice is reported as an error.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::metadata::ArtifactMetadata;

/// Readable byte stream over one stored artifact
#[async_trait]
pub trait ArtifactReader: AsyncRead + Send + Unpin {
    /// Release the stream
    async fn close(&mut self) -> Result<(), StorageError>;
}

/// Boxed artifact stream as returned by storage
pub type ArtifactStream = Box<dyn ArtifactReader>;

/// Request-scoped handle onto the binary store
#[async_trait]
pub trait ToolsStorage: Send + Sync {
    /// Open the artifact stored under `version`
    /// Returns `StorageError::NotFound` if nothing is stored under that key
    async fn open(&self, version: &str) -> Result<(ArtifactMetadata, ArtifactStream), StorageError>;

    /// Metadata for every stored artifact, in a stable order
    async fn all_metadata(&self) -> Result<Vec<ArtifactMetadata>, StorageError>;

    /// Store `data` under `metadata.version`
    /// Overwrites an existing entry for the same key
    async fn add(&self, data: Bytes, metadata: ArtifactMetadata) -> Result<(), StorageError>;

    /// Release the handle
    async fn close(&self) -> Result<(), StorageError>;
}

/// Source of storage handles
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn tools_storage(&self) -> Result<Box<dyn ToolsStorage>, StorageError>;
}
