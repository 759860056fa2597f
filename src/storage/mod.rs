//! Local binary store
//!
//! Agent binaries are stored under their canonical version string together
//! with an [`ArtifactMetadata`] record. Writes are verified by the caller;
//! reads trust what was written.

pub mod disk;
pub mod error;
pub mod metadata;
pub mod reader;
pub mod traits;

pub use disk::DiskStore;
pub use error::StorageError;
pub use metadata::ArtifactMetadata;
pub use traits::{ArtifactReader, ArtifactStream, StorageProvider, ToolsStorage};

use crate::config::{StorageBackendKind, StorageConfig};

/// Open the store described by the storage configuration
pub async fn open_store(config: &StorageConfig) -> Result<DiskStore, StorageError> {
    let store = match config.backend {
        StorageBackendKind::Disk => DiskStore::open(&config.dir).await?,
        StorageBackendKind::Memory => DiskStore::in_memory().await?,
    };
    Ok(store)
}
