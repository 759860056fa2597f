//! In-memory disk backend (HashMap storage)
//!
//! Used for the `memory` storage mode and throughout the test suite. Fault
//! injection switches simulate a full disk or permission failures.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use crate::storage::reader::BytesReader;
use crate::storage::ArtifactStream;

/// Backend that stores files in memory
#[derive(Clone, Default)]
pub struct MemoryBackend {
    files: Arc<RwLock<HashMap<PathBuf, Bytes>>>,
    directories: Arc<RwLock<Vec<PathBuf>>>,
    /// Simulate errors if true
    simulate_storage_full: Arc<RwLock<bool>>,
    simulate_permission_denied: Arc<RwLock<bool>>,
    failing_path: Arc<RwLock<Option<PathBuf>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable storage full simulation for testing
    pub fn set_storage_full(&self, enabled: bool) {
        *self.simulate_storage_full.write() = enabled;
    }

    /// Enable permission denied simulation for testing
    pub fn set_permission_denied(&self, enabled: bool) {
        *self.simulate_permission_denied.write() = enabled;
    }

    /// Fail every write to `path` until cleared with `None`
    pub fn set_write_failure(&self, path: Option<PathBuf>) {
        *self.failing_path.write() = path;
    }

    /// Get number of stored files
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// Paths of all stored files
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    fn check_permission(&self) -> Result<(), DiskCacheError> {
        if *self.simulate_permission_denied.read() {
            return Err(DiskCacheError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Simulated permission denied",
            )));
        }
        Ok(())
    }

    fn not_found() -> DiskCacheError {
        DiskCacheError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ))
    }
}

#[async_trait]
impl DiskBackend for MemoryBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, DiskCacheError> {
        self.check_permission()?;
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn open_file(&self, path: &Path) -> Result<ArtifactStream, DiskCacheError> {
        let data = self.read_file(path).await?;
        Ok(Box::new(BytesReader::new(data)))
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DiskCacheError> {
        if *self.simulate_storage_full.read() {
            return Err(DiskCacheError::StorageFull);
        }
        self.check_permission()?;
        if self.failing_path.read().as_deref() == Some(path) {
            return Err(DiskCacheError::Io(std::io::Error::other(
                "Simulated write failure",
            )));
        }

        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }

        self.files.write().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DiskCacheError> {
        self.check_permission()?;
        self.files.write().remove(path);
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DiskCacheError> {
        self.check_permission()?;
        let mut dirs = self.directories.write();
        if !dirs.iter().any(|d| d == path) {
            dirs.push(path.to_path_buf());
        }
        Ok(())
    }

    async fn file_size(&self, path: &Path) -> Result<u64, DiskCacheError> {
        self.check_permission()?;
        self.files
            .read()
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(Self::not_found)
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DiskCacheError> {
        self.check_permission()?;
        let files = self.files.read();
        Ok(files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}
