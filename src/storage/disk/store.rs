//! Disk-backed binary store

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use super::index::{IndexedArtifact, MetadataIndex};
use super::memory_backend::MemoryBackend;
use super::tokio_backend::TokioFsBackend;
use super::utils::{entries_dir, index_path};
use crate::storage::{
    ArtifactMetadata, ArtifactStream, StorageError, StorageProvider, ToolsStorage,
};

struct StoreInner {
    root: PathBuf,
    backend: Arc<dyn DiskBackend>,
    index: MetadataIndex,
    // Serializes index updates and snapshot writes
    write_lock: tokio::sync::Mutex<()>,
    open_handles: AtomicUsize,
}

/// Binary store keeping blobs in an entries directory and metadata in a
/// JSON index. Cheap to clone; clones share the same index.
#[derive(Clone)]
pub struct DiskStore {
    inner: Arc<StoreInner>,
}

impl DiskStore {
    /// Open (or create) a store rooted at `root` on the local filesystem
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, DiskCacheError> {
        Self::with_backend(root, Arc::new(TokioFsBackend::new())).await
    }

    /// In-memory store (nothing survives a restart)
    pub async fn in_memory() -> Result<Self, DiskCacheError> {
        Self::with_backend("/", Arc::new(MemoryBackend::new())).await
    }

    /// Open a store on an explicit backend.
    ///
    /// Loads the index snapshot and repairs it against the blobs present.
    pub async fn with_backend(
        root: impl AsRef<Path>,
        backend: Arc<dyn DiskBackend>,
    ) -> Result<Self, DiskCacheError> {
        let root = root.as_ref().to_path_buf();
        backend.create_dir_all(&entries_dir(&root)).await?;

        let index = MetadataIndex::load_from_file(&index_path(&root), backend.as_ref()).await?;
        let dropped = index
            .validate_and_repair(&entries_dir(&root), backend.as_ref())
            .await?;
        if dropped > 0 {
            index.save_to_file(&index_path(&root), backend.as_ref()).await?;
        }

        tracing::info!(
            root = %root.display(),
            entries = index.entry_count(),
            total_bytes = index.total_size(),
            dropped = dropped,
            "Binary store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                backend,
                index,
                write_lock: tokio::sync::Mutex::new(()),
                open_handles: AtomicUsize::new(0),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Number of storage handles handed out and not yet closed
    pub fn open_handles(&self) -> usize {
        self.inner.open_handles.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.index.entry_count()
    }

    pub fn total_size(&self) -> u64 {
        self.inner.index.total_size()
    }

    /// Create a request-scoped handle
    pub fn handle(&self) -> DiskToolsStorage {
        self.inner.open_handles.fetch_add(1, Ordering::SeqCst);
        DiskToolsStorage {
            inner: self.inner.clone(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StorageProvider for DiskStore {
    async fn tools_storage(&self) -> Result<Box<dyn ToolsStorage>, StorageError> {
        Ok(Box::new(self.handle()))
    }
}

/// Request-scoped handle onto a [`DiskStore`]
pub struct DiskToolsStorage {
    inner: Arc<StoreInner>,
    closed: AtomicBool,
}

impl DiskToolsStorage {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::AlreadyClosed("storage"));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolsStorage for DiskToolsStorage {
    async fn open(&self, version: &str) -> Result<(ArtifactMetadata, ArtifactStream), StorageError> {
        self.ensure_open()?;
        let entry = self
            .inner
            .index
            .get(version)
            .ok_or_else(|| StorageError::NotFound(version.to_string()))?;

        let blob_path = entries_dir(&self.inner.root).join(&entry.file_name);
        let stream = self.inner.backend.open_file(&blob_path).await?;
        Ok((entry.metadata, stream))
    }

    async fn all_metadata(&self) -> Result<Vec<ArtifactMetadata>, StorageError> {
        self.ensure_open()?;
        Ok(self.inner.index.all_metadata())
    }

    async fn add(&self, data: Bytes, metadata: ArtifactMetadata) -> Result<(), StorageError> {
        self.ensure_open()?;
        if data.len() as u64 != metadata.size {
            return Err(StorageError::Index(format!(
                "size mismatch storing {}: metadata says {} bytes, got {}",
                metadata.version,
                metadata.size,
                data.len()
            )));
        }

        let entry = IndexedArtifact::new(metadata);
        let dir = entries_dir(&self.inner.root);
        let blob_path = dir.join(&entry.file_name);
        let backend = self.inner.backend.as_ref();

        let _guard = self.inner.write_lock.lock().await;

        backend.write_file_atomic(&blob_path, data).await?;

        let key = entry.metadata.key();
        let file_name = entry.file_name.clone();
        let previous = self.inner.index.insert(entry);

        if let Err(e) = self
            .inner
            .index
            .save_to_file(&index_path(&self.inner.root), backend)
            .await
        {
            // Roll back so the failed write leaves no trace
            let blob_in_use = match previous {
                Some(old) => {
                    let shared = old.file_name == file_name;
                    self.inner.index.insert(old);
                    shared
                }
                None => {
                    self.inner.index.remove(&key);
                    false
                }
            };
            // Same key and content names the same blob the restored entry uses
            if !blob_in_use {
                let _ = backend.delete_file(&blob_path).await;
            }
            return Err(e.into());
        }

        if let Some(old) = previous {
            if old.file_name != file_name {
                let _ = backend.delete_file(&dir.join(&old.file_name)).await;
            }
        }

        tracing::debug!(version = %key, file = %file_name, "Stored agent binaries");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::AlreadyClosed("storage"));
        }
        self.inner.open_handles.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for DiskToolsStorage {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.inner.open_handles.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("Storage handle dropped without close");
        }
    }
}
