//! Metadata index management

use super::backend::DiskBackend;
use super::error::DiskCacheError;
use super::utils::blob_file_name;
use crate::constants::INDEX_FORMAT_VERSION;
use crate::storage::ArtifactMetadata;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// One stored artifact as recorded in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedArtifact {
    pub metadata: ArtifactMetadata,
    /// Blob file name inside the entries directory
    pub file_name: String,
    pub stored_at: DateTime<Utc>,
}

impl IndexedArtifact {
    pub fn new(metadata: ArtifactMetadata) -> Self {
        let file_name = blob_file_name(&metadata.key(), &metadata.sha256);
        Self {
            metadata,
            file_name,
            stored_at: Utc::now(),
        }
    }
}

/// Thread-safe in-memory index of stored artifacts, ordered by version key
pub struct MetadataIndex {
    entries: RwLock<BTreeMap<String, IndexedArtifact>>,
    total_size: AtomicU64,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            total_size: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<IndexedArtifact> {
        self.entries.read().get(key).cloned()
    }

    /// Insert an entry, returning the one it replaced
    pub fn insert(&self, entry: IndexedArtifact) -> Option<IndexedArtifact> {
        let size = entry.metadata.size;
        let previous = self.entries.write().insert(entry.metadata.key(), entry);
        self.total_size.fetch_add(size, Ordering::SeqCst);
        if let Some(ref old) = previous {
            self.total_size.fetch_sub(old.metadata.size, Ordering::SeqCst);
        }
        previous
    }

    pub fn remove(&self, key: &str) -> Option<IndexedArtifact> {
        let removed = self.entries.write().remove(key);
        if let Some(ref entry) = removed {
            self.total_size
                .fetch_sub(entry.metadata.size, Ordering::SeqCst);
        }
        removed
    }

    /// Metadata for all entries in key order
    pub fn all_metadata(&self) -> Vec<ArtifactMetadata> {
        self.entries
            .read()
            .values()
            .map(|e| e.metadata.clone())
            .collect()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Save index to JSON file
    pub async fn save_to_file(
        &self,
        path: &Path,
        backend: &dyn DiskBackend,
    ) -> Result<(), DiskCacheError> {
        let entries: Vec<IndexedArtifact> = self.entries.read().values().cloned().collect();

        let snapshot = IndexSnapshot {
            entries,
            version: INDEX_FORMAT_VERSION,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        backend.write_file_atomic(path, Bytes::from(json)).await?;

        Ok(())
    }

    /// Load index from JSON file
    ///
    /// A missing file yields an empty index. A file that cannot be parsed is
    /// logged and also yields an empty index.
    pub async fn load_from_file(
        path: &Path,
        backend: &dyn DiskBackend,
    ) -> Result<Self, DiskCacheError> {
        let data = match backend.read_file(path).await {
            Ok(d) => d,
            Err(e) if e.is_not_found() => return Ok(Self::new()),
            Err(e) => return Err(e),
        };

        let snapshot: IndexSnapshot = match serde_json::from_slice(&data) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse storage index, starting with empty index"
                );
                return Ok(Self::new());
            }
        };

        if snapshot.version != INDEX_FORMAT_VERSION {
            return Err(DiskCacheError::IndexCorrupted(format!(
                "unsupported index version {}",
                snapshot.version
            )));
        }

        let index = Self::new();
        for entry in snapshot.entries {
            index.insert(entry);
        }
        Ok(index)
    }

    /// Validate and repair the index by scanning the entries directory.
    ///
    /// Entries whose blob is missing or has the wrong size are dropped.
    /// Blob files no entry points at, and leftover temp files, are deleted.
    /// Returns the number of entries dropped.
    pub async fn validate_and_repair(
        &self,
        entries_dir: &Path,
        backend: &dyn DiskBackend,
    ) -> Result<usize, DiskCacheError> {
        let files = match backend.read_dir(entries_dir).await {
            Ok(f) => f,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let snapshot: Vec<IndexedArtifact> = self.entries.read().values().cloned().collect();
        let referenced: HashSet<&str> = snapshot.iter().map(|e| e.file_name.as_str()).collect();

        for file_path in &files {
            let Some(file_name) = file_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.ends_with(".tmp") || !referenced.contains(file_name) {
                tracing::debug!(file = %file_path.display(), "Removing unreferenced storage file");
                let _ = backend.delete_file(file_path).await;
            }
        }

        let mut dropped = 0;
        for entry in &snapshot {
            let blob_path = entries_dir.join(&entry.file_name);
            let valid = match backend.file_size(&blob_path).await {
                Ok(size) => size == entry.metadata.size,
                Err(_) => false,
            };
            if !valid {
                tracing::warn!(
                    version = %entry.metadata.version,
                    file = %blob_path.display(),
                    "Dropping index entry with missing or truncated blob"
                );
                self.remove(&entry.metadata.key());
                let _ = backend.delete_file(&blob_path).await;
                dropped += 1;
            }
        }

        Ok(dropped)
    }
}

impl Default for MetadataIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of the index
#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    entries: Vec<IndexedArtifact>,
    version: u32,
}
