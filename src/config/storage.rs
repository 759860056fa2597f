//! Storage configuration types.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_STORAGE_DIR;

fn default_dir() -> String {
    DEFAULT_STORAGE_DIR.to_string()
}

/// Where stored binaries live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Blob files and index on the local filesystem
    #[default]
    Disk,
    /// In-process map, lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Root directory for the disk backend
    #[serde(default = "default_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            dir: default_dir(),
        }
    }
}
