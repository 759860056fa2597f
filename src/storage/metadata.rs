//! Stored artifact metadata

use serde::{Deserialize, Serialize};

use crate::version::VersionKey;

/// Metadata recorded alongside every stored agent binary.
///
/// Size and hash are checked when the artifact is written and trusted on
/// every later read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Version the artifact is stored under
    pub version: VersionKey,
    /// Exact size of the stored bytes
    pub size: u64,
    /// Lowercase hex SHA-256 of the stored bytes
    pub sha256: String,
}

impl ArtifactMetadata {
    pub fn new(version: VersionKey, size: u64, sha256: impl Into<String>) -> Self {
        Self {
            version,
            size,
            sha256: sha256.into(),
        }
    }

    /// Storage key (canonical version string)
    pub fn key(&self) -> String {
        self.version.to_string()
    }
}
