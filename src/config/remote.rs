//! Remote binary index configuration types.
//!
//! Candidates come from an HTTP JSON index (`index_url`), from a static list
//! of entries, or both; static entries are consulted first.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_REMOTE_TIMEOUT_SECS;

fn default_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

/// A candidate listed directly in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCandidateConfig {
    /// Canonical version string, e.g. `2.9.0-ubuntu-amd64`
    pub version: String,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// URL of the JSON product index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
    /// Timeout for index and artifact requests in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Verify the remote server's certificate and host name (default: false).
    /// Artifact integrity is checked against the content hash either way.
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<StaticCandidateConfig>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            index_url: None,
            timeout_secs: default_timeout_secs(),
            verify_tls: false,
            candidates: Vec::new(),
        }
    }
}
