// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::version::{LegacyReleaseMap, VersionKey};

pub mod change_gate;
pub mod coalescing;
pub mod logging;
pub mod remote;
pub mod server;
pub mod storage;

pub use change_gate::ChangeGateConfig;
pub use coalescing::CoalescingConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use remote::{RemoteConfig, StaticCandidateConfig};
pub use server::ServerConfig;
pub use storage::{StorageBackendKind, StorageConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub change_gate: ChangeGateConfig,
    #[serde(default)]
    pub coalescing: CoalescingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Extra legacy series names mapped to release identifiers, layered on
    /// top of the built-in table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_series: Option<BTreeMap<String, String>>,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.scope.is_empty()
            || !self
                .server
                .scope
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(format!(
                "server.scope '{}' must be non-empty and contain only letters, digits and '-'",
                self.server.scope
            ));
        }

        if self.server.max_upload_size == 0 {
            return Err("server.max_upload_size must be greater than 0".to_string());
        }

        if self.storage.backend == StorageBackendKind::Disk && self.storage.dir.is_empty() {
            return Err("storage.dir is required for the disk backend".to_string());
        }

        if let Some(url) = &self.remote.index_url {
            if !is_http_url(url) {
                return Err(format!(
                    "remote.index_url '{}' must be an http:// or https:// URL",
                    url
                ));
            }
        }

        if self.remote.timeout_secs == 0 {
            return Err("remote.timeout_secs must be greater than 0".to_string());
        }

        for candidate in &self.remote.candidates {
            VersionKey::parse(&candidate.version).map_err(|e| {
                format!("remote.candidates: {}", e)
            })?;
            if !is_http_url(&candidate.url) {
                return Err(format!(
                    "remote.candidates '{}': url '{}' must be an http:// or https:// URL",
                    candidate.version, candidate.url
                ));
            }
            if !is_sha256_hex(&candidate.sha256) {
                return Err(format!(
                    "remote.candidates '{}': sha256 must be 64 lowercase hex characters",
                    candidate.version
                ));
            }
        }

        if let Some(series) = &self.legacy_series {
            for (name, release) in series {
                if name.is_empty() || release.is_empty() {
                    return Err("legacy_series entries must have non-empty names".to_string());
                }
                if !release
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric())
                {
                    return Err(format!(
                        "legacy_series '{}': release '{}' must be alphanumeric",
                        name, release
                    ));
                }
            }
        }

        Ok(())
    }

    /// Legacy series table: built-in entries plus any configured ones
    pub fn legacy_map(&self) -> LegacyReleaseMap {
        match &self.legacy_series {
            Some(overrides) => LegacyReleaseMap::with_overrides(overrides),
            None => LegacyReleaseMap::builtin(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}
