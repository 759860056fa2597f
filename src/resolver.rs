//! Version resolution across legacy series names
//!
//! Inside the legacy window (major 2, minor <= 8) agents may ask for a
//! series-named binary (`2.8.0-trusty-amd64`) that is stored under its
//! release name (`2.8.0-ubuntu-amd64`), or the other way around. Outside the
//! window only exact matches count.

use std::sync::Arc;

use crate::storage::ArtifactMetadata;
use crate::version::{LegacyReleaseMap, VersionKey};

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Key to open in the local store
    pub storage_version: VersionKey,
    /// Normalized release to write under if the stored entry has to be
    /// fetched again; `None` for exact matches
    pub override_release: Option<String>,
}

impl Resolution {
    fn exact(version: VersionKey) -> Self {
        Self {
            storage_version: version,
            override_release: None,
        }
    }

    /// Key a re-fetched artifact is written under
    pub fn write_version(&self) -> VersionKey {
        match &self.override_release {
            Some(release) => self.storage_version.with_release(release.clone()),
            None => self.storage_version.clone(),
        }
    }
}

/// Maps requested versions onto stored ones
#[derive(Debug, Clone)]
pub struct VersionResolver {
    legacy: Arc<LegacyReleaseMap>,
}

impl VersionResolver {
    pub fn new(legacy: Arc<LegacyReleaseMap>) -> Self {
        Self { legacy }
    }

    pub fn legacy(&self) -> &LegacyReleaseMap {
        &self.legacy
    }

    /// Requested key with its release normalized, when inside the legacy
    /// window; otherwise the key unchanged
    pub fn normalized(&self, requested: &VersionKey) -> VersionKey {
        if !requested.in_legacy_window() {
            return requested.clone();
        }
        requested.with_release(self.legacy.normalize(&requested.release))
    }

    /// Pick the stored entry serving `requested`.
    ///
    /// An entry equal to the requested key wins outright. Otherwise, inside
    /// the legacy window, every entry with the same number and arch whose
    /// normalized release equals the requested normalized release is a
    /// candidate and the last one in `available` order is used.
    pub fn resolve(
        &self,
        requested: &VersionKey,
        available: &[ArtifactMetadata],
    ) -> Option<Resolution> {
        let wanted = requested.to_string();

        if !requested.in_legacy_window() {
            return available
                .iter()
                .find(|m| m.key() == wanted)
                .map(|m| Resolution::exact(m.version.clone()));
        }

        let normalized_release = self.legacy.normalize(&requested.release);
        let mut candidates: Vec<&VersionKey> = Vec::new();

        for meta in available {
            if meta.key() == wanted {
                tracing::debug!(version = %wanted, "Exact stored match for requested version");
                return Some(Resolution::exact(meta.version.clone()));
            }
            let stored = &meta.version;
            if stored.number == requested.number
                && stored.arch == requested.arch
                && self.legacy.normalize(&stored.release) == normalized_release
            {
                candidates.push(stored);
            }
        }

        let chosen = (*candidates.last()?).clone();
        if candidates.len() > 1 {
            let names: Vec<String> = candidates.iter().map(|v| v.to_string()).collect();
            tracing::warn!(
                requested = %wanted,
                candidates = ?names,
                chosen = %chosen,
                "Several stored binaries match requested version, using the last"
            );
        } else {
            tracing::debug!(
                requested = %wanted,
                chosen = %chosen,
                "Using release-compatible stored binaries"
            );
        }

        Some(Resolution {
            storage_version: chosen,
            override_release: Some(normalized_release.to_string()),
        })
    }
}
