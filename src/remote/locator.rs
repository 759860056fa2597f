//! Remote locator implementations

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{http_client, CandidateDescriptor, LocatorError, RemoteLocator};
use crate::config::{RemoteConfig, StaticCandidateConfig};
use crate::version::{Arch, Number, VersionKey};

fn describe(number: &Number, release: &str, arch: Arch) -> String {
    format!("{}-{}-{}", number, release, arch)
}

/// Product index document served by the remote index
#[derive(Debug, Deserialize)]
struct IndexDocument {
    products: Vec<IndexProduct>,
}

#[derive(Debug, Deserialize)]
struct IndexProduct {
    version: String,
    /// Relative to the index URL unless absolute
    path: String,
    size: u64,
    sha256: String,
}

/// Locator backed by a JSON product index fetched over HTTP.
///
/// The index is fetched on every lookup; lookups only happen on cache
/// misses.
pub struct IndexLocator {
    index_url: Url,
    client: reqwest::Client,
}

impl IndexLocator {
    pub fn new(index_url: &str, config: &RemoteConfig) -> Result<Self, LocatorError> {
        let index_url = Url::parse(index_url)
            .map_err(|e| LocatorError::Parse(format!("invalid index URL {}: {}", index_url, e)))?;
        let client = http_client(config)
            .map_err(|e| LocatorError::Fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { index_url, client })
    }

    async fn fetch_index(&self) -> Result<IndexDocument, LocatorError> {
        let response = self
            .client
            .get(self.index_url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocatorError::Fetch("Request timed out".to_string())
                } else if e.is_connect() {
                    LocatorError::Fetch(format!("Connection failed: {}", e))
                } else {
                    LocatorError::Fetch(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(LocatorError::Fetch(format!(
                "HTTP {} response from {}",
                response.status(),
                self.index_url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LocatorError::Parse(format!("Invalid JSON: {}", e)))
    }
}

#[async_trait]
impl RemoteLocator for IndexLocator {
    async fn find(
        &self,
        number: &Number,
        release: &str,
        arch: Arch,
    ) -> Result<CandidateDescriptor, LocatorError> {
        let index = self.fetch_index().await?;

        for product in index.products {
            let version = match VersionKey::parse(&product.version) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable index entry");
                    continue;
                }
            };
            if &version.number != number || version.release != release || version.arch != arch {
                continue;
            }

            let url = self.index_url.join(&product.path).map_err(|e| {
                LocatorError::Parse(format!("invalid path {:?}: {}", product.path, e))
            })?;
            tracing::debug!(version = %version, url = %url, "Found remote candidate");
            return Ok(CandidateDescriptor {
                url: url.to_string(),
                size: product.size,
                sha256: product.sha256.to_lowercase(),
            });
        }

        Err(LocatorError::NotFound(describe(number, release, arch)))
    }
}

/// Locator over a fixed set of candidates
#[derive(Debug, Default)]
pub struct StaticLocator {
    entries: HashMap<String, CandidateDescriptor>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(candidates: &[StaticCandidateConfig]) -> Result<Self, LocatorError> {
        let mut locator = Self::new();
        for candidate in candidates {
            let version = VersionKey::parse(&candidate.version)
                .map_err(|e| LocatorError::Parse(e.to_string()))?;
            locator.insert(
                &version,
                CandidateDescriptor {
                    url: candidate.url.clone(),
                    size: candidate.size,
                    sha256: candidate.sha256.to_lowercase(),
                },
            );
        }
        Ok(locator)
    }

    pub fn insert(&mut self, version: &VersionKey, candidate: CandidateDescriptor) {
        self.entries.insert(version.to_string(), candidate);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RemoteLocator for StaticLocator {
    async fn find(
        &self,
        number: &Number,
        release: &str,
        arch: Arch,
    ) -> Result<CandidateDescriptor, LocatorError> {
        let key = describe(number, release, arch);
        self.entries
            .get(&key)
            .cloned()
            .ok_or(LocatorError::NotFound(key))
    }
}

/// Tries each locator in turn; the first candidate found wins
pub struct ChainLocator {
    locators: Vec<Arc<dyn RemoteLocator>>,
}

impl ChainLocator {
    pub fn new(locators: Vec<Arc<dyn RemoteLocator>>) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl RemoteLocator for ChainLocator {
    async fn find(
        &self,
        number: &Number,
        release: &str,
        arch: Arch,
    ) -> Result<CandidateDescriptor, LocatorError> {
        for locator in &self.locators {
            match locator.find(number, release, arch).await {
                Ok(candidate) => return Ok(candidate),
                Err(LocatorError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(LocatorError::NotFound(describe(number, release, arch)))
    }
}
