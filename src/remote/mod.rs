//! Remote binary index
//!
//! A [`RemoteLocator`] turns an exact (number, release, arch) triple into a
//! [`CandidateDescriptor`]: where to download the artifact and what its size
//! and hash must be. The [`fetcher::Fetcher`] downloads and verifies it.

pub mod fetcher;
pub mod locator;

pub use fetcher::Fetcher;
pub use locator::{ChainLocator, IndexLocator, StaticLocator};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::RemoteConfig;
use crate::error::ToolsError;
use crate::version::{Arch, Number};

/// Where to download one artifact and what it must look like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDescriptor {
    pub url: String,
    pub size: u64,
    /// Lowercase hex SHA-256
    pub sha256: String,
}

#[derive(Error, Debug)]
pub enum LocatorError {
    /// No candidate for the requested version
    #[error("no agent binaries found for {0}")]
    NotFound(String),

    /// Index could not be fetched
    #[error("failed to fetch binary index: {0}")]
    Fetch(String),

    /// Index was fetched but could not be understood
    #[error("invalid binary index: {0}")]
    Parse(String),
}

impl From<LocatorError> for ToolsError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::NotFound(_) => ToolsError::NotFound(err.to_string()),
            other => ToolsError::Transport(other.to_string()),
        }
    }
}

/// Index service returning download candidates
#[async_trait]
pub trait RemoteLocator: Send + Sync {
    /// Candidate for exactly this number, release and arch
    async fn find(
        &self,
        number: &Number,
        release: &str,
        arch: Arch,
    ) -> Result<CandidateDescriptor, LocatorError>;
}

/// HTTP client for index and artifact requests.
///
/// Unless `verify_tls` is set, invalid certificates and host names are
/// accepted; artifacts are checked against their SHA-256 instead.
pub fn http_client(config: &RemoteConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
    if !config.verify_tls {
        builder = builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    builder.build()
}

/// Locator described by the remote configuration.
///
/// Static candidates are consulted before the HTTP index. With neither
/// configured every lookup reports not found.
pub fn build_locator(config: &RemoteConfig) -> Result<Arc<dyn RemoteLocator>, LocatorError> {
    let mut chain: Vec<Arc<dyn RemoteLocator>> = Vec::new();

    if !config.candidates.is_empty() {
        chain.push(Arc::new(StaticLocator::from_config(&config.candidates)?));
    }
    if let Some(url) = &config.index_url {
        chain.push(Arc::new(IndexLocator::new(url, config)?));
    }

    tracing::info!(
        static_candidates = config.candidates.len(),
        index_url = config.index_url.as_deref().unwrap_or("-"),
        "Remote binary locator configured"
    );

    Ok(Arc::new(ChainLocator::new(chain)))
}
