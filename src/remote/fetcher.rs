//! Cache-miss fetching
//!
//! Looks a version up in the remote index, downloads it, verifies size and
//! hash in the same pass as the read, and writes it through to the local
//! store. Nothing is stored unless verification passes.

use std::sync::Arc;

use super::{http_client, CandidateDescriptor, RemoteLocator};
use crate::config::RemoteConfig;
use crate::digest::HashingBuffer;
use crate::error::ToolsError;
use crate::metrics::Metrics;
use crate::storage::reader::BytesReader;
use crate::storage::{ArtifactMetadata, ArtifactStream, ToolsStorage};
use crate::version::VersionKey;

/// Longest slice of an error response body quoted in error messages
const MAX_ERROR_BODY: usize = 1024;

pub struct Fetcher {
    locator: Arc<dyn RemoteLocator>,
    client: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl Fetcher {
    pub fn new(
        locator: Arc<dyn RemoteLocator>,
        config: &RemoteConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ToolsError> {
        let client = http_client(config).map_err(|e| {
            ToolsError::Transport(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self {
            locator,
            client,
            metrics,
        })
    }

    /// Fetch `lookup` from the remote index and store it as `storage_version`.
    ///
    /// Returns the stored metadata and a reader over the fetched bytes.
    pub async fn fetch_and_store(
        &self,
        lookup: &VersionKey,
        storage_version: &VersionKey,
        storage: &dyn ToolsStorage,
    ) -> Result<(ArtifactMetadata, ArtifactStream), ToolsError> {
        let candidate = self
            .locator
            .find(&lookup.number, &lookup.release, lookup.arch)
            .await?;

        tracing::info!(
            version = %lookup,
            url = %candidate.url,
            size = candidate.size,
            "Fetching agent binaries"
        );
        self.metrics.increment_remote_fetches();

        let (data, sha256) = match self.download(&candidate).await {
            Ok(body) => body,
            Err(e) => {
                if matches!(e, ToolsError::IntegrityFailure(_)) {
                    self.metrics.increment_integrity_failures();
                } else {
                    self.metrics.increment_remote_fetch_failures();
                }
                return Err(e);
            }
        };

        let metadata = ArtifactMetadata::new(storage_version.clone(), candidate.size, sha256);
        storage
            .add(data.clone(), metadata.clone())
            .await
            .map_err(|e| {
                tracing::error!(version = %storage_version, error = %e, "Failed to cache fetched agent binaries");
                ToolsError::from(e)
            })?;

        tracing::info!(
            version = %storage_version,
            size = metadata.size,
            sha256 = %metadata.sha256,
            "Cached fetched agent binaries"
        );
        Ok((metadata, Box::new(BytesReader::new(data))))
    }

    /// Single GET of the candidate URL, hashing as chunks arrive
    async fn download(&self, candidate: &CandidateDescriptor) -> Result<(bytes::Bytes, String), ToolsError> {
        let mut response = self
            .client
            .get(&candidate.url)
            .send()
            .await
            .map_err(|e| ToolsError::Transport(format!("{}: {}", candidate.url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let mut msg = format!("bad HTTP response: {}", status);
            if let Ok(body) = response.text().await {
                let body = body.trim();
                if !body.is_empty() {
                    let quoted: String = body.chars().take(MAX_ERROR_BODY).collect();
                    msg.push_str(&format!(" ({})", quoted));
                }
            }
            return Err(ToolsError::Transport(msg));
        }

        let mut buffer = HashingBuffer::with_limit(candidate.size);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ToolsError::Transport(format!("{}: {}", candidate.url, e)))?
        {
            if buffer.push(&chunk).is_err() {
                return Err(ToolsError::IntegrityFailure(format!(
                    "size mismatch for {}: body exceeds expected {} bytes",
                    candidate.url, candidate.size
                )));
            }
        }
        self.metrics.add_bytes_received(buffer.len());

        if buffer.len() != candidate.size {
            return Err(ToolsError::IntegrityFailure(format!(
                "size mismatch for {}: expected {} bytes, got {}",
                candidate.url,
                candidate.size,
                buffer.len()
            )));
        }

        let (data, sha256) = buffer.finish();
        if sha256 != candidate.sha256 {
            return Err(ToolsError::IntegrityFailure(format!(
                "hash mismatch for {}",
                candidate.url
            )));
        }

        Ok((data, sha256))
    }
}
