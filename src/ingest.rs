//! Agent binary uploads
//!
//! An upload names one or more target versions in the `binaryVersion` query
//! parameter. The body is hashed while it is buffered and then stored under
//! every target with the same size and hash.

use axum::body::Body;
use http_body_util::BodyExt;
use serde::Serialize;
use std::sync::Arc;

use crate::constants::TOOLS_CONTENT_TYPE;
use crate::digest::HashingBuffer;
use crate::error::ToolsError;
use crate::gate::ChangeGate;
use crate::metrics::Metrics;
use crate::storage::{ArtifactMetadata, StorageError, StorageProvider};
use crate::version::{LegacyReleaseMap, VersionKey};

const VERSION_PARAM: &str = "binaryVersion";

/// Stored upload as reported back to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadDescriptor {
    pub version: VersionKey,
    pub size: u64,
    pub sha256: String,
    pub url: String,
}

/// Request details the ingester needs besides the body
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Raw query string, without the leading `?`
    pub query: Option<&'a str>,
    pub content_type: Option<&'a str>,
    /// Host used in the returned retrieval URL
    pub host: &'a str,
    /// Model identifier used in the returned retrieval URL
    pub scope: &'a str,
}

/// Retrieval URL for a stored version
pub fn tools_url(host: &str, scope: &str, version: &VersionKey) -> String {
    format!("https://{}/model/{}/tools/{}", host, scope, version)
}

/// Every `binaryVersion` value in a query string, in order
pub fn parse_binary_versions(query: Option<&str>) -> Result<Vec<VersionKey>, ToolsError> {
    let mut versions = Vec::new();

    for pair in query.unwrap_or("").split('&') {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if decode(name)? != VERSION_PARAM {
            continue;
        }
        let value = decode(value)?;
        if value.is_empty() {
            continue;
        }
        let version = VersionKey::parse(&value).map_err(|e| {
            ToolsError::MalformedRequest(format!(
                "invalid agent binaries version {:?}: {}",
                value, e
            ))
        })?;
        versions.push(version);
    }

    if versions.is_empty() {
        return Err(ToolsError::MalformedRequest(format!(
            "expected {} argument",
            VERSION_PARAM
        )));
    }
    Ok(versions)
}

fn decode(component: &str) -> Result<String, ToolsError> {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| ToolsError::MalformedRequest(format!("invalid query string: {}", e)))
}

pub struct UploadIngester {
    provider: Arc<dyn StorageProvider>,
    gate: Arc<dyn ChangeGate>,
    legacy: Arc<LegacyReleaseMap>,
    max_upload_size: u64,
    metrics: Arc<Metrics>,
}

impl UploadIngester {
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        gate: Arc<dyn ChangeGate>,
        legacy: Arc<LegacyReleaseMap>,
        max_upload_size: u64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            gate,
            legacy,
            max_upload_size,
            metrics,
        }
    }

    /// Validate, hash and store one upload.
    ///
    /// The payload is added under each requested version in order. If one of
    /// those adds fails the error is returned and versions already stored
    /// stay in place; a retried upload overwrites them.
    pub async fn ingest(
        &self,
        request: UploadRequest<'_>,
        body: Body,
    ) -> Result<UploadDescriptor, ToolsError> {
        self.metrics.increment_upload_requests();
        let result = self.ingest_inner(request, body).await;
        match &result {
            Ok(descriptor) => {
                self.metrics.increment_uploads_stored();
                tracing::info!(
                    version = %descriptor.version,
                    size = descriptor.size,
                    sha256 = %descriptor.sha256,
                    "Stored uploaded agent binaries"
                );
            }
            Err(e) => {
                self.metrics.increment_uploads_rejected();
                tracing::debug!(error = %e, "Rejected agent binaries upload");
            }
        }
        result
    }

    async fn ingest_inner(
        &self,
        request: UploadRequest<'_>,
        body: Body,
    ) -> Result<UploadDescriptor, ToolsError> {
        let versions = parse_binary_versions(request.query)?;

        let content_type = request.content_type.unwrap_or("");
        if content_type != TOOLS_CONTENT_TYPE {
            return Err(ToolsError::MalformedRequest(format!(
                "expected Content-Type: {}, got: {}",
                TOOLS_CONTENT_TYPE, content_type
            )));
        }

        let versions: Vec<VersionKey> = versions
            .into_iter()
            .map(|v| self.normalize_series(v))
            .collect();
        let names: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        tracing::debug!(versions = ?names, "Request to upload agent binaries");

        self.gate.check_allowed().await?;

        let (data, sha256) = self.read_and_hash(body).await?;
        if data.is_empty() {
            return Err(ToolsError::MalformedRequest(
                "no agent binaries uploaded".to_string(),
            ));
        }
        let size = data.len() as u64;

        let storage = self.provider.tools_storage().await?;
        let mut stored = Ok(());
        for version in &versions {
            let metadata = ArtifactMetadata::new(version.clone(), size, sha256.clone());
            tracing::debug!(version = %version, size = size, "Uploading agent binaries to storage");
            stored = storage.add(data.clone(), metadata).await;
            if stored.is_err() {
                break;
            }
        }
        StorageError::combine(stored, storage.close().await)?;

        let primary = versions[0].clone();
        Ok(UploadDescriptor {
            url: tools_url(request.host, request.scope, &primary),
            version: primary,
            size,
            sha256,
        })
    }

    /// Rewrite a known legacy series to its release name
    fn normalize_series(&self, version: VersionKey) -> VersionKey {
        let release = self.legacy.normalize(&version.release).to_string();
        if release == version.release {
            return version;
        }
        version.with_release(release)
    }

    async fn read_and_hash(&self, mut body: Body) -> Result<(bytes::Bytes, String), ToolsError> {
        let mut buffer = HashingBuffer::with_limit(self.max_upload_size);
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| {
                ToolsError::MalformedRequest(format!("error processing file upload: {}", e))
            })?;
            if let Ok(chunk) = frame.into_data() {
                buffer.push(&chunk).map_err(|e| {
                    ToolsError::MalformedRequest(format!("agent binaries upload too large: {}", e))
                })?;
            }
        }
        self.metrics.add_bytes_received(buffer.len());
        Ok(buffer.finish())
    }
}
