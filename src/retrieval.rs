//! Agent binary retrieval
//!
//! Resolves a requested version against the local store, serves it when
//! present and otherwise fetches it from the remote index, storing it on the
//! way through.

use std::sync::Arc;

use crate::error::ToolsError;
use crate::metrics::Metrics;
use crate::remote::Fetcher;
use crate::request_coalescing::{CoalescingSlot, RequestCoalescer};
use crate::resolver::VersionResolver;
use crate::storage::{ArtifactMetadata, ArtifactStream, StorageError, StorageProvider, ToolsStorage};
use crate::transfer::ScopedHandles;
use crate::version::VersionKey;

/// Keys derived from a request: what to open, what to ask the remote index
/// for, and where to store a fetched copy
struct Plan {
    open: VersionKey,
    lookup: VersionKey,
    write: VersionKey,
}

impl Plan {
    fn exact(version: &VersionKey) -> Self {
        Self {
            open: version.clone(),
            lookup: version.clone(),
            write: version.clone(),
        }
    }
}

pub struct ToolsDownloader {
    provider: Arc<dyn StorageProvider>,
    resolver: VersionResolver,
    fetcher: Arc<Fetcher>,
    coalescer: Option<RequestCoalescer>,
    metrics: Arc<Metrics>,
}

impl ToolsDownloader {
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        resolver: VersionResolver,
        fetcher: Arc<Fetcher>,
        coalescer: Option<RequestCoalescer>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            resolver,
            fetcher,
            coalescer,
            metrics,
        }
    }

    /// Metadata and open handles for the requested version.
    ///
    /// On success the caller owns the handles and must close them (or hand
    /// them to the transfer layer, which does). On failure they are already
    /// closed.
    pub async fn get_tools(
        &self,
        version: &str,
    ) -> Result<(ArtifactMetadata, ScopedHandles), ToolsError> {
        self.metrics.increment_download_requests();
        let requested = VersionKey::parse(version).map_err(|e| {
            ToolsError::MalformedRequest(format!("error parsing version: {}", e))
        })?;
        tracing::debug!(version = %requested, "Request for agent binaries");

        let storage = self.provider.tools_storage().await?;
        let mut handles = ScopedHandles::for_storage(storage);

        let located = match handles.storage() {
            Some(storage) => self.locate(&requested, storage).await,
            None => Err(StorageError::AlreadyClosed("storage").into()),
        };

        match located {
            Ok((metadata, stream)) => {
                handles.attach(stream);
                Ok((metadata, handles))
            }
            Err(e) => {
                if let Err(close_err) = handles.close().await {
                    self.metrics.increment_close_failures();
                    tracing::warn!(error = %close_err, "Failed to release storage handles");
                }
                Err(e)
            }
        }
    }

    async fn plan(
        &self,
        requested: &VersionKey,
        storage: &dyn ToolsStorage,
    ) -> Result<Plan, ToolsError> {
        if !requested.in_legacy_window() {
            return Ok(Plan::exact(requested));
        }

        let available = storage.all_metadata().await?;
        let plan = match self.resolver.resolve(requested, &available) {
            Some(resolution) => {
                let lookup = if resolution.override_release.is_some() {
                    self.resolver.normalized(requested)
                } else {
                    requested.clone()
                };
                Plan {
                    write: resolution.write_version(),
                    open: resolution.storage_version,
                    lookup,
                }
            }
            None => Plan {
                open: requested.clone(),
                lookup: self.resolver.normalized(requested),
                write: requested.clone(),
            },
        };
        Ok(plan)
    }

    async fn locate(
        &self,
        requested: &VersionKey,
        storage: &dyn ToolsStorage,
    ) -> Result<(ArtifactMetadata, ArtifactStream), ToolsError> {
        let plan = self.plan(requested, storage).await?;

        match storage.open(&plan.open.to_string()).await {
            Ok(found) => {
                self.metrics.increment_cache_hits();
                return Ok(found);
            }
            Err(e) if e.is_not_found() => {
                self.metrics.increment_cache_misses();
                tracing::info!(version = %requested, "Agent binaries not found locally, fetching");
            }
            Err(e) => return Err(e.into()),
        }

        self.fetch(&plan, storage).await.map_err(|e| {
            tracing::warn!(version = %requested, error = %e, "Error fetching agent binaries");
            e
        })
    }

    async fn fetch(
        &self,
        plan: &Plan,
        storage: &dyn ToolsStorage,
    ) -> Result<(ArtifactMetadata, ArtifactStream), ToolsError> {
        let Some(coalescer) = &self.coalescer else {
            return self
                .fetcher
                .fetch_and_store(&plan.lookup, &plan.write, storage)
                .await;
        };

        match coalescer.acquire(&plan.write.to_string()).await {
            CoalescingSlot::Leader(guard) => {
                let fetched = self
                    .fetcher
                    .fetch_and_store(&plan.lookup, &plan.write, storage)
                    .await;
                drop(guard);
                fetched
            }
            CoalescingSlot::Follower => {
                self.metrics.increment_coalesced_waits();
                match storage.open(&plan.write.to_string()).await {
                    Ok(found) => Ok(found),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(version = %plan.write, "Coalesced fetch left nothing behind, fetching");
                        self.fetcher
                            .fetch_and_store(&plan.lookup, &plan.write, storage)
                            .await
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}
