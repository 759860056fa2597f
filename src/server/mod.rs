// Server module - axum router and shared application state

mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gate::ConfigChangeGate;
use crate::ingest::UploadIngester;
use crate::metrics::Metrics;
use crate::remote::{build_locator, Fetcher, RemoteLocator};
use crate::request_coalescing::RequestCoalescer;
use crate::resolver::VersionResolver;
use crate::retrieval::ToolsDownloader;
use crate::storage::{open_store, DiskStore};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<ToolsDownloader>,
    pub ingester: Arc<UploadIngester>,
    pub gate: Arc<ConfigChangeGate>,
    pub metrics: Arc<Metrics>,
    pub store: DiskStore,
    scope: String,
    public_host: Option<String>,
    listen_addr: String,
}

impl AppState {
    /// Wire the engine around an already opened store and locator
    pub fn new(
        config: &Config,
        store: DiskStore,
        locator: Arc<dyn RemoteLocator>,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let legacy = Arc::new(config.legacy_map());
        let gate = Arc::new(ConfigChangeGate::new(&config.change_gate));

        let fetcher = Fetcher::new(locator, &config.remote, metrics.clone())?;
        let coalescer = config.coalescing.enabled.then(RequestCoalescer::new);
        let downloader = ToolsDownloader::new(
            Arc::new(store.clone()),
            VersionResolver::new(legacy.clone()),
            Arc::new(fetcher),
            coalescer,
            metrics.clone(),
        );
        let ingester = UploadIngester::new(
            Arc::new(store.clone()),
            gate.clone(),
            legacy,
            config.server.max_upload_size as u64,
            metrics.clone(),
        );

        Ok(Self {
            downloader: Arc::new(downloader),
            ingester: Arc::new(ingester),
            gate,
            metrics,
            store,
            scope: config.server.scope.clone(),
            public_host: config.server.public_host.clone(),
            listen_addr: config.server.listen_addr(),
        })
    }

    /// Host placed in retrieval URLs: configured public host, then the
    /// request's Host header, then the listen address
    fn url_host(&self, request_host: Option<&str>) -> String {
        self.public_host
            .as_deref()
            .or(request_host)
            .unwrap_or(&self.listen_addr)
            .to_string()
    }
}

/// Open the configured store and locator and build the state around them
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = open_store(&config.storage).await?;
    let locator = build_locator(&config.remote)?;
    tracing::info!(
        backend = ?config.storage.backend,
        entries = store.entry_count(),
        "Opened agent binary store"
    );
    AppState::new(config, store, locator)
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tools",
            post(handlers::upload_tools).fallback(handlers::method_not_allowed),
        )
        .route(
            "/tools/{version}",
            get(handlers::download_tools).fallback(handlers::method_not_allowed),
        )
        .route(
            "/model/{scope}/tools",
            post(handlers::upload_scoped_tools).fallback(handlers::method_not_allowed),
        )
        .route(
            "/model/{scope}/tools/{version}",
            get(handlers::download_scoped_tools).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
