// Test harness for integration tests
// Starts an in-process depot and a fake remote binary index on ephemeral ports

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use tooldepot::config::{Config, StorageBackendKind};
use tooldepot::constants::TOOLS_CONTENT_TYPE;
use tooldepot::digest::sha256_hex;
use tooldepot::server::{self, AppState};

async fn spawn_router(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

#[derive(Clone, Default)]
struct RemoteState {
    products: Arc<Mutex<Vec<serde_json::Value>>>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    downloads: Arc<AtomicUsize>,
    delay_ms: Arc<AtomicU64>,
}

/// Fake remote index serving `/streams/index.json` and `/streams/{file}`
pub struct RemoteFixture {
    pub base_url: String,
    state: RemoteState,
}

impl RemoteFixture {
    pub async fn start() -> Self {
        let state = RemoteState::default();
        let app = Router::new()
            .route("/streams/index.json", get(serve_index))
            .route("/streams/{file}", get(serve_file))
            .with_state(state.clone());
        let base_url = spawn_router(app).await;
        Self { base_url, state }
    }

    pub fn index_url(&self) -> String {
        format!("{}/streams/index.json", self.base_url)
    }

    /// List `data` under `version` with its true size and hash
    pub fn publish(&self, version: &str, data: &[u8]) {
        self.publish_with(version, data, data.len() as u64, &sha256_hex(data));
    }

    /// List `data` under `version` with the given advertised size and hash
    pub fn publish_with(&self, version: &str, data: &[u8], size: u64, sha256: &str) {
        let file = format!("{}.tgz", version);
        self.state.files.lock().insert(file.clone(), data.to_vec());
        self.list(version, &file, size, sha256);
    }

    /// List a product whose file is not served
    pub fn list(&self, version: &str, file: &str, size: u64, sha256: &str) {
        self.state.products.lock().push(serde_json::json!({
            "version": version,
            "path": file,
            "size": size,
            "sha256": sha256,
        }));
    }

    /// Number of artifact downloads served so far
    pub fn downloads(&self) -> usize {
        self.state.downloads.load(Ordering::SeqCst)
    }

    /// Delay every artifact response by `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn serve_index(State(state): State<RemoteState>) -> impl IntoResponse {
    let products = state.products.lock().clone();
    Json(serde_json::json!({ "products": products }))
}

async fn serve_file(
    State(state): State<RemoteState>,
    Path(file): Path<String>,
) -> impl IntoResponse {
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let data = state.files.lock().get(&file).cloned();
    match data {
        Some(data) => {
            state.downloads.fetch_add(1, Ordering::SeqCst);
            (StatusCode::OK, data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such file").into_response(),
    }
}

/// Depot instance serving the full router
pub struct DepotFixture {
    pub base_url: String,
    pub state: AppState,
    client: reqwest::Client,
}

impl DepotFixture {
    /// In-memory depot backed by `remote`
    pub async fn with_remote(remote: &RemoteFixture) -> Self {
        Self::start(memory_config(Some(remote))).await
    }

    pub async fn start(config: Config) -> Self {
        config.validate().expect("Test configuration should be valid");
        let state = server::build_state(&config)
            .await
            .expect("Failed to build depot state");
        let base_url = spawn_router(server::router(state.clone())).await;
        Self {
            base_url,
            state,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// POST `body` under every version in `versions`
    pub async fn upload(&self, versions: &[&str], body: Vec<u8>) -> reqwest::Response {
        let query: Vec<String> = versions
            .iter()
            .map(|v| format!("binaryVersion={}", v))
            .collect();
        self.client
            .post(self.url(&format!("/tools?{}", query.join("&"))))
            .header("Content-Type", TOOLS_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Wait until every storage handle has been released
    pub async fn assert_handles_released(&self) {
        for _ in 0..50 {
            if self.state.store.open_handles() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "{} storage handles still open",
            self.state.store.open_handles()
        );
    }
}

/// Configuration with an in-memory store and an optional remote index
pub fn memory_config(remote: Option<&RemoteFixture>) -> Config {
    let mut config = Config::default();
    config.server.address = "127.0.0.1".to_string();
    config.storage.backend = StorageBackendKind::Memory;
    config.remote.timeout_secs = 10;
    config.remote.index_url = remote.map(|r| r.index_url());
    config
}

/// Deterministic payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
