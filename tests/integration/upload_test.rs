// Upload path integration tests

use super::test_harness::{memory_config, payload, DepotFixture};
use serde_json::Value;
use tooldepot::digest::sha256_hex;

#[tokio::test]
async fn test_upload_then_download_returns_identical_bytes() {
    let depot = DepotFixture::start(memory_config(None)).await;
    let data = payload(64 * 1024 + 7);

    let response = depot.upload(&["2.9.0-ubuntu-amd64"], data.clone()).await;
    assert_eq!(response.status(), 200);
    let json: Value = response.json().await.unwrap();
    let entry = &json["tools-list"][0];
    assert_eq!(entry["version"], "2.9.0-ubuntu-amd64");
    assert_eq!(entry["size"], data.len() as u64);
    assert_eq!(entry["sha256"], sha256_hex(&data));
    let url = entry["url"].as_str().unwrap();
    assert!(url.starts_with("https://127.0.0.1:"), "{}", url);
    assert!(url.ends_with("/model/controller/tools/2.9.0-ubuntu-amd64"), "{}", url);

    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 200);
    let body = response.bytes().await.unwrap();
    assert_eq!(body, data);
    assert_eq!(sha256_hex(&body), sha256_hex(&data));

    assert_eq!(depot.state.metrics.uploads_stored(), 1);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_public_host_used_in_descriptor_url() {
    let mut config = memory_config(None);
    config.server.public_host = Some("depot.example.com".to_string());
    config.server.scope = "a1b2c3".to_string();
    let depot = DepotFixture::start(config).await;

    let response = depot.upload(&["2.9.0-ubuntu-amd64"], b"x".to_vec()).await;
    let json: Value = response.json().await.unwrap();
    assert_eq!(
        json["tools-list"][0]["url"],
        "https://depot.example.com/model/a1b2c3/tools/2.9.0-ubuntu-amd64"
    );
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let depot = DepotFixture::start(memory_config(None)).await;

    let response = depot.upload(&["2.9.0-ubuntu-amd64"], Vec::new()).await;
    assert_eq!(response.status(), 400);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "no agent binaries uploaded");
    assert_eq!(json["error-code"], "bad request");
    assert_eq!(depot.state.store.entry_count(), 0);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let mut config = memory_config(None);
    config.server.max_upload_size = 1024;
    let depot = DepotFixture::start(config).await;

    let response = depot.upload(&["2.9.0-ubuntu-amd64"], payload(4096)).await;
    assert_eq!(response.status(), 400);
    assert_eq!(depot.state.store.entry_count(), 0);
}

#[tokio::test]
async fn test_upload_requires_tarball_content_type() {
    let depot = DepotFixture::start(memory_config(None)).await;

    let response = depot
        .client()
        .post(depot.url("/tools?binaryVersion=2.9.0-ubuntu-amd64"))
        .header("Content-Type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let json: Value = response.json().await.unwrap();
    assert_eq!(
        json["error"],
        "expected Content-Type: application/x-tar-gz, got: application/json"
    );
    assert_eq!(depot.state.store.entry_count(), 0);
}

#[tokio::test]
async fn test_upload_requires_valid_version() {
    let depot = DepotFixture::start(memory_config(None)).await;

    let response = depot.upload(&[], b"x".to_vec()).await;
    assert_eq!(response.status(), 400);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "expected binaryVersion argument");

    let response = depot.upload(&["2.9.0-ubuntu"], b"x".to_vec()).await;
    assert_eq!(response.status(), 400);
    let json: Value = response.json().await.unwrap();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid agent binaries version \"2.9.0-ubuntu\""));
}

#[tokio::test]
async fn test_upload_series_is_stored_under_release() {
    let depot = DepotFixture::start(memory_config(None)).await;

    let response = depot.upload(&["3.0.0-jammy-arm64"], b"jammy".to_vec()).await;
    assert_eq!(response.status(), 200);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["tools-list"][0]["version"], "3.0.0-ubuntu-arm64");

    let response = depot.get("/tools/3.0.0-ubuntu-arm64").await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_upload_under_several_versions() {
    let depot = DepotFixture::start(memory_config(None)).await;

    let response = depot
        .upload(
            &["2.9.0-ubuntu-amd64", "2.9.0-centos-amd64"],
            b"shared build".to_vec(),
        )
        .await;
    assert_eq!(response.status(), 200);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["tools-list"][0]["version"], "2.9.0-ubuntu-amd64");
    assert_eq!(depot.state.store.entry_count(), 2);

    for path in ["/tools/2.9.0-ubuntu-amd64", "/tools/2.9.0-centos-amd64"] {
        let response = depot.get(path).await;
        assert_eq!(&response.bytes().await.unwrap()[..], b"shared build");
    }
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_blocked_changes_reject_uploads() {
    let mut config = memory_config(None);
    config.change_gate.blocked = true;
    config.change_gate.message = "model migration in progress".to_string();
    let depot = DepotFixture::start(config).await;

    let response = depot.upload(&["2.9.0-ubuntu-amd64"], b"x".to_vec()).await;
    assert_eq!(response.status(), 400);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error-code"], "operation is blocked");
    assert_eq!(json["error"], "model migration in progress");
    assert_eq!(depot.state.store.entry_count(), 0);

    depot.state.gate.unblock();
    let response = depot.upload(&["2.9.0-ubuntu-amd64"], b"x".to_vec()).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_unsupported_methods() {
    let depot = DepotFixture::start(memory_config(None)).await;

    let response = depot.get("/tools").await;
    assert_eq!(response.status(), 405);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error-code"], "method not allowed");

    let response = depot
        .client()
        .delete(depot.url("/tools/2.9.0-ubuntu-amd64"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "unsupported method: \"DELETE\"");
}
