// Download path integration tests
//
// Covers serving from the local store, fetching on a miss, integrity
// verification of fetched bytes and release of storage handles.

use super::test_harness::{payload, DepotFixture, RemoteFixture};
use serde_json::Value;
use tooldepot::constants::TOOLS_CONTENT_TYPE;
use tooldepot::digest::sha256_hex;

#[tokio::test]
async fn test_miss_fetches_once_then_serves_locally() {
    let remote = RemoteFixture::start().await;
    let data = payload(1024);
    remote.publish("2.9.0-ubuntu-amd64", &data);
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], TOOLS_CONTENT_TYPE);
    assert_eq!(response.headers()["content-length"], "1024");
    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 1024);
    assert_eq!(sha256_hex(&body), sha256_hex(&data));
    assert_eq!(remote.downloads(), 1);

    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap(), data);
    assert_eq!(remote.downloads(), 1, "second GET must not fetch again");

    assert_eq!(depot.state.metrics.cache_misses(), 1);
    assert_eq!(depot.state.metrics.cache_hits(), 1);
    assert_eq!(depot.state.metrics.remote_fetches(), 1);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_scoped_path_serves_same_binaries() {
    let remote = RemoteFixture::start().await;
    remote.publish("2.9.0-ubuntu-arm64", b"arm build");
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot
        .get("/model/5f3a9c2e-0000-4000-8000-000000000000/tools/2.9.0-ubuntu-arm64")
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(&response.bytes().await.unwrap()[..], b"arm build");
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_hash_mismatch_is_never_stored() {
    let remote = RemoteFixture::start().await;
    let data = payload(512);
    remote.publish_with(
        "2.9.0-ubuntu-amd64",
        &data,
        data.len() as u64,
        &sha256_hex(b"something else"),
    );
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 500);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error-code"], "integrity failure");
    assert!(json["error"].as_str().unwrap().contains("hash mismatch"));
    assert_eq!(depot.state.store.entry_count(), 0);

    // Nothing was cached, so a retry fetches again
    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 500);
    assert_eq!(remote.downloads(), 2);
    assert_eq!(depot.state.metrics.integrity_failures(), 2);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_size_mismatch_is_never_stored() {
    let remote = RemoteFixture::start().await;
    let data = payload(300);
    remote.publish_with("2.9.0-ubuntu-amd64", &data, 200, &sha256_hex(&data[..200]));
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 500);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error-code"], "integrity failure");
    assert_eq!(depot.state.store.entry_count(), 0);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_unknown_version_is_not_found() {
    let remote = RemoteFixture::start().await;
    remote.publish("2.9.0-ubuntu-amd64", b"other");
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot.get("/tools/2.9.1-ubuntu-amd64").await;
    assert_eq!(response.status(), 404);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error-code"], "not found");
    assert_eq!(remote.downloads(), 0);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_remote_error_status_is_internal_error() {
    let remote = RemoteFixture::start().await;
    remote.list("2.9.0-ubuntu-amd64", "missing.tgz", 10, &sha256_hex(b"0123456789"));
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 500);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error-code"], "internal error");
    assert!(json["error"].as_str().unwrap().contains("bad HTTP response"));
    assert_eq!(depot.state.store.entry_count(), 0);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_malformed_version_is_bad_request() {
    let depot = DepotFixture::start(super::test_harness::memory_config(None)).await;

    for path in ["/tools/2.9.0-ubuntu", "/tools/latest", "/tools/2.9.0-ubuntu-sparc"] {
        let response = depot.get(path).await;
        assert_eq!(response.status(), 400, "{}", path);
        let json: Value = response.json().await.unwrap();
        assert_eq!(json["error-code"], "bad request");
    }
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_abandoned_download_releases_handles() {
    let remote = RemoteFixture::start().await;
    let data = payload(4 * 1024 * 1024);
    remote.publish("2.9.0-ubuntu-amd64", &data);
    let depot = DepotFixture::with_remote(&remote).await;

    // Populate the store
    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.bytes().await.unwrap().len(), data.len());

    // Read only the headers, then walk away
    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 200);
    drop(response);

    depot.assert_handles_released().await;
}
