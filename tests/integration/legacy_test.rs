// Legacy series resolution integration tests

use super::test_harness::{DepotFixture, RemoteFixture};
use bytes::Bytes;
use tooldepot::digest::sha256_hex;
use tooldepot::storage::{ArtifactMetadata, StorageProvider};
use tooldepot::version::VersionKey;

async fn seed(depot: &DepotFixture, version: &str, data: &'static [u8]) {
    let storage = depot.state.store.tools_storage().await.unwrap();
    storage
        .add(
            Bytes::from_static(data),
            ArtifactMetadata::new(
                VersionKey::parse(version).unwrap(),
                data.len() as u64,
                sha256_hex(data),
            ),
        )
        .await
        .unwrap();
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_series_request_served_by_release_entry() {
    let remote = RemoteFixture::start().await;
    let depot = DepotFixture::with_remote(&remote).await;
    seed(&depot, "2.8.0-ubuntu-amd64", b"ubuntu build").await;

    let response = depot.get("/tools/2.8.0-trusty-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-length"], "12");
    assert_eq!(&response.bytes().await.unwrap()[..], b"ubuntu build");
    assert_eq!(remote.downloads(), 0);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_exact_series_entry_wins() {
    let remote = RemoteFixture::start().await;
    let depot = DepotFixture::with_remote(&remote).await;
    seed(&depot, "2.8.0-ubuntu-amd64", b"ubuntu build").await;
    seed(&depot, "2.8.0-trusty-amd64", b"trusty build").await;

    let response = depot.get("/tools/2.8.0-trusty-amd64").await;
    assert_eq!(&response.bytes().await.unwrap()[..], b"trusty build");

    let response = depot.get("/tools/2.8.0-ubuntu-amd64").await;
    assert_eq!(&response.bytes().await.unwrap()[..], b"ubuntu build");
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_release_request_served_by_series_entry() {
    let remote = RemoteFixture::start().await;
    let depot = DepotFixture::with_remote(&remote).await;
    seed(&depot, "2.7.1-win2012r2-amd64", b"windows build").await;

    let response = depot.get("/tools/2.7.1-windows-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(&response.bytes().await.unwrap()[..], b"windows build");
}

#[tokio::test]
async fn test_no_normalization_outside_legacy_window() {
    let remote = RemoteFixture::start().await;
    let depot = DepotFixture::with_remote(&remote).await;
    seed(&depot, "2.9.0-ubuntu-amd64", b"ubuntu build").await;

    let response = depot.get("/tools/2.9.0-focal-amd64").await;
    assert_eq!(response.status(), 404);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_series_miss_fetches_release_build() {
    let remote = RemoteFixture::start().await;
    remote.publish("2.8.0-ubuntu-amd64", b"ubuntu build");
    let depot = DepotFixture::with_remote(&remote).await;

    let response = depot.get("/tools/2.8.0-trusty-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(&response.bytes().await.unwrap()[..], b"ubuntu build");
    assert_eq!(remote.downloads(), 1);

    // Stored under the series the agent asked for
    let storage = depot.state.store.tools_storage().await.unwrap();
    let keys: Vec<String> = storage
        .all_metadata()
        .await
        .unwrap()
        .iter()
        .map(|m| m.key())
        .collect();
    storage.close().await.unwrap();
    assert_eq!(keys, vec!["2.8.0-trusty-amd64"]);

    let response = depot.get("/tools/2.8.0-trusty-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(remote.downloads(), 1);
    depot.assert_handles_released().await;
}
