// Disk store persistence integration tests

use super::test_harness::{memory_config, payload, DepotFixture, RemoteFixture};
use tempfile::TempDir;
use tooldepot::config::{Config, StorageBackendKind};

fn disk_config(dir: &TempDir, remote: Option<&RemoteFixture>) -> Config {
    let mut config = memory_config(remote);
    config.storage.backend = StorageBackendKind::Disk;
    config.storage.dir = dir.path().to_string_lossy().into_owned();
    config
}

#[tokio::test]
async fn test_fetched_binaries_survive_restart() {
    let dir = TempDir::new().unwrap();
    let remote = RemoteFixture::start().await;
    let data = payload(10_000);
    remote.publish("2.9.0-ubuntu-amd64", &data);

    {
        let depot = DepotFixture::start(disk_config(&dir, Some(&remote))).await;
        let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
        assert_eq!(response.bytes().await.unwrap(), data);
        depot.assert_handles_released().await;
    }

    // A fresh instance without any remote index serves from disk
    let depot = DepotFixture::start(disk_config(&dir, None)).await;
    assert_eq!(depot.state.store.entry_count(), 1);
    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap(), data);
    assert_eq!(remote.downloads(), 1);
}

#[tokio::test]
async fn test_uploads_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let depot = DepotFixture::start(disk_config(&dir, None)).await;
        let response = depot
            .upload(&["2.9.0-ubuntu-amd64"], b"uploaded build".to_vec())
            .await;
        assert_eq!(response.status(), 200);
    }

    let depot = DepotFixture::start(disk_config(&dir, None)).await;
    let response = depot.get("/tools/2.9.0-ubuntu-amd64").await;
    assert_eq!(&response.bytes().await.unwrap()[..], b"uploaded build");
}
