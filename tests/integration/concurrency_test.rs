// Concurrency integration tests
//
// Concurrent misses for one version are served by a single remote fetch, and
// mixed concurrent traffic leaves no storage handle open.

use super::test_harness::{memory_config, payload, DepotFixture, RemoteFixture};
use std::time::Duration;
use tooldepot::digest::sha256_hex;

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    let remote = RemoteFixture::start().await;
    let data = payload(256 * 1024);
    remote.publish("2.9.0-ubuntu-amd64", &data);
    remote.set_delay(Duration::from_millis(200));
    let depot = DepotFixture::with_remote(&remote).await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let client = depot.client().clone();
        let url = depot.url("/tools/2.9.0-ubuntu-amd64");
        tasks.push(tokio::spawn(async move {
            let response = client.get(url).send().await.unwrap();
            assert_eq!(response.status(), 200);
            response.bytes().await.unwrap()
        }));
    }

    let expected = sha256_hex(&data);
    for task in tasks {
        let body = task.await.unwrap();
        assert_eq!(sha256_hex(&body), expected);
    }

    assert_eq!(remote.downloads(), 1, "concurrent misses must share one fetch");
    assert_eq!(depot.state.store.entry_count(), 1);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_concurrent_misses_without_coalescing_all_succeed() {
    let remote = RemoteFixture::start().await;
    let data = payload(32 * 1024);
    remote.publish("2.9.0-ubuntu-amd64", &data);
    remote.set_delay(Duration::from_millis(50));
    let mut config = memory_config(Some(&remote));
    config.coalescing.enabled = false;
    let depot = DepotFixture::start(config).await;

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let client = depot.client().clone();
        let url = depot.url("/tools/2.9.0-ubuntu-amd64");
        tasks.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().bytes().await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), data);
    }

    assert!(remote.downloads() >= 1);
    assert_eq!(depot.state.store.entry_count(), 1);
    depot.assert_handles_released().await;
}

#[tokio::test]
async fn test_mixed_traffic_releases_every_handle() {
    let remote = RemoteFixture::start().await;
    remote.publish("2.9.0-ubuntu-amd64", &payload(8 * 1024));
    let depot = DepotFixture::with_remote(&remote).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = depot.client().clone();
        let base = depot.base_url.clone();
        tasks.push(tokio::spawn(async move {
            let response = match i % 4 {
                0 => client.get(format!("{}/tools/2.9.0-ubuntu-amd64", base)),
                1 => client.get(format!("{}/tools/2.9.{}-ubuntu-amd64", base, i)),
                2 => client.get(format!("{}/tools/not-a-version", base)),
                _ => client
                    .post(format!("{}/tools?binaryVersion=2.9.{}-centos-amd64", base, i))
                    .header("Content-Type", "application/x-tar-gz")
                    .body(vec![i as u8; 100]),
            }
            .send()
            .await
            .unwrap();
            let status = response.status().as_u16();
            let _ = response.bytes().await;
            status
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let status = task.await.unwrap();
        let expected = match i % 4 {
            0 | 3 => 200,
            1 => 404,
            _ => 400,
        };
        assert_eq!(status, expected, "request {}", i);
    }

    assert_eq!(depot.state.store.entry_count(), 6);
    depot.assert_handles_released().await;
}
