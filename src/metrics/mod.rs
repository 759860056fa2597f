// Metrics module - Prometheus-compatible counters
// Thread-safe via atomic operations

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the retrieval and upload paths, exported as Prometheus text
#[derive(Debug, Default)]
pub struct Metrics {
    // Request counters
    download_requests: AtomicU64,
    upload_requests: AtomicU64,

    // Local store lookups
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Remote fetches
    remote_fetches: AtomicU64,
    remote_fetch_failures: AtomicU64,
    integrity_failures: AtomicU64,
    coalesced_waits: AtomicU64,

    // Uploads
    uploads_stored: AtomicU64,
    uploads_rejected: AtomicU64,

    // Transfer
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    close_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_download_requests(&self) {
        self.download_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upload_requests(&self) {
        self.upload_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_remote_fetches(&self) {
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_remote_fetch_failures(&self) {
        self.remote_fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_integrity_failures(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_coalesced_waits(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_uploads_stored(&self) {
        self.uploads_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_uploads_rejected(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_close_failures(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn download_requests(&self) -> u64 {
        self.download_requests.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn remote_fetches(&self) -> u64 {
        self.remote_fetches.load(Ordering::Relaxed)
    }

    pub fn integrity_failures(&self) -> u64 {
        self.integrity_failures.load(Ordering::Relaxed)
    }

    pub fn uploads_stored(&self) -> u64 {
        self.uploads_stored.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Export all counters in Prometheus text exposition format
    pub fn export_prometheus(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 13] = [
            (
                "tooldepot_download_requests_total",
                "Agent binary download requests received",
                &self.download_requests,
            ),
            (
                "tooldepot_upload_requests_total",
                "Agent binary upload requests received",
                &self.upload_requests,
            ),
            (
                "tooldepot_cache_hits_total",
                "Downloads served from the local store",
                &self.cache_hits,
            ),
            (
                "tooldepot_cache_misses_total",
                "Downloads not present in the local store",
                &self.cache_misses,
            ),
            (
                "tooldepot_remote_fetches_total",
                "Artifacts fetched from the remote index",
                &self.remote_fetches,
            ),
            (
                "tooldepot_remote_fetch_failures_total",
                "Remote fetches that failed",
                &self.remote_fetch_failures,
            ),
            (
                "tooldepot_integrity_failures_total",
                "Fetched artifacts rejected for size or hash mismatch",
                &self.integrity_failures,
            ),
            (
                "tooldepot_coalesced_waits_total",
                "Requests that waited on another request's fetch",
                &self.coalesced_waits,
            ),
            (
                "tooldepot_uploads_stored_total",
                "Uploads stored successfully",
                &self.uploads_stored,
            ),
            (
                "tooldepot_uploads_rejected_total",
                "Uploads rejected",
                &self.uploads_rejected,
            ),
            (
                "tooldepot_bytes_sent_total",
                "Artifact bytes sent to clients",
                &self.bytes_sent,
            ),
            (
                "tooldepot_bytes_received_total",
                "Artifact bytes received from uploads and remote fetches",
                &self.bytes_received,
            ),
            (
                "tooldepot_close_failures_total",
                "Storage handle close failures",
                &self.close_failures,
            ),
        ];

        let mut output = String::new();
        for (name, help, counter) in counters {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.load(Ordering::Relaxed)));
        }
        output
    }
}
