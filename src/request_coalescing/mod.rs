// Request Coalescing Module
//
// Deduplicates concurrent remote fetches for the same agent binary version.
// When several clients miss the local store for the same version at once:
// - First request (leader): fetches from the remote index and stores the result
// - Subsequent requests (followers): wait for the leader, then re-open the store
// - A follower that still misses (the leader failed) fetches on its own

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Tracks in-flight fetches keyed by storage version string
#[derive(Debug, Clone, Default)]
pub struct RequestCoalescer {
    /// key -> sender; the leader sends `true` when it is done
    in_flight: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a coalescing slot for `key`
    ///
    /// Returns `CoalescingSlot::Leader` if no fetch for the key is in flight.
    /// The leader should fetch and store, then drop the guard.
    ///
    /// Returns `CoalescingSlot::Follower` after the in-flight leader finished,
    /// successfully or not.
    pub async fn acquire(&self, key: &str) -> CoalescingSlot {
        let receiver = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(sender) => sender.subscribe(),
                None => {
                    let (tx, _rx) = watch::channel(false);
                    in_flight.insert(key.to_string(), tx);
                    return CoalescingSlot::Leader(LeaderGuard {
                        key: key.to_string(),
                        coalescer: self.clone(),
                    });
                }
            }
        };

        let mut rx = receiver;
        // Err means the sender is gone, which also means the leader is done
        let _ = rx.wait_for(|&completed| completed).await;
        CoalescingSlot::Follower
    }

    /// Number of fetches currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn finish(&self, key: &str) {
        if let Some(sender) = self.in_flight.lock().remove(key) {
            let _ = sender.send(true);
        }
    }
}

/// Result of acquiring a coalescing slot
#[derive(Debug)]
pub enum CoalescingSlot {
    /// First request for the key. Followers are released when the guard drops.
    Leader(LeaderGuard),

    /// Another request's fetch has finished; re-check the store.
    Follower,
}

impl CoalescingSlot {
    pub fn is_leader(&self) -> bool {
        matches!(self, CoalescingSlot::Leader(_))
    }

    pub fn is_follower(&self) -> bool {
        matches!(self, CoalescingSlot::Follower)
    }
}

/// Guard held by the leader request
/// When dropped, removes the in-flight entry and wakes every follower
#[derive(Debug)]
pub struct LeaderGuard {
    key: String,
    coalescer: RequestCoalescer,
}

impl LeaderGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.coalescer.finish(&self.key);
    }
}
