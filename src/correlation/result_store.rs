//! Process-wide map from correlation id to completed result
//!
//! Written once by engine-side page work, read and evicted by the caller.
//! Entries for callers that timed out are evicted by the caller's reaper or,
//! failing that, by the periodic TTL sweep.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::ScrapeResult;

/// Initial capacity for the result map
///
/// Sized for a few dozen concurrent callers; the map grows as needed.
const RESULT_STORE_INITIAL_CAPACITY: usize = 64;

#[derive(Debug)]
struct StoredResult {
    result: ScrapeResult,
    stored_at: Instant,
}

/// Concurrent result map keyed by correlation id
#[derive(Debug)]
pub struct ResultStore {
    results: DashMap<String, StoredResult>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            results: DashMap::with_capacity(RESULT_STORE_INITIAL_CAPACITY),
        }
    }

    /// Record the result for `id`
    ///
    /// Results are write-once: a second write for the same id is ignored and
    /// `false` is returned.
    pub fn insert(&self, id: &str, result: ScrapeResult) -> bool {
        match self.results.entry(id.to_string()) {
            Entry::Occupied(_) => {
                warn!("[{}] Result already stored, ignoring second write", id);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(StoredResult {
                    result,
                    stored_at: Instant::now(),
                });
                true
            }
        }
    }

    /// Remove and return the result for `id`
    pub fn take(&self, id: &str) -> Option<ScrapeResult> {
        self.results.remove(id).map(|(_, stored)| stored.result)
    }

    /// Evict the entry for `id` if present
    pub fn remove(&self, id: &str) {
        self.results.remove(id);
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.results.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Drop entries stored longer ago than `ttl`, returning how many went
    pub fn sweep_older_than(&self, ttl: Duration) -> usize {
        let before = self.results.len();
        self.results.retain(|id, stored| {
            let keep = stored.stored_at.elapsed() < ttl;
            if !keep {
                debug!("[{}] Sweeping orphaned result (age {:?})", id, stored.stored_at.elapsed());
            }
            keep
        });
        before.saturating_sub(self.results.len())
    }

    /// Spawn the periodic TTL sweep; stops when `cancel` fires
    pub fn start_sweep_task(
        self: Arc<Self>,
        ttl: Duration,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let swept = self.sweep_older_than(ttl);
                        if swept > 0 {
                            debug!("Swept {} orphaned results", swept);
                        }
                    }
                }
            }
        })
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldMap;

    fn result(url: &str) -> ScrapeResult {
        ScrapeResult::success(url, FieldMap::new(), Duration::ZERO)
    }

    #[test]
    fn second_write_is_ignored() {
        let store = ResultStore::new();
        assert!(store.insert("a", result("https://first.example")));
        assert!(!store.insert("a", result("https://second.example")));
        assert_eq!(store.take("a").map(|r| r.url), Some("https://first.example".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_drops_only_stale_entries() {
        let store = ResultStore::new();
        store.insert("old", result("https://example.com"));
        std::thread::sleep(Duration::from_millis(20));
        store.insert("new", result("https://example.com"));

        assert_eq!(store.sweep_older_than(Duration::from_millis(10)), 1);
        assert!(!store.contains("old"));
        assert!(store.contains("new"));
    }
}
