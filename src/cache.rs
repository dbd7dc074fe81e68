use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;

use crate::types::Leaderboard;

struct CacheEntry {
    value: Arc<Leaderboard>,
    expires_at: Instant,
}

/// Short-lived in-memory leaderboard cache.
///
/// Entries expire `ttl` after insertion. Expiry is checked when an entry is
/// read; there is no background sweeper.
pub struct FreshnessCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl FreshnessCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Arc<Leaderboard>> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if now < entry.expires_at {
                return Some(entry.value.clone());
            }
        }

        // Re-checked under the shard lock, a concurrent put may have refreshed it.
        self.entries.remove_if(key, |_, entry| now >= entry.expires_at);
        None
    }

    pub fn put(&self, key: &str, value: Arc<Leaderboard>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
