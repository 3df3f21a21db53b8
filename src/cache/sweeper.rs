//! Background reclamation of expired entries.
//!
//! Expiry is enforced on read, so the sweeper only bounds memory held by
//! entries nobody asks for any more.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::service::{METRIC_CACHE_SWEPT, TagCache};

impl TagCache {
    /// Remove every entry that has expired by now. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self
            .store
            .expired_keys(now)
            .iter()
            .filter(|key| self.store.remove_expired(key, now, &self.index))
            .count();

        if removed > 0 {
            counter!(METRIC_CACHE_SWEPT).increment(removed as u64);
            self.record_entries();
            debug!(removed, "Expired cache entries swept");
        }
        removed
    }
}

/// Run [`TagCache::sweep_expired`] every `every` until the handle is aborted.
pub fn spawn_sweeper(cache: Arc<TagCache>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Cache sweeper started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // First tick completes immediately
        loop {
            interval.tick().await;
            cache.sweep_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::error::CacheError;
    use crate::cache::keys::Tag;
    use crate::cache::ttl::ManualClock;

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let clock = Arc::new(ManualClock::new());
        let cache = TagCache::with_clock(CacheConfig::default(), Arc::clone(&clock));
        let stats = Tag::from_static("stats");

        for (operation, ttl) in [("dashboard.stats", 300), ("events.upcoming", 3600)] {
            cache
                .cached(operation, &(), Duration::from_secs(ttl), &[stats.clone()], || async {
                    Ok::<_, CacheError>(ttl)
                })
                .await
                .expect("value");
        }

        assert_eq!(cache.sweep_expired(), 0);
        clock.advance(Duration::from_secs(600));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entries_tagged(&stats), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_runs_on_its_interval() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(TagCache::with_clock(
            CacheConfig::default(),
            Arc::clone(&clock),
        ));
        cache
            .cached("posts.recent", &(5,), Duration::from_secs(1), &[], || async {
                Ok::<_, CacheError>(5)
            })
            .await
            .expect("value");
        clock.advance(Duration::from_secs(2));

        let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert!(cache.is_empty());
        handle.abort();
    }
}
