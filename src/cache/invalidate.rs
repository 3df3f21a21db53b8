//! Tag invalidation.

use std::collections::BTreeSet;

use metrics::counter;
use tracing::{info, instrument};

use super::keys::Tag;
use super::service::{METRIC_CACHE_INVALIDATED, TagCache};

/// Outcome of one invalidation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InvalidationReport {
    /// Tags that were invalidated, deduplicated.
    pub tags: BTreeSet<Tag>,
    /// Entries removed by this call.
    pub purged: usize,
}

impl TagCache {
    /// Remove every entry tagged with at least one of `tags`.
    ///
    /// Each tag's epoch is bumped before its keys are collected, so a
    /// recomputation already in flight for one of those tags discards its
    /// result instead of storing pre-invalidation data. Tags that were never
    /// used are not an error. Entries unrelated to `tags` are untouched.
    #[instrument(skip(self, tags))]
    pub fn invalidate<I>(&self, tags: I) -> InvalidationReport
    where
        I: IntoIterator<Item = Tag>,
    {
        let tags: BTreeSet<Tag> = tags.into_iter().collect();
        if tags.is_empty() {
            return InvalidationReport::default();
        }

        for tag in &tags {
            self.index.bump(tag);
        }

        let mut purged = 0;
        for key in self.index.keys_for_tags(&tags) {
            if self.store.delete(&key, &self.index).is_some() {
                purged += 1;
            }
        }

        for tag in &tags {
            counter!(METRIC_CACHE_INVALIDATED, "tag" => tag.to_string()).increment(1);
        }
        self.record_entries();

        info!(tags = ?tags, purged, "Cache tags invalidated");
        InvalidationReport { tags, purged }
    }

    /// Invalidate a single tag.
    pub fn invalidate_tag(&self, tag: &Tag) -> InvalidationReport {
        self.invalidate([tag.clone()])
    }

    /// Drop every entry and invalidate every known tag.
    ///
    /// The purge generation is bumped first, so producers in flight discard
    /// their results whatever tags they carry.
    pub fn purge_all(&self) -> InvalidationReport {
        let tags = self.index.known_tags();
        self.index.bump_all();

        let mut purged = 0;
        for key in self.store.keys() {
            if self.store.delete(&key, &self.index).is_some() {
                purged += 1;
            }
        }
        self.record_entries();

        info!(purged, "Cache purged");
        InvalidationReport {
            tags: tags.into_iter().collect(),
            purged,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::error::CacheError;

    async fn fill(cache: &TagCache, operation: &str, tags: &[Tag]) {
        cache
            .cached(operation, &(), Duration::from_secs(60), tags, || async {
                Ok::<_, CacheError>(operation.len())
            })
            .await
            .expect("value");
    }

    #[tokio::test]
    async fn invalidation_only_touches_tagged_entries() {
        let cache = TagCache::new(CacheConfig::default());
        let events = Tag::from_static("events");
        let jobs = Tag::from_static("jobs");

        fill(&cache, "events.upcoming", &[events.clone()]).await;
        fill(&cache, "events.by_slug", &[events.clone()]).await;
        fill(&cache, "jobs.open", &[jobs.clone()]).await;

        let report = cache.invalidate([events.clone()]);

        assert_eq!(report.purged, 2);
        assert_eq!(report.tags, BTreeSet::from([events.clone()]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entries_tagged(&events), 0);
        assert_eq!(cache.entries_tagged(&jobs), 1);
    }

    #[tokio::test]
    async fn multi_tag_entry_goes_with_either_tag() {
        let cache = TagCache::new(CacheConfig::default());
        let events = Tag::from_static("events");
        let jobs = Tag::from_static("jobs");

        fill(&cache, "home.feed", &[events.clone(), jobs.clone()]).await;

        let report = cache.invalidate_tag(&jobs);
        assert_eq!(report.purged, 1);
        assert!(cache.is_empty());
        assert_eq!(cache.tag_count(), 0);
    }

    #[test]
    fn unknown_and_empty_tags_are_no_ops() {
        let cache = TagCache::new(CacheConfig::default());

        assert_eq!(cache.invalidate(Vec::<Tag>::new()), InvalidationReport::default());

        let report = cache.invalidate([Tag::new("never-used")]);
        assert_eq!(report.purged, 0);
        assert_eq!(report.tags.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_tags_are_collapsed() {
        let cache = TagCache::new(CacheConfig::default());
        let blog = Tag::from_static("blog");
        fill(&cache, "posts.recent", &[blog.clone()]).await;

        let report = cache.invalidate([blog.clone(), blog.clone()]);
        assert_eq!(report.tags.len(), 1);
        assert_eq!(report.purged, 1);
    }

    #[tokio::test]
    async fn purge_all_empties_the_cache() {
        let cache = Arc::new(TagCache::new(CacheConfig::default()));
        fill(&cache, "events.upcoming", &[Tag::from_static("events")]).await;
        fill(&cache, "dashboard.stats", &[]).await;

        let report = cache.purge_all();
        assert_eq!(report.purged, 2);
        assert!(report.tags.contains(&Tag::from_static("events")));
        assert!(cache.is_empty());
        assert_eq!(cache.tag_count(), 0);
    }
}
