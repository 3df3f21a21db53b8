//! Tag index.
//!
//! Maps each tag to the cache keys registered under it, so a single write can
//! find every derived view of its data domain. Each tag also carries an epoch
//! that invalidation bumps; producers compare epochs before and after running
//! to detect an invalidation that raced with them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::keys::{CacheKey, Tag};

/// Monotonic invalidation counter of one tag.
pub type Epoch = u64;

/// Epochs of a set of tags, captured before a producer runs, together with the
/// purge generation.
#[derive(Debug, Clone, Default)]
pub struct EpochSnapshot {
    generation: Epoch,
    tags: Vec<(Tag, Epoch)>,
}

/// Tracks tag → cache keys mappings.
///
/// Invariant: a key is listed under a tag iff the stored entry for that key
/// carries the tag. The entry store keeps this true by calling `register` and
/// `unregister` under the key's shard lock.
pub struct TagIndex {
    keys: DashMap<Tag, HashSet<CacheKey>>,
    epochs: DashMap<Tag, Epoch>,
    generation: AtomicU64,
}

impl TagIndex {
    pub fn new() -> Self {
        Self {
            keys: DashMap::new(),
            epochs: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Add `key` under `tag`. Idempotent.
    pub fn register(&self, tag: &Tag, key: &CacheKey) {
        self.keys.entry(tag.clone()).or_default().insert(key.clone());
    }

    /// Remove `key` from each of `tags`, dropping tag sets that become empty.
    pub fn unregister<'a, I>(&self, key: &CacheKey, tags: I)
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        for tag in tags {
            let emptied = match self.keys.get_mut(tag) {
                Some(mut set) => {
                    set.remove(key);
                    set.is_empty()
                }
                None => false,
            };
            if emptied {
                self.keys.remove_if(tag, |_, set| set.is_empty());
            }
        }
    }

    /// Union of the keys registered under any of `tags`.
    pub fn keys_for_tags<'a, I>(&self, tags: I) -> HashSet<CacheKey>
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let mut keys = HashSet::new();
        for tag in tags {
            if let Some(set) = self.keys.get(tag) {
                keys.extend(set.iter().cloned());
            }
        }
        keys
    }

    pub fn epoch(&self, tag: &Tag) -> Epoch {
        self.epochs.get(tag).map(|epoch| *epoch).unwrap_or(0)
    }

    /// Advance the epoch of `tag`, returning the new value.
    pub fn bump(&self, tag: &Tag) -> Epoch {
        let mut epoch = self.epochs.entry(tag.clone()).or_insert(0);
        *epoch += 1;
        *epoch
    }

    /// Advance the purge generation, outdating every snapshot taken so far,
    /// including those over tags the index has never seen.
    pub fn bump_all(&self) -> Epoch {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn snapshot<'a, I>(&self, tags: I) -> EpochSnapshot
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        EpochSnapshot {
            generation: self.generation.load(Ordering::SeqCst),
            tags: tags
                .into_iter()
                .map(|tag| (tag.clone(), self.epoch(tag)))
                .collect(),
        }
    }

    /// True when no purge happened and none of the snapshotted tags were
    /// invalidated since.
    pub fn is_current(&self, snapshot: &EpochSnapshot) -> bool {
        self.generation.load(Ordering::SeqCst) == snapshot.generation
            && snapshot
                .tags
                .iter()
                .all(|(tag, epoch)| self.epoch(tag) == *epoch)
    }

    /// Every tag that currently has keys or has ever been invalidated.
    pub fn known_tags(&self) -> HashSet<Tag> {
        let mut tags: HashSet<Tag> = self.keys.iter().map(|item| item.key().clone()).collect();
        tags.extend(self.epochs.iter().map(|item| item.key().clone()));
        tags
    }

    /// Number of tags with at least one registered key.
    pub fn tag_count(&self) -> usize {
        self.keys.len()
    }

    pub fn key_count(&self, tag: &Tag) -> usize {
        self.keys.get(tag).map(|set| set.len()).unwrap_or(0)
    }
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::derive_key;

    fn key(name: &str) -> CacheKey {
        derive_key(name, &()).expect("key")
    }

    #[test]
    fn register_and_lookup() {
        let index = TagIndex::new();
        let events = Tag::from_static("events");
        let upcoming = key("events.upcoming");

        index.register(&events, &upcoming);
        index.register(&events, &upcoming);

        let keys = index.keys_for_tags([&events]);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&upcoming));
    }

    #[test]
    fn keys_for_tags_is_a_union() {
        let index = TagIndex::new();
        let events = Tag::from_static("events");
        let jobs = Tag::from_static("jobs");
        let upcoming = key("events.upcoming");
        let open_jobs = key("jobs.open");
        let feed = key("home.feed");

        index.register(&events, &upcoming);
        index.register(&jobs, &open_jobs);
        index.register(&events, &feed);
        index.register(&jobs, &feed);

        let keys = index.keys_for_tags([&events, &jobs]);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn unregister_cleans_up_empty_tags() {
        let index = TagIndex::new();
        let events = Tag::from_static("events");
        let upcoming = key("events.upcoming");

        index.register(&events, &upcoming);
        assert_eq!(index.tag_count(), 1);

        index.unregister(&upcoming, [&events]);
        assert_eq!(index.tag_count(), 0);
        assert!(index.keys_for_tags([&events]).is_empty());

        // Idempotent.
        index.unregister(&upcoming, [&events]);
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn unregister_keeps_other_keys() {
        let index = TagIndex::new();
        let blog = Tag::from_static("blog");
        let recent = key("posts.recent");
        let detail = key("posts.by_slug");

        index.register(&blog, &recent);
        index.register(&blog, &detail);
        index.unregister(&recent, [&blog]);

        assert_eq!(index.key_count(&blog), 1);
        assert!(index.keys_for_tags([&blog]).contains(&detail));
    }

    #[test]
    fn snapshot_detects_bumps() {
        let index = TagIndex::new();
        let events = Tag::from_static("events");
        let stats = Tag::from_static("stats");

        let snapshot = index.snapshot([&events, &stats]);
        assert!(index.is_current(&snapshot));

        assert_eq!(index.bump(&stats), 1);
        assert!(!index.is_current(&snapshot));

        let fresh = index.snapshot([&events]);
        assert!(index.is_current(&fresh));
    }

    #[test]
    fn purge_generation_outdates_every_snapshot() {
        let index = TagIndex::new();
        let untagged = index.snapshot(std::iter::empty::<&Tag>());
        let unseen = index.snapshot([&Tag::from_static("never-used")]);

        assert_eq!(index.bump_all(), 1);

        assert!(!index.is_current(&untagged));
        assert!(!index.is_current(&unseen));
        assert!(index.is_current(&index.snapshot([&Tag::from_static("never-used")])));
    }

    #[test]
    fn known_tags_include_invalidated_ones() {
        let index = TagIndex::new();
        index.bump(&Tag::from_static("jobs"));
        index.register(&Tag::from_static("blog"), &key("posts.recent"));

        let tags = index.known_tags();
        assert!(tags.contains(&Tag::from_static("jobs")));
        assert!(tags.contains(&Tag::from_static("blog")));
    }
}
