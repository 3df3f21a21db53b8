//! Entry store.
//!
//! Holds cached results keyed by `CacheKey` in a sharded map, so unrelated keys
//! never wait on one another. Every insertion and removal also updates the tag
//! index while the key's shard lock is held, which keeps the two structures in
//! agreement without a global lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::entry::{CacheEntry, CachedValue};
use super::index::{EpochSnapshot, TagIndex};
use super::keys::{CacheKey, Tag};

/// Outcome of a store lookup.
pub enum Lookup {
    /// A live entry was found.
    Hit(CachedValue),
    /// An entry existed but had expired; it has been removed.
    Expired,
    Miss,
}

/// Outcome of [`EntryStore::put`].
#[derive(Debug)]
pub enum Admission {
    /// The entry was stored, replacing the previous one under its key if any.
    Stored(Option<CacheEntry>),
    /// A tag of the entry was invalidated after `epochs` were captured; the
    /// store is unchanged.
    Stale,
}

pub struct EntryStore {
    entries: DashMap<CacheKey, CacheEntry>,
    len: AtomicUsize,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Look up a live entry.
    ///
    /// Expired entries are never returned: they are deleted on touch and
    /// reported as `Lookup::Expired`.
    pub fn get(&self, key: &CacheKey, now: Instant, index: &TagIndex) -> Lookup {
        let live = match self.entries.get(key) {
            Some(entry) => entry.is_live(now).then(|| Arc::clone(&entry.value)),
            None => return Lookup::Miss,
        };

        match live {
            Some(value) => Lookup::Hit(value),
            None => {
                self.remove_where(key, index, |entry| !entry.is_live(now));
                Lookup::Expired
            }
        }
    }

    /// Insert `entry`, replacing any entry under the same key, unless one of
    /// its tags was invalidated since `epochs` were captured.
    ///
    /// Tags are registered before the epochs are checked, both under the
    /// key's shard lock. An invalidation that bumps after the check therefore
    /// finds the key in the index and waits on the shard lock to delete it,
    /// and one that bumped before the check makes the put a no-op. Either way
    /// no read that starts after the invalidation returned can see the entry.
    pub fn put(&self, entry: CacheEntry, index: &TagIndex, epochs: &EpochSnapshot) -> Admission {
        match self.entries.entry(entry.key.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = &occupied.get().tags;
                let added: Vec<Tag> = entry.tags.difference(previous).cloned().collect();
                for tag in &added {
                    index.register(tag, &entry.key);
                }
                if !index.is_current(epochs) {
                    index.unregister(&entry.key, &added);
                    return Admission::Stale;
                }

                let dropped: Vec<Tag> = previous.difference(&entry.tags).cloned().collect();
                index.unregister(&entry.key, &dropped);
                Admission::Stored(Some(occupied.insert(entry)))
            }
            Entry::Vacant(vacant) => {
                for tag in &entry.tags {
                    index.register(tag, &entry.key);
                }
                if !index.is_current(epochs) {
                    index.unregister(&entry.key, &entry.tags);
                    return Admission::Stale;
                }

                vacant.insert(entry);
                self.len.fetch_add(1, Ordering::Relaxed);
                Admission::Stored(None)
            }
        }
    }

    /// Remove the entry under `key`. No-op when absent.
    pub fn delete(&self, key: &CacheKey, index: &TagIndex) -> Option<CacheEntry> {
        self.remove_where(key, index, |_| true)
    }

    /// Remove the entry under `key` if it has expired by `now`.
    pub fn remove_expired(&self, key: &CacheKey, now: Instant, index: &TagIndex) -> bool {
        self.remove_where(key, index, |entry| !entry.is_live(now))
            .is_some()
    }

    /// Keys whose entries have expired by `now`.
    ///
    /// Shards are visited one at a time; the result may be stale by the time
    /// it is used, so removal re-checks expiry.
    pub fn expired_keys(&self, now: Instant) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|item| !item.value().is_live(now))
            .map(|item| item.key().clone())
            .collect()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|item| item.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_where(
        &self,
        key: &CacheKey,
        index: &TagIndex,
        predicate: impl FnOnce(&CacheEntry) -> bool,
    ) -> Option<CacheEntry> {
        let Entry::Occupied(occupied) = self.entries.entry(key.clone()) else {
            return None;
        };
        if !predicate(occupied.get()) {
            return None;
        }

        index.unregister(key, &occupied.get().tags);
        let removed = occupied.remove();
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(removed)
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}
