use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::keys::{CacheKey, Tag};
use super::ttl::Expiry;

/// Type-erased payload; call sites downcast back to their own value type.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// One memoized result.
///
/// Entries are replaced wholesale on recomputation and never mutated in place.
#[derive(Clone)]
pub struct CacheEntry {
    /// Generation of this entry, unique per cache instance.
    pub(crate) id: u64,
    pub key: CacheKey,
    pub value: CachedValue,
    pub created_at: Instant,
    pub expires_at: Expiry,
    pub tags: BTreeSet<Tag>,
}

impl CacheEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_live(now)
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
