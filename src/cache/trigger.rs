//! Cache trigger service.
//!
//! Write paths call into the trigger after a successful mutation; it maps the
//! mutated resource to the tags whose derived views are now stale.

use std::sync::Arc;

use tracing::debug;

use crate::domain::tags;

use super::invalidate::InvalidationReport;
use super::keys::Tag;
use super::service::TagCache;

/// Invalidation entry point for write operations.
///
/// # Usage
///
/// ```ignore
/// // After a successful job insert:
/// trigger.jobs_changed();
/// ```
#[derive(Clone)]
pub struct CacheTrigger {
    cache: Arc<TagCache>,
}

impl CacheTrigger {
    pub fn new(cache: Arc<TagCache>) -> Self {
        Self { cache }
    }

    /// Invalidate `tags`. A no-op while the cache is disabled.
    pub fn invalidate<I>(&self, tags: I) -> InvalidationReport
    where
        I: IntoIterator<Item = Tag>,
    {
        if !self.cache.config().enabled {
            debug!("Cache trigger skipped: cache disabled");
            return InvalidationReport::default();
        }
        self.cache.invalidate(tags)
    }

    /// An event was created, updated or deleted.
    pub fn events_changed(&self) -> InvalidationReport {
        self.invalidate([tags::EVENTS])
    }

    /// A blog post was created, updated or deleted.
    pub fn posts_changed(&self) -> InvalidationReport {
        self.invalidate([tags::BLOG])
    }

    /// A job posting was created, updated or deleted.
    pub fn jobs_changed(&self) -> InvalidationReport {
        self.invalidate([tags::JOBS])
    }

    pub fn purge_all(&self) -> InvalidationReport {
        if !self.cache.config().enabled {
            debug!("Cache purge skipped: cache disabled");
            return InvalidationReport::default();
        }
        self.cache.purge_all()
    }
}
