//! Corkboard query cache
//!
//! Memoizes the results of read operations (listings, detail lookups,
//! dashboard aggregates) with a time-to-live and a set of tags:
//!
//! - **Keys** are derived from the operation name and its serialized
//!   arguments, so distinct argument tuples never share an entry.
//! - **TTL** expiry is checked on every read; an optional sweeper reclaims
//!   entries nobody reads any more.
//! - **Tags** group entries by data domain (`events`, `blog`, `jobs`,
//!   `stats`). A write invalidates its tag and every derived view of that
//!   domain is recomputed on next access.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! single_flight = true
//! sweep_interval_seconds = 60
//! producer_timeout_ms = 0
//! ```

mod config;
mod entry;
mod error;
mod flight;
mod index;
mod invalidate;
mod keys;
mod service;
mod store;
mod sweeper;
mod trigger;
mod ttl;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedValue};
pub use error::{CacheError, KeyError};
pub use index::Epoch;
pub use invalidate::InvalidationReport;
pub use keys::{CacheKey, Tag, derive_key};
pub use service::{CachePolicy, TagCache};
pub use sweeper::spawn_sweeper;
pub use trigger::CacheTrigger;
pub use ttl::{Clock, Expiry, ManualClock, SystemClock};

pub(crate) use service::{
    METRIC_CACHE_COALESCED, METRIC_CACHE_DISCARDED, METRIC_CACHE_ENTRIES, METRIC_CACHE_EXPIRED,
    METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS, METRIC_CACHE_PRODUCER_ERROR,
    METRIC_CACHE_PRODUCER_MS, METRIC_CACHE_SWEPT,
};
