//! Cache configuration.
//!
//! Built from the `[cache]` table of `corkboard.toml` (see `crate::config`).

use std::time::Duration;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Runtime switches of the query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every read goes straight to its producer.
    pub enabled: bool,
    /// Coalesce concurrent recomputations of one key.
    pub single_flight: bool,
    /// Cadence of the background sweep of expired entries. Zero disables it.
    pub sweep_interval: Duration,
    /// Default upper bound on a producer call, overridable per call site.
    pub producer_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            single_flight: true,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            producer_timeout: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            single_flight: settings.single_flight,
            sweep_interval: settings.sweep_interval,
            producer_timeout: settings.producer_timeout,
        }
    }
}

impl CacheConfig {
    /// Sweep interval, or `None` when sweeping is disabled.
    pub fn sweep_every(&self) -> Option<Duration> {
        (!self.sweep_interval.is_zero()).then_some(self.sweep_interval)
    }
}
