//! Time-to-live policy and the clock it is evaluated against.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic time for entry creation and expiry checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall-clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Lets expiry be exercised without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Instant {
        C::now(self)
    }
}

/// Point in time after which an entry is no longer served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    At(Instant),
    /// The TTL overflowed the clock's range.
    Never,
}

impl Expiry {
    /// `expires_at = now + ttl`, evaluated once at entry creation.
    pub fn after(now: Instant, ttl: Duration) -> Self {
        now.checked_add(ttl).map_or(Self::Never, Self::At)
    }

    pub fn is_live(&self, now: Instant) -> bool {
        match self {
            Self::At(deadline) => now < *deadline,
            Self::Never => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_live_until_deadline() {
        let clock = ManualClock::new();
        let expiry = Expiry::after(clock.now(), Duration::from_secs(300));

        assert!(expiry.is_live(clock.now()));
        clock.advance(Duration::from_secs(299));
        assert!(expiry.is_live(clock.now()));
        clock.advance(Duration::from_secs(1));
        assert!(!expiry.is_live(clock.now()));
    }

    #[test]
    fn overflowing_ttl_never_expires() {
        let clock = ManualClock::new();
        let expiry = Expiry::after(clock.now(), Duration::MAX);
        assert_eq!(expiry, Expiry::Never);
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert!(expiry.is_live(clock.now()));
    }

    #[test]
    fn shared_clock_observes_advances() {
        let clock = Arc::new(ManualClock::new());
        let handle = Arc::clone(&clock);
        let before = handle.now();
        clock.advance(Duration::from_millis(5));
        assert_eq!(handle.now() - before, Duration::from_millis(5));
    }
}
