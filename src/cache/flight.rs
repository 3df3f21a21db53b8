//! Per-key single-flight.
//!
//! While one caller recomputes a key, other callers for the same key wait on
//! that key's slot and then re-read the store instead of running their own
//! producer. Slots are removed once nobody holds or awaits them, including
//! when the last waiter is cancelled before its turn.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;

use super::keys::CacheKey;

/// One permit: the right to recompute the key.
type Slot = Arc<Semaphore>;

#[derive(Default)]
pub struct SingleFlight {
    slots: DashMap<CacheKey, Slot>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Wait until this caller is the only one recomputing `key`.
    pub async fn acquire(&self, key: &CacheKey) -> FlightGuard<'_> {
        let slot = Arc::clone(
            &self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(1))),
        );
        let mut guard = FlightGuard {
            flights: self,
            key: key.clone(),
            slot,
            holds_permit: false,
        };

        // The guard exists before the wait, so dropping this future mid-wait
        // still runs the slot cleanup. The semaphore is never closed.
        if let Ok(permit) = guard.slot.acquire().await {
            permit.forget();
            guard.holds_permit = true;
        }
        guard
    }

    /// Number of keys with a caller in flight or waiting.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

pub struct FlightGuard<'a> {
    flights: &'a SingleFlight,
    key: CacheKey,
    slot: Slot,
    holds_permit: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.holds_permit {
            self.slot.add_permits(1);
        }
        // Two references remain when nobody else holds or waits: the map's and ours.
        self.flights.slots.remove_if(&self.key, |_, slot| {
            Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::keys::derive_key;

    #[tokio::test]
    async fn slot_is_released_after_last_guard() {
        let flights = SingleFlight::new();
        let key = derive_key("events.upcoming", &(10,)).expect("key");

        {
            let _guard = flights.acquire(&key).await;
            assert_eq!(flights.in_flight(), 1);
        }

        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn callers_for_one_key_run_one_at_a_time() {
        let flights = Arc::new(SingleFlight::new());
        let key = derive_key("jobs.open", &()).expect("key");
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let key = key.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = flights.acquire(&key).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn a_waiter_cancelled_after_the_leader_left_frees_the_slot() {
        let flights = Arc::new(SingleFlight::new());
        let key = derive_key("events.by_slug", &("no-such-event",)).expect("key");

        let leader = flights.acquire(&key).await;
        let waiter = tokio::spawn({
            let flights = Arc::clone(&flights);
            let key = key.clone();
            async move {
                let _guard = flights.acquire(&key).await;
                std::future::pending::<()>().await;
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(leader);
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn a_waiter_cancelled_before_the_leader_left_frees_the_slot() {
        let flights = Arc::new(SingleFlight::new());
        let key = derive_key("jobs.by_slug", &("sre-acme",)).expect("key");

        let leader = flights.acquire(&key).await;
        let waiter = tokio::spawn({
            let flights = Arc::clone(&flights);
            let key = key.clone();
            async move {
                let _guard = flights.acquire(&key).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(flights.in_flight(), 1);

        drop(leader);
        assert_eq!(flights.in_flight(), 0);

        let again = tokio::time::timeout(Duration::from_millis(100), flights.acquire(&key))
            .await
            .expect("slot must be free");
        drop(again);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let flights = SingleFlight::new();
        let events = derive_key("events.upcoming", &(10,)).expect("key");
        let jobs = derive_key("jobs.open", &()).expect("key");

        let _events_guard = flights.acquire(&events).await;
        let jobs_guard = tokio::time::timeout(Duration::from_millis(100), flights.acquire(&jobs))
            .await
            .expect("independent key should not wait");
        assert_eq!(flights.in_flight(), 2);
        drop(jobs_guard);
        assert_eq!(flights.in_flight(), 1);
    }
}
