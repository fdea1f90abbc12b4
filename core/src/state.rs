//! The coordinating lock around the dispatch counters.
//!
//! Workers and the arrival listener both go through this one lock; there is
//! no lock-free fast path, since exact counts and exact block-boundary
//! detection depend on full serialization.

use std::sync::{Mutex, MutexGuard, PoisonError};

use aircontrol_types::{Counters, DispatchStep};

/// Shared dispatch state. One per tower run.
#[derive(Debug, Default)]
pub struct DispatchState {
    counters: Mutex<Counters>,
}

impl DispatchState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::new()),
        }
    }

    /// Resume from a known counter state. The invariants hold by
    /// construction on [`Counters`] itself.
    #[must_use]
    pub const fn with_counters(counters: Counters) -> Self {
        Self {
            counters: Mutex::new(counters),
        }
    }

    /// The atomic check-and-update: no other worker can observe `waiting`
    /// or `block_count` between the check and the update.
    pub fn dispatch(&self) -> DispatchStep {
        self.lock().step()
    }

    /// One arrival burst, from the asynchronous listener context. Takes the
    /// same lock as the workers; never bypasses it.
    pub fn record_arrivals(&self) {
        self.lock().record_arrivals();
    }

    /// Fast-path quota check workers run before contending for a runway.
    #[must_use]
    pub fn quota_reached(&self) -> bool {
        self.lock().quota_reached()
    }

    /// A consistent copy of all three counters.
    #[must_use]
    pub fn snapshot(&self) -> Counters {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Counter updates cannot panic midway, so a poisoned lock still
        // holds consistent counters.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use aircontrol_types::{BATCH_ARRIVAL_SIZE, BLOCK_SIZE, DispatchStep, TOTAL_TAKEOFFS};

    use super::DispatchState;

    #[test]
    fn concurrent_dispatch_never_exceeds_the_quota() {
        let state = Arc::new(DispatchState::new());

        // More bursts than the quota needs, injected concurrently with the
        // consumers.
        let injector = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for _ in 0..8 {
                    state.record_arrivals();
                    thread::yield_now();
                }
            })
        };

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    let mut authorized = 0u32;
                    loop {
                        match state.dispatch() {
                            DispatchStep::Authorized { .. } => authorized += 1,
                            DispatchStep::NoWork => thread::yield_now(),
                            DispatchStep::QuotaReached => return authorized,
                        }
                    }
                })
            })
            .collect();

        injector.join().expect("injector");
        let total: u32 = consumers
            .into_iter()
            .map(|handle| handle.join().expect("consumer"))
            .sum();

        assert_eq!(total, TOTAL_TAKEOFFS);

        let counters = state.snapshot();
        assert_eq!(counters.completed(), TOTAL_TAKEOFFS);
        assert_eq!(
            counters.waiting(),
            8 * BATCH_ARRIVAL_SIZE - TOTAL_TAKEOFFS
        );
        assert!(counters.block_count() < BLOCK_SIZE);
    }

    #[test]
    fn snapshot_is_internally_consistent() {
        let state = DispatchState::new();
        state.record_arrivals();
        let _ = state.dispatch();

        let counters = state.snapshot();
        assert_eq!(counters.waiting(), BATCH_ARRIVAL_SIZE - 1);
        assert_eq!(counters.completed(), 1);
        assert_eq!(counters.block_count(), 1);
        assert!(!state.quota_reached());
    }
}
