//! The runway pool: two independent exclusive resources.
//!
//! Two distinct locks rather than a semaphore of two keeps the runways
//! distinguishable (future per-runway specialization) and acquisition O(1).
//! Acquisition is non-blocking with runway1 preferred; release is RAII, so
//! it happens exactly once on every exit path.

use std::sync::{Mutex, MutexGuard};

/// Which runway a guard holds. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunwayId {
    Runway1,
    Runway2,
}

/// Exclusive hold on one runway; released on drop. Never held across loop
/// iterations by a well-behaved worker.
pub struct RunwayGuard<'a> {
    id: RunwayId,
    _guard: MutexGuard<'a, ()>,
}

impl RunwayGuard<'_> {
    #[must_use]
    pub fn id(&self) -> RunwayId {
        self.id
    }
}

/// The two runways.
#[derive(Debug, Default)]
pub struct RunwayPool {
    runway1: Mutex<()>,
    runway2: Mutex<()>,
}

impl RunwayPool {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            runway1: Mutex::new(()),
            runway2: Mutex::new(()),
        }
    }

    /// Try runway1, then runway2; `None` when both are busy.
    ///
    /// There is no fairness guarantee beyond the fixed preference order;
    /// correctness depends only on mutual exclusion. A poisoned runway lock
    /// is treated as busy.
    #[must_use]
    pub fn try_acquire_any(&self) -> Option<RunwayGuard<'_>> {
        if let Ok(guard) = self.runway1.try_lock() {
            return Some(RunwayGuard {
                id: RunwayId::Runway1,
                _guard: guard,
            });
        }
        self.runway2.try_lock().ok().map(|guard| RunwayGuard {
            id: RunwayId::Runway2,
            _guard: guard,
        })
    }
}
