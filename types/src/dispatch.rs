//! The dispatch step: the pure check-and-update at the heart of the tower.
//!
//! [`Counters`] holds the three coordinated fields; [`Counters::step`] is the
//! single atomic unit workers execute under the coordinating lock. Keeping it
//! free of locks and IO makes the protocol exhaustively testable.

use thiserror::Error;

use crate::{BATCH_ARRIVAL_SIZE, BLOCK_SIZE, TOTAL_TAKEOFFS};

/// Outcome of one dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    /// A takeoff was authorized. When `block_complete` is set, this step
    /// finished a block and the radio must be notified (once).
    Authorized { block_complete: bool },
    /// No planes are waiting; back off and retry.
    NoWork,
    /// The quota has been reached; the worker must exit its loop.
    QuotaReached,
}

#[derive(Debug, Error)]
pub enum CountersError {
    #[error("block count {block_count} must be below the block size ({BLOCK_SIZE})")]
    BlockOutOfRange { block_count: u32 },
    #[error("completed count {completed} must not exceed the quota ({TOTAL_TAKEOFFS})")]
    QuotaExceeded { completed: u32 },
}

/// The coordinated counters: waiting planes, rolling block count, and the
/// global completed count.
///
/// Invariants, valid by construction and preserved by every operation:
/// `block_count < BLOCK_SIZE`, `completed <= TOTAL_TAKEOFFS`, and `waiting`
/// never underflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    waiting: u32,
    block_count: u32,
    completed: u32,
}

impl Counters {
    /// All counters at zero: the state before any arrivals.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            waiting: 0,
            block_count: 0,
            completed: 0,
        }
    }

    /// Construct a mid-flight state, validating the invariants.
    pub fn with_counts(waiting: u32, block_count: u32, completed: u32) -> Result<Self, CountersError> {
        if block_count >= BLOCK_SIZE {
            return Err(CountersError::BlockOutOfRange { block_count });
        }
        if completed > TOTAL_TAKEOFFS {
            return Err(CountersError::QuotaExceeded { completed });
        }
        Ok(Self {
            waiting,
            block_count,
            completed,
        })
    }

    #[must_use]
    pub const fn waiting(&self) -> u32 {
        self.waiting
    }

    #[must_use]
    pub const fn block_count(&self) -> u32 {
        self.block_count
    }

    #[must_use]
    pub const fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub const fn quota_reached(&self) -> bool {
        self.completed >= TOTAL_TAKEOFFS
    }

    /// One arrival burst: `BATCH_ARRIVAL_SIZE` planes join the waiting pool.
    pub fn record_arrivals(&mut self) {
        self.waiting += BATCH_ARRIVAL_SIZE;
    }

    /// The atomic check-and-update a worker performs while holding the
    /// coordinating lock.
    ///
    /// Order matters: the quota check comes first so that a worker never
    /// authorizes takeoff twenty-one, even if planes are still waiting.
    pub fn step(&mut self) -> DispatchStep {
        if self.quota_reached() {
            return DispatchStep::QuotaReached;
        }
        if self.waiting == 0 {
            return DispatchStep::NoWork;
        }
        self.waiting -= 1;
        self.completed += 1;
        self.block_count += 1;
        let block_complete = self.block_count == BLOCK_SIZE;
        if block_complete {
            self.block_count = 0;
        }
        DispatchStep::Authorized { block_complete }
    }
}

#[cfg(test)]
mod tests {
    use super::{Counters, CountersError, DispatchStep};
    use crate::{BATCH_ARRIVAL_SIZE, BLOCK_SIZE, TOTAL_TAKEOFFS};

    #[test]
    fn step_without_planes_reports_no_work() {
        let mut counters = Counters::new();
        assert_eq!(counters.step(), DispatchStep::NoWork);
        assert_eq!(counters.completed(), 0);
        assert_eq!(counters.waiting(), 0);
    }

    #[test]
    fn step_consumes_one_plane_per_authorization() {
        let mut counters = Counters::new();
        counters.record_arrivals();
        assert_eq!(counters.waiting(), BATCH_ARRIVAL_SIZE);

        assert_eq!(
            counters.step(),
            DispatchStep::Authorized {
                block_complete: false
            }
        );
        assert_eq!(counters.waiting(), BATCH_ARRIVAL_SIZE - 1);
        assert_eq!(counters.completed(), 1);
        assert_eq!(counters.block_count(), 1);
    }

    #[test]
    fn block_completes_exactly_on_the_block_size() {
        let mut counters = Counters::new();
        counters.record_arrivals();

        for n in 1..=BLOCK_SIZE {
            let step = counters.step();
            if n == BLOCK_SIZE {
                assert_eq!(
                    step,
                    DispatchStep::Authorized {
                        block_complete: true
                    }
                );
            } else {
                assert_eq!(
                    step,
                    DispatchStep::Authorized {
                        block_complete: false
                    }
                );
            }
        }
        // The block counter rolls over, never sits at BLOCK_SIZE.
        assert_eq!(counters.block_count(), 0);
    }

    #[test]
    fn quota_caps_completed_even_with_planes_waiting() {
        let mut counters = Counters::new();
        for _ in 0..8 {
            counters.record_arrivals();
        }

        let mut authorized = 0;
        loop {
            match counters.step() {
                DispatchStep::Authorized { .. } => authorized += 1,
                DispatchStep::QuotaReached => break,
                DispatchStep::NoWork => panic!("planes were waiting"),
            }
        }
        assert_eq!(authorized, TOTAL_TAKEOFFS);
        assert_eq!(counters.completed(), TOTAL_TAKEOFFS);
        assert!(counters.waiting() > 0);
        assert!(counters.quota_reached());
    }

    #[test]
    fn block_boundaries_land_on_multiples_of_the_block_size() {
        let mut counters = Counters::new();
        for _ in 0..4 {
            counters.record_arrivals();
        }

        let mut boundaries = Vec::new();
        while let DispatchStep::Authorized { block_complete } = counters.step() {
            if block_complete {
                boundaries.push(counters.completed());
            }
        }
        assert_eq!(boundaries, vec![5, 10, 15, 20]);
    }

    #[test]
    fn with_counts_rejects_invalid_states() {
        assert!(matches!(
            Counters::with_counts(0, BLOCK_SIZE, 0),
            Err(CountersError::BlockOutOfRange { .. })
        ));
        assert!(matches!(
            Counters::with_counts(0, 0, TOTAL_TAKEOFFS + 1),
            Err(CountersError::QuotaExceeded { .. })
        ));
        let counters = Counters::with_counts(3, 4, 19).expect("valid state");
        assert_eq!(counters.waiting(), 3);
    }
}
