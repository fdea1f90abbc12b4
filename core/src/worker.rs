//! The dispatch worker loop.
//!
//! ```text
//! SEEK_RESOURCE -> HOLDING_RESOURCE -> {AUTHORIZED, UNAUTHORIZED} -> RELEASED -> loop | EXIT
//! ```
//!
//! A worker holds at most one runway at a time, never across iterations,
//! and never holds the coordinating lock while simulating a takeoff. On
//! exit it best-effort sends the terminal notification; several workers
//! doing so redundantly is intentional.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use aircontrol_types::{DispatchStep, RETRY_BACKOFF, TAKEOFF_DURATION};

use crate::link::RadioLink;
use crate::pool::RunwayPool;
use crate::state::DispatchState;

/// Everything a worker needs, constructed once by the tower and shared.
///
/// Explicit context rather than ambient globals keeps ownership and
/// teardown order visible: the region outlives the link, the link outlives
/// the workers.
pub struct DispatchContext {
    pub state: Arc<DispatchState>,
    pub runways: RunwayPool,
    pub link: Box<dyn RadioLink>,
    /// Simulated takeoff time; one time unit in production, shortened by
    /// tests.
    pub takeoff_duration: Duration,
    /// Back-off when no runway is free or no plane is waiting.
    pub retry_backoff: Duration,
}

impl DispatchContext {
    /// Production timing around the given notification link.
    #[must_use]
    pub fn new(state: Arc<DispatchState>, link: Box<dyn RadioLink>) -> Self {
        Self {
            state,
            runways: RunwayPool::new(),
            link,
            takeoff_duration: TAKEOFF_DURATION,
            retry_backoff: RETRY_BACKOFF,
        }
    }
}

/// Run one worker to completion. `worker` is an index for diagnostics only.
pub fn run_worker(worker: usize, ctx: &DispatchContext) {
    debug!(worker, "dispatch worker started");
    loop {
        // Fast path: don't contend for a runway once the quota is reached.
        if ctx.state.quota_reached() {
            break;
        }

        let Some(runway) = ctx.runways.try_acquire_any() else {
            thread::sleep(ctx.retry_backoff);
            continue;
        };

        match ctx.state.dispatch() {
            DispatchStep::Authorized { block_complete } => {
                if block_complete {
                    // The boundary decision was made under the lock; the
                    // send happens outside it.
                    ctx.link.block_complete();
                }
                trace!(worker, runway = ?runway.id(), "takeoff authorized");
                // Runway held for the takeoff, coordinating lock not.
                thread::sleep(ctx.takeoff_duration);
            }
            DispatchStep::NoWork => {
                drop(runway);
                thread::sleep(ctx.retry_backoff);
            }
            DispatchStep::QuotaReached => {
                drop(runway);
                break;
            }
        }
    }

    // Terminal notification from every exiting worker; the radio tolerates
    // duplicates.
    ctx.link.shutdown();
    debug!(worker, "dispatch worker exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use aircontrol_types::{TOTAL_TAKEOFFS, BATCH_ARRIVAL_SIZE};

    use super::{DispatchContext, run_worker};
    use crate::link::RadioLink;
    use crate::state::DispatchState;

    #[derive(Default)]
    struct RecordingLink {
        blocks: Mutex<u32>,
        shutdowns: Mutex<u32>,
    }

    impl RadioLink for Arc<RecordingLink> {
        fn block_complete(&self) {
            *self.blocks.lock().expect("blocks lock") += 1;
        }

        fn shutdown(&self) {
            *self.shutdowns.lock().expect("shutdowns lock") += 1;
        }
    }

    fn fast_context(link: Arc<RecordingLink>) -> DispatchContext {
        let mut ctx = DispatchContext::new(Arc::new(DispatchState::new()), Box::new(link));
        ctx.takeoff_duration = Duration::from_micros(50);
        ctx.retry_backoff = Duration::from_micros(50);
        ctx
    }

    #[test]
    fn single_worker_drains_the_quota_and_notifies_per_block() {
        let link = Arc::new(RecordingLink::default());
        let ctx = fast_context(Arc::clone(&link));
        for _ in 0..(TOTAL_TAKEOFFS / BATCH_ARRIVAL_SIZE) {
            ctx.state.record_arrivals();
        }

        run_worker(0, &ctx);

        let counters = ctx.state.snapshot();
        assert_eq!(counters.completed(), TOTAL_TAKEOFFS);
        assert_eq!(counters.waiting(), 0);
        assert_eq!(*link.blocks.lock().expect("blocks lock"), 4);
        assert_eq!(*link.shutdowns.lock().expect("shutdowns lock"), 1);
    }

    #[test]
    fn worker_exits_immediately_when_the_quota_is_already_reached() {
        let link = Arc::new(RecordingLink::default());
        let ctx = fast_context(Arc::clone(&link));
        for _ in 0..(TOTAL_TAKEOFFS / BATCH_ARRIVAL_SIZE) {
            ctx.state.record_arrivals();
        }
        run_worker(0, &ctx);

        // A second worker arriving late must observe the quota and only
        // send the (redundant) terminal notification.
        run_worker(1, &ctx);
        assert_eq!(*link.blocks.lock().expect("blocks lock"), 4);
        assert_eq!(*link.shutdowns.lock().expect("shutdowns lock"), 2);
    }
}
