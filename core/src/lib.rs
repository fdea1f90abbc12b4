//! Runway arbitration and takeoff dispatch engine.
//!
//! # Architecture
//!
//! ```text
//! Tower::run()
//!   ├── SharedRegion      named cross-process byte region (pids)
//!   ├── radio (child)     notified via SIGUSR1 / SIGTERM
//!   ├── ArrivalListener   SIGUSR2 -> waiting += 5, under the state lock
//!   └── workers × 5       try-acquire a runway, dispatch under the lock,
//!                          simulate the takeoff, notify at block boundaries
//! ```
//!
//! All coordinated counters (`waiting`, `block_count`, `completed`) are
//! mutated only under the single lock in [`DispatchState`]; the shared region
//! needs no lock because every slot has a single writer during its active
//! phase. Outbound notifications go through the [`RadioLink`] seam so the
//! dispatch protocol can be exercised without a live collaborator.

mod arrivals;
mod errors;
mod link;
mod pool;
mod region;
mod state;
mod tower;
mod worker;

pub use arrivals::ArrivalListener;
pub use errors::SetupError;
pub use link::{RadioLink, SignalLink};
pub use pool::{RunwayGuard, RunwayId, RunwayPool};
pub use region::SharedRegion;
pub use state::DispatchState;
pub use tower::{Tower, TowerConfig};
pub use worker::{DispatchContext, run_worker};
