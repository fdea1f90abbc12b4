//! Core domain types for air control.
//!
//! This crate contains pure domain types with no IO and no threads.
//! Everything here can be used from any layer of the application.

mod dispatch;

pub use dispatch::{Counters, CountersError, DispatchStep};

use std::time::Duration;

/// Total takeoffs authorized before every worker shuts down.
pub const TOTAL_TAKEOFFS: u32 = 20;

/// Number of concurrent dispatch workers ("strips").
pub const WORKER_COUNT: usize = 5;

/// Planes added to the waiting pool per arrival burst.
pub const BATCH_ARRIVAL_SIZE: u32 = 5;

/// Takeoffs per block; each completed block notifies the radio.
pub const BLOCK_SIZE: u32 = 5;

/// Simulated duration of one takeoff, runway held throughout.
pub const TAKEOFF_DURATION: Duration = Duration::from_secs(1);

/// Back-off when no runway is free or no plane is waiting.
pub const RETRY_BACKOFF: Duration = Duration::from_micros(500);

/// Well-known name of the shared region; the radio opens it by this name.
pub const REGION_NAME: &str = "/air_control_tower";

/// Slot indices into the shared region.
///
/// Each slot has a single writer during its active phase, which is why
/// the region needs no lock of its own (see `aircontrol-core`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The tower's pid, written once at startup.
    Tower,
    /// The radio's pid, written once after launch; `0` until then.
    Radio,
    /// Reserved for a future collaborator; always `0`.
    Reserved,
}

impl Slot {
    /// Number of slots in the region.
    pub const COUNT: usize = 3;

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Tower => 0,
            Self::Radio => 1,
            Self::Reserved => 2,
        }
    }
}
