//! Outbound notifications to the radio process.
//!
//! Everything here is fire-and-forget by contract: an unknown collaborator
//! (slot still `0`) or a failed send is logged at debug level and otherwise
//! discarded. A send failure must never abort a worker or touch the
//! dispatch counters.

use std::io;
use std::sync::Arc;

use tracing::debug;

use aircontrol_types::Slot;

use crate::region::SharedRegion;

/// The notification seam between workers and the radio process.
///
/// Production uses [`SignalLink`]; tests substitute a recording
/// implementation to observe the exact notification cadence.
pub trait RadioLink: Send + Sync {
    /// One block of takeoffs completed.
    fn block_complete(&self);

    /// The quota is reached; the radio should shut down. May be sent
    /// redundantly by several exiting workers, the radio tolerates this.
    fn shutdown(&self);
}

/// Resolves the radio's pid from the shared region on every send and
/// delivers the notification as a Unix signal.
pub struct SignalLink {
    region: Arc<SharedRegion>,
}

impl SignalLink {
    #[must_use]
    pub fn new(region: Arc<SharedRegion>) -> Self {
        Self { region }
    }

    fn send(&self, signal: libc::c_int, what: &str) {
        let pid = self.region.read_slot(Slot::Radio);
        if pid == 0 {
            debug!(what, "radio not yet identified; notification suppressed");
            return;
        }
        if unsafe { libc::kill(pid, signal) } == -1 {
            debug!(
                pid,
                what,
                error = %io::Error::last_os_error(),
                "notification to radio dropped"
            );
        }
    }
}

impl RadioLink for SignalLink {
    fn block_complete(&self) {
        self.send(libc::SIGUSR1, "block complete");
    }

    fn shutdown(&self) {
        self.send(libc::SIGTERM, "terminate");
    }
}
