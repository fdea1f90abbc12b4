//! The asynchronous arrival channel.
//!
//! SIGUSR2 means "5 new planes arrived" and may land at any time, including
//! mid-critical-section in a worker. Delivery is moved off the signal
//! handler onto a dedicated thread via the `signal-hook` iterator, which
//! serializes bursts with each other; each burst then takes the same
//! coordinating lock the workers use. No lock-free shortcut.

use std::sync::Arc;
use std::thread;

use signal_hook::consts::SIGUSR2;
use signal_hook::iterator::{Handle, Signals};
use tracing::debug;

use crate::errors::SetupError;
use crate::state::DispatchState;

/// Owns the signal-draining thread. Close (or drop) stops listening and
/// joins the thread; bursts delivered before close are never lost.
pub struct ArrivalListener {
    handle: Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl ArrivalListener {
    /// Register for SIGUSR2 and start draining bursts into `state`.
    pub fn spawn(state: Arc<DispatchState>) -> Result<Self, SetupError> {
        let mut signals =
            Signals::new([SIGUSR2]).map_err(|source| SetupError::ArrivalListener { source })?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("arrivals".to_string())
            .spawn(move || {
                for _signal in signals.forever() {
                    state.record_arrivals();
                    debug!("arrival burst recorded");
                }
            })
            .map_err(|source| SetupError::ArrivalListener { source })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stop listening and join the drain thread. Idempotent.
    pub fn close(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ArrivalListener {
    fn drop(&mut self) {
        self.close();
    }
}
