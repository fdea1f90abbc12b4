//! The lifecycle coordinator.
//!
//! Owns the whole run: region creation, radio launch, worker pool startup
//! and join, then teardown. Setup failures are fatal; everything after the
//! workers start is best-effort, since the run's correctness no longer
//! depends on the radio once the terminal notification has been attempted.

use std::io;
use std::mem;
use std::path::PathBuf;
use std::process::{self, Child, Command};
use std::ptr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use aircontrol_types::{REGION_NAME, Slot, TAKEOFF_DURATION, WORKER_COUNT};

use crate::arrivals::ArrivalListener;
use crate::errors::SetupError;
use crate::link::SignalLink;
use crate::region::SharedRegion;
use crate::state::DispatchState;
use crate::worker::{DispatchContext, run_worker};

/// Pause between spawning the radio and publishing its pid, giving it time
/// to map the region.
const RADIO_STARTUP_WAIT: Duration = Duration::from_millis(100);

/// How long to wait for the radio to exit after the terminal notification
/// before escalating to a kill.
const RADIO_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Tower configuration. The dispatch constants (quota, worker count, batch
/// and block sizes) are compile-time fixed; only deployment details live
/// here.
#[derive(Debug, Clone)]
pub struct TowerConfig {
    /// Path to the radio executable.
    pub radio_path: PathBuf,
    /// Name of the shared region, passed to the radio as its argument.
    pub region_name: String,
    /// Simulated takeoff duration.
    pub takeoff_duration: Duration,
}

impl TowerConfig {
    #[must_use]
    pub fn new(radio_path: PathBuf) -> Self {
        Self {
            radio_path,
            region_name: REGION_NAME.to_string(),
            takeoff_duration: TAKEOFF_DURATION,
        }
    }
}

/// The tower. See [`Tower::run`].
pub struct Tower;

impl Tower {
    /// Run the airfield to quota: create the region, launch the radio,
    /// start the workers, join them, tear everything down.
    pub fn run(config: &TowerConfig) -> Result<(), SetupError> {
        let region = Arc::new(SharedRegion::create(&config.region_name)?);
        region.write_slot(Slot::Tower, process::id() as i32);

        // Arrival bursts may be delivered from the moment our pid is
        // published, so the listener must be up before anything else is.
        let state = Arc::new(DispatchState::new());
        let mut listener = ArrivalListener::spawn(Arc::clone(&state))?;

        let radio = spawn_radio(config)?;
        let radio_pid = radio.id() as i32;
        // Give the radio time to open the region before anyone resolves its
        // identity from slot 1.
        thread::sleep(RADIO_STARTUP_WAIT);
        region.write_slot(Slot::Radio, radio_pid);
        info!(radio_pid, region = %config.region_name, "radio launched");

        let mut ctx = DispatchContext::new(
            Arc::clone(&state),
            Box::new(SignalLink::new(Arc::clone(&region))),
        );
        ctx.takeoff_duration = config.takeoff_duration;
        let ctx = Arc::new(ctx);

        let mut workers = Vec::with_capacity(WORKER_COUNT);
        for worker in 0..WORKER_COUNT {
            let ctx = Arc::clone(&ctx);
            let handle = thread::Builder::new()
                .name(format!("strip-{worker}"))
                .spawn(move || run_worker(worker, &ctx))
                .map_err(|source| SetupError::WorkerSpawn { source })?;
            workers.push(handle);
        }

        for handle in workers {
            if handle.join().is_err() {
                warn!("dispatch worker panicked");
            }
        }
        let counters = state.snapshot();
        info!(
            completed = counters.completed(),
            waiting = counters.waiting(),
            "all workers joined"
        );

        listener.close();
        region.destroy();
        reap_radio(radio);
        Ok(())
    }
}

fn spawn_radio(config: &TowerConfig) -> Result<Child, SetupError> {
    let mut cmd = Command::new(&config.radio_path);
    cmd.arg(&config.region_name);
    unblock_arrival_signal(&mut cmd);
    cmd.spawn()
        .map_err(|source| SetupError::RadioSpawn { source })
}

/// The arrival-injection channel (SIGUSR2) must be open in the child even
/// if our own mask blocks it.
fn unblock_arrival_signal(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    unsafe {
        cmd.pre_exec(|| {
            let mut set: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGUSR2);
            if libc::sigprocmask(libc::SIG_UNBLOCK, &set, ptr::null_mut()) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Bounded wait for the radio, escalating to a kill. Never fatal.
fn reap_radio(mut radio: Child) {
    let deadline = Instant::now() + RADIO_EXIT_TIMEOUT;
    loop {
        match radio.try_wait() {
            Ok(Some(status)) => {
                info!(%status, "radio exited");
                return;
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
            Ok(None) => {
                warn!("radio did not exit in time; killing it");
                let _ = radio.kill();
                let _ = radio.wait();
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to reap radio");
                return;
            }
        }
    }
}
