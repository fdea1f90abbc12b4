//! `radio` - the collaborator process.
//!
//! A reference implementation of the radio interface: opens the shared
//! region named by its first argument (retrying while the tower is still
//! setting up), acknowledges SIGUSR1 per completed block, and exits cleanly
//! on SIGTERM. Repeated SIGTERMs from multiple exiting workers are fine;
//! the first one wins.

use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use aircontrol_core::SharedRegion;
use aircontrol_types::{BLOCK_SIZE, REGION_NAME, Slot};

const OPEN_RETRIES: u32 = 10;
const OPEN_RETRY_WAIT: Duration = Duration::from_millis(100);

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// The tower may still be truncating and mapping the region when we start;
/// retry briefly before giving up.
fn open_with_retry(name: &str) -> Result<SharedRegion> {
    let mut attempt = 0;
    loop {
        match SharedRegion::open(name) {
            Ok(region) => return Ok(region),
            Err(err) if attempt + 1 < OPEN_RETRIES => {
                tracing::debug!(attempt, error = %err, "region not ready yet");
                attempt += 1;
                thread::sleep(OPEN_RETRY_WAIT);
            }
            Err(err) => return Err(err).context("shared region never became available"),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let name = env::args()
        .nth(1)
        .unwrap_or_else(|| REGION_NAME.to_string());
    let region = open_with_retry(&name)?;
    let tower_pid = region.read_slot(Slot::Tower);
    tracing::info!(tower_pid, region = %name, "radio online");

    let mut signals =
        Signals::new([SIGUSR1, SIGUSR2, SIGTERM]).context("register signal handlers")?;

    let mut acknowledged = 0u32;
    for signal in signals.forever() {
        match signal {
            SIGUSR1 => {
                acknowledged += BLOCK_SIZE;
                tracing::info!(takeoffs = acknowledged, "block complete");
            }
            SIGUSR2 => {
                // Traffic pings pass through here; nothing for the radio to
                // do with them.
                tracing::debug!("traffic ping");
            }
            SIGTERM => {
                tracing::info!("finalization of operations");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
