//! `air-control` - the tower binary.
//!
//! Creates the shared region, launches the sibling `radio` binary, and runs
//! the dispatch pool to quota. Inject arrival bursts from anywhere with
//! `kill -USR2 <tower-pid>`.

use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use aircontrol_core::{Tower, TowerConfig};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(env_filter)
        .init();
}

/// The radio ships next to this binary; an explicit path as the first
/// argument overrides that.
fn locate_radio() -> Result<PathBuf> {
    if let Some(path) = env::args_os().nth(1) {
        return Ok(PathBuf::from(path));
    }
    let exe = env::current_exe().context("resolve current executable")?;
    let dir = exe
        .parent()
        .context("current executable has no parent directory")?;
    Ok(dir.join("radio"))
}

/// Debug overrides, mainly for the end-to-end suite. The defaults are the
/// fixed simulation constants.
fn apply_env_overrides(config: &mut TowerConfig) {
    if let Some(ms) = env::var("AIR_CONTROL_TAKEOFF_MS")
        .ok()
        .and_then(|value| value.parse().ok())
    {
        config.takeoff_duration = Duration::from_millis(ms);
    }
    if let Ok(name) = env::var("AIR_CONTROL_REGION") {
        config.region_name = name;
    }
}

fn main() -> Result<()> {
    init_tracing();

    let radio_path = locate_radio()?;
    tracing::info!(radio = %radio_path.display(), tower_pid = std::process::id(), "tower starting");

    let mut config = TowerConfig::new(radio_path);
    apply_env_overrides(&mut config);
    Tower::run(&config).context("tower setup failed")?;

    tracing::info!("tower shut down cleanly");
    Ok(())
}
