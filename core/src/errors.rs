//! The fatal error taxonomy.
//!
//! Only setup failures surface to the caller. Notification failures are
//! discarded at the [`crate::RadioLink`] boundary and cleanup failures are
//! logged and swallowed, so neither appears here.

use std::io;

use thiserror::Error;

/// Failures during tower startup. All of these abort the run before any
/// worker starts; nothing here is retried.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("shared region {name} already exists; refusing to reuse a stale mapping")]
    RegionExists { name: String },

    #[error("shared region {name} could not be created: {source}")]
    RegionCreate { name: String, source: io::Error },

    #[error("shared region {name} could not be opened: {source}")]
    RegionOpen { name: String, source: io::Error },

    #[error("shared region {name} is {actual} bytes, expected {expected}")]
    RegionSize {
        name: String,
        actual: u64,
        expected: u64,
    },

    #[error("shared region name {name:?} contains an interior NUL byte")]
    RegionName { name: String },

    #[error("radio process could not be spawned: {source}")]
    RadioSpawn { source: io::Error },

    #[error("arrival listener could not be registered: {source}")]
    ArrivalListener { source: io::Error },

    #[error("dispatch worker thread could not be spawned: {source}")]
    WorkerSpawn { source: io::Error },
}
