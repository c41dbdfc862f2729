//! Crate-level error types.
//!
//! Only construction and task-joining can fail. Collaborator errors at run
//! time (sensor reads, knob bus reads, LED writes) are absorbed inside the
//! tasks and logged; they never surface here.

use thiserror::Error;

pub use crate::config::ConfigError;

/// Errors that prevent the control system from starting or stopping cleanly.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A driver was handed the wrong number of pins.
    #[error("Incorrect number of pins: found {found}, expected {expected}")]
    PinCount {
        /// Pins supplied.
        found: usize,
        /// Pins the driver needs.
        expected: usize,
    },

    /// A pin or bus driver reported an error during setup.
    #[error("Driver error: {0}")]
    Driver(String),

    /// A component task panicked or was aborted.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
