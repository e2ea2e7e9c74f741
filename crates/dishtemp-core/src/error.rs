//! Error types for dishtemp-core.
//!
//! The reading state machine itself models exactly one failure: the probe
//! reporting [`ProbeStatus::Error`](dishtemp_types::ProbeStatus::Error), which
//! becomes the `Error` button state and waits for the user to retry. The
//! errors in this module cover the calls made *around* the state machine.
//!
//! # Recovery
//!
//! | Error Type | Strategy |
//! |------------|----------|
//! | [`Error::Probe`] | Surfaced as the `Error` state; user retries |
//! | [`Error::SaveFailed`] | Task stays in `Save`; pressing again retries the save |
//! | [`Error::UnknownTask`] / [`Error::DuplicateTask`] | Caller bug; do not retry |
//! | [`Error::InvalidConfig`] | Fix configuration and restart |
//! | [`Error::ChannelClosed`] | The event loop or probe went away; rebuild the checklist |
//!
//! Nothing in this crate retries automatically.

use thiserror::Error;

use dishtemp_types::TaskId;

/// Errors that can occur while coordinating probe readings.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A call into the probe hook failed.
    #[error("Probe {operation} failed: {reason}")]
    Probe {
        /// The probe operation that failed.
        operation: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// The response sink rejected a save.
    #[error("Saving reading for task {task_id} failed: {reason}")]
    SaveFailed {
        /// The task whose reading could not be saved.
        task_id: TaskId,
        /// Description of the failure.
        reason: String,
    },

    /// No reader is registered for the task.
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    /// A reader is already registered for the task.
    #[error("Task already registered: {0}")]
    DuplicateTask(TaskId),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse a temperature, unit or status.
    #[error(transparent)]
    Parse(#[from] dishtemp_types::ParseError),

    /// An event or command channel was closed.
    #[error("Channel closed")]
    ChannelClosed,
}

impl Error {
    /// Create a probe failure for an operation.
    pub fn probe(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Probe {
            operation,
            reason: reason.into(),
        }
    }

    /// Create a save failure for a task.
    pub fn save_failed(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self::SaveFailed {
            task_id,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using dishtemp-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
