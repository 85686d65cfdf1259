//! Device-level error types.

use std::error::Error;
use std::fmt;

use crate::id::CompletionValue;

/// Errors reported by a [`Device`](crate::Device) implementation.
///
/// Both variants are fatal for the rendering session: the frame pipeline
/// surfaces them unchanged and leaves the recovery decision (flush,
/// recreate the device, or terminate) to the application shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceError {
    /// The device was removed, reset, or hung and will not retire any more
    /// work.
    Lost {
        /// Implementation-provided description of the failure.
        reason: String,
    },
    /// A bounded wait expired before the device reached the target value.
    Timeout {
        /// The completion value that was waited for.
        target: CompletionValue,
        /// The last value the device reported as completed.
        completed: CompletionValue,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lost { reason } => write!(f, "device lost: {reason}"),
            Self::Timeout { target, completed } => {
                write!(
                    f,
                    "timed out waiting for completion value {target} (device at {completed})"
                )
            }
        }
    }
}

impl Error for DeviceError {}
