//! Frame pipeline error types.

use std::error::Error;
use std::fmt;

use kiln_arena::ArenaError;
use kiln_core::{CompletionValue, DeviceError};
use kiln_heap::HeapError;

use crate::config::ConfigError;

/// Errors surfaced by the frame pipeline.
///
/// Device failures are reported, never recovered from: the application
/// decides whether to flush, recreate the device, or exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The configuration was rejected.
    Config(ConfigError),
    /// A heap operation failed.
    Heap(HeapError),
    /// A host arena operation failed.
    Arena(ArenaError),
    /// The device did not reach the target within the configured timeout.
    WaitTimedOut {
        /// Value waited for.
        target: CompletionValue,
        /// Last value the device reported.
        completed: CompletionValue,
    },
    /// The device will not make further progress.
    DeviceLost {
        /// Device-provided description.
        reason: String,
    },
    /// `begin` called while a frame is already being recorded.
    FrameInProgress,
    /// `end` called with no frame being recorded.
    NoFrameInProgress,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Heap(e) => write!(f, "heap: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::WaitTimedOut { target, completed } => write!(
                f,
                "timed out waiting for completion value {target} (device at {completed})"
            ),
            Self::DeviceLost { reason } => write!(f, "device lost: {reason}"),
            Self::FrameInProgress => write!(f, "a frame is already in progress"),
            Self::NoFrameInProgress => write!(f, "no frame in progress"),
        }
    }
}

impl Error for FrameError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Heap(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for FrameError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<HeapError> for FrameError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

impl From<ArenaError> for FrameError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<DeviceError> for FrameError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Lost { reason } => Self::DeviceLost { reason },
            DeviceError::Timeout { target, completed } => Self::WaitTimedOut { target, completed },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_map_to_wait_failures() {
        let e: FrameError = DeviceError::Timeout {
            target: CompletionValue(4),
            completed: CompletionValue(2),
        }
        .into();
        assert_eq!(
            e,
            FrameError::WaitTimedOut {
                target: CompletionValue(4),
                completed: CompletionValue(2)
            }
        );
        let e: FrameError = DeviceError::Lost {
            reason: "reset".into(),
        }
        .into();
        assert_eq!(e.to_string(), "device lost: reset");
    }

    #[test]
    fn heap_errors_chain() {
        let e = FrameError::from(HeapError::PoolExhausted { capacity: 1 });
        assert!(e.source().is_some());
    }
}
