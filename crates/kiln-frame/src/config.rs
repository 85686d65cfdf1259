//! Frame pipeline configuration, validation, and error types.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── FrameConfig ────────────────────────────────────────────────────

/// Configuration for a [`FramePipeline`](crate::FramePipeline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    /// Number of frame slots the host may run ahead of the device.
    ///
    /// Default: 2. Must be in `1..=MAX_FRAMES_IN_FLIGHT`.
    pub frames_in_flight: u32,

    /// Chunk size of each slot's host scratch arena, in bytes. Default: 1 MiB.
    pub host_chunk_size: u32,

    /// Chunks reserved per slot host arena at startup. Default: 1.
    pub host_initial_chunks: u32,

    /// Chunk size of each slot's scratch buffer heap, in bytes.
    /// Default: 1 MiB.
    pub scratch_buffer_chunk_size: u32,

    /// Scratch buffer chunks reserved per slot at startup. Default: 1.
    pub scratch_buffer_initial_chunks: u32,

    /// Chunk size of each slot's scratch descriptor heap, in slots.
    /// Default: 512.
    pub scratch_descriptor_chunk_size: u32,

    /// Scratch descriptor chunks reserved per slot at startup. Default: 1.
    pub scratch_descriptor_initial_chunks: u32,

    /// Chunk size of the pass-local stack allocator, in bytes.
    /// Default: 1 MiB.
    pub stack_chunk_size: u32,

    /// Longest a frame begin may block on the device. Default: 5 s.
    pub wait_timeout: Duration,

    /// Waits longer than this are logged as warnings. Default: 16 ms.
    pub slow_wait_threshold: Duration,

    /// Number of frame intervals averaged by the frame timer. Default: 60.
    pub timing_window: usize,

    /// Shortest host time from `begin` to `end`. Frames that finish sooner
    /// are held in `end` until it has passed. Default: zero, no pacing.
    pub min_frame_time: Duration,
}

impl FrameConfig {
    /// Default number of frames in flight.
    pub const DEFAULT_FRAMES_IN_FLIGHT: u32 = 2;

    /// Upper bound on frames in flight.
    pub const MAX_FRAMES_IN_FLIGHT: u32 = 16;

    /// Default host and scratch buffer chunk size: 1 MiB.
    pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

    /// Default scratch descriptor chunk size.
    pub const DEFAULT_DESCRIPTOR_CHUNK_SIZE: u32 = 512;

    /// Default bound on a frame-begin wait.
    pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default slow-wait warning threshold.
    pub const DEFAULT_SLOW_WAIT_THRESHOLD: Duration = Duration::from_millis(16);

    /// Default frame timer window.
    pub const DEFAULT_TIMING_WINDOW: usize = 60;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 || self.frames_in_flight > Self::MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::FramesInFlightOutOfRange {
                configured: self.frames_in_flight,
            });
        }
        let chunks = [
            ("host_chunk_size", self.host_chunk_size),
            ("scratch_buffer_chunk_size", self.scratch_buffer_chunk_size),
            ("scratch_descriptor_chunk_size", self.scratch_descriptor_chunk_size),
            ("stack_chunk_size", self.stack_chunk_size),
        ];
        for (field, value) in chunks {
            if value == 0 {
                return Err(ConfigError::ZeroChunkSize { field });
            }
        }
        if self.wait_timeout.is_zero() {
            return Err(ConfigError::ZeroWaitTimeout);
        }
        if self.timing_window == 0 {
            return Err(ConfigError::ZeroTimingWindow);
        }
        if self.min_frame_time > self.wait_timeout {
            return Err(ConfigError::MinFrameTimeExceedsTimeout {
                min_frame_time: self.min_frame_time,
                wait_timeout: self.wait_timeout,
            });
        }
        Ok(())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: Self::DEFAULT_FRAMES_IN_FLIGHT,
            host_chunk_size: Self::DEFAULT_CHUNK_SIZE,
            host_initial_chunks: 1,
            scratch_buffer_chunk_size: Self::DEFAULT_CHUNK_SIZE,
            scratch_buffer_initial_chunks: 1,
            scratch_descriptor_chunk_size: Self::DEFAULT_DESCRIPTOR_CHUNK_SIZE,
            scratch_descriptor_initial_chunks: 1,
            stack_chunk_size: Self::DEFAULT_CHUNK_SIZE,
            wait_timeout: Self::DEFAULT_WAIT_TIMEOUT,
            slow_wait_threshold: Self::DEFAULT_SLOW_WAIT_THRESHOLD,
            timing_window: Self::DEFAULT_TIMING_WINDOW,
            min_frame_time: Duration::ZERO,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`FrameConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `frames_in_flight` is zero or above the maximum.
    FramesInFlightOutOfRange {
        /// The configured value.
        configured: u32,
    },
    /// A chunk size is zero.
    ZeroChunkSize {
        /// Name of the offending field.
        field: &'static str,
    },
    /// `wait_timeout` is zero.
    ZeroWaitTimeout,
    /// `timing_window` is zero.
    ZeroTimingWindow,
    /// `min_frame_time` is longer than `wait_timeout`.
    MinFrameTimeExceedsTimeout {
        /// The configured pacing floor.
        min_frame_time: Duration,
        /// The configured wait bound.
        wait_timeout: Duration,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FramesInFlightOutOfRange { configured } => write!(
                f,
                "frames_in_flight must be in 1..={}, got {configured}",
                FrameConfig::MAX_FRAMES_IN_FLIGHT
            ),
            Self::ZeroChunkSize { field } => write!(f, "{field} must be non-zero"),
            Self::ZeroWaitTimeout => write!(f, "wait_timeout must be non-zero"),
            Self::ZeroTimingWindow => write!(f, "timing_window must be at least 1"),
            Self::MinFrameTimeExceedsTimeout {
                min_frame_time,
                wait_timeout,
            } => write!(
                f,
                "min_frame_time {min_frame_time:?} exceeds wait_timeout {wait_timeout:?}"
            ),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = FrameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.scratch_descriptor_chunk_size, 512);
    }

    #[test]
    fn frames_in_flight_bounds() {
        for bad in [0, FrameConfig::MAX_FRAMES_IN_FLIGHT + 1] {
            let config = FrameConfig {
                frames_in_flight: bad,
                ..FrameConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::FramesInFlightOutOfRange { configured: bad })
            );
        }
    }

    #[test]
    fn zero_fields_rejected() {
        let config = FrameConfig {
            scratch_buffer_chunk_size: 0,
            ..FrameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroChunkSize {
                field: "scratch_buffer_chunk_size"
            })
        );
        let config = FrameConfig {
            wait_timeout: Duration::ZERO,
            ..FrameConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWaitTimeout));
    }

    #[test]
    fn pacing_floor_must_fit_within_wait_timeout() {
        let config = FrameConfig {
            min_frame_time: Duration::from_secs(10),
            ..FrameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MinFrameTimeExceedsTimeout {
                min_frame_time: Duration::from_secs(10),
                wait_timeout: FrameConfig::DEFAULT_WAIT_TIMEOUT,
            })
        );
        let config = FrameConfig {
            min_frame_time: Duration::from_millis(16),
            ..FrameConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
