//! Host arena configuration parameters.

use crate::error::ArenaError;
use crate::host::MAX_HOST_ALIGNMENT;

/// Configuration for a host-side bump arena ([`LinearAllocator`] or
/// [`StackAllocator`]).
///
/// [`LinearAllocator`]: crate::LinearAllocator
/// [`StackAllocator`]: crate::StackAllocator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Size of each chunk in bytes.
    ///
    /// Default: 1 MiB. Also the largest single allocation the arena can
    /// serve, including alignment padding.
    pub chunk_size: u32,

    /// Number of chunks reserved at construction.
    ///
    /// Default: 10. Further chunks are added on demand and kept until the
    /// arena is dropped.
    pub initial_chunk_count: u32,
}

impl ArenaConfig {
    /// Default chunk size: 1 MiB.
    pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

    /// Default number of preallocated chunks.
    pub const DEFAULT_INITIAL_CHUNK_COUNT: u32 = 10;

    /// Config with the given chunk size and the default chunk count.
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            initial_chunk_count: Self::DEFAULT_INITIAL_CHUNK_COUNT,
        }
    }

    /// Check the parameters.
    ///
    /// The chunk size must be non-zero and at least [`MAX_HOST_ALIGNMENT`]
    /// so that a maximally aligned allocation of one byte fits.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.chunk_size < MAX_HOST_ALIGNMENT {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "chunk_size must be at least {MAX_HOST_ALIGNMENT}, got {}",
                    self.chunk_size
                ),
            });
        }
        Ok(())
    }

    /// Bytes reserved up front.
    pub fn initial_bytes(&self) -> u64 {
        self.chunk_size as u64 * self.initial_chunk_count as u64
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reserves_ten_megabytes() {
        let config = ArenaConfig::default();
        assert_eq!(config.initial_bytes(), 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tiny_chunk_rejected() {
        let config = ArenaConfig::new(8);
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }
}
