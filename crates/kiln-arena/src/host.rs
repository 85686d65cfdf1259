//! Host-memory bump allocation.
//!
//! [`LinearAllocator`] is a [`ChunkArena`] whose chunks are zero-initialised
//! host byte blocks. It serves per-frame CPU scratch data: command
//! parameters, staging copies, temporary arrays of POD values. Storage is a
//! boxed slice of 16-byte aligned blocks viewed through `bytemuck`, so the
//! crate stays free of `unsafe`.

use bytemuck::{Pod, Zeroable};

use crate::align::{align_up, is_valid_alignment};
use crate::chunk::{ChunkArena, ChunkSource, Marker};
use crate::config::ArenaConfig;
use crate::error::ArenaError;

/// Largest alignment a host arena can honour, in bytes.
pub const MAX_HOST_ALIGNMENT: u32 = 16;

#[repr(C, align(16))]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Block([u8; 16]);

/// One chunk of host memory, aligned to [`MAX_HOST_ALIGNMENT`].
pub struct HostChunk {
    blocks: Box<[Block]>,
}

impl HostChunk {
    /// Zero-initialised chunk of at least `size` bytes.
    pub fn zeroed(size: u32) -> Self {
        let count = (size as usize).div_ceil(MAX_HOST_ALIGNMENT as usize);
        Self {
            blocks: vec![Block::zeroed(); count].into_boxed_slice(),
        }
    }

    /// The chunk's bytes.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    /// The chunk's bytes, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.blocks)
    }
}

/// [`ChunkSource`] backed by the global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostChunkSource;

impl ChunkSource for HostChunkSource {
    type Chunk = HostChunk;

    fn allocate_chunk(&mut self, size: u32) -> Result<HostChunk, ArenaError> {
        Ok(HostChunk::zeroed(size))
    }

    fn release_chunk(&mut self, chunk: HostChunk) -> Result<(), ArenaError> {
        drop(chunk);
        Ok(())
    }
}

/// A byte range inside a [`LinearAllocator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostAllocation {
    /// Chunk holding the range.
    pub chunk_index: u32,
    /// Aligned start of the range within the chunk.
    pub offset: u32,
    /// Requested length in bytes.
    pub size: u32,
}

/// Bump allocator over host memory chunks.
pub struct LinearAllocator {
    arena: ChunkArena<HostChunk>,
    source: HostChunkSource,
}

impl LinearAllocator {
    /// Create an allocator and reserve its initial chunks.
    pub fn new(config: &ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let mut source = HostChunkSource;
        let arena = ChunkArena::new(config.chunk_size, config.initial_chunk_count, &mut source)?;
        Ok(Self { arena, source })
    }

    /// Allocate `size` bytes aligned to `alignment`.
    ///
    /// Reserves `size + alignment - 1` bytes from the arena so the aligned
    /// start always fits. The bytes are not cleared; they hold whatever the
    /// previous user of the chunk left behind.
    pub fn allocate_raw(&mut self, size: u32, alignment: u32) -> Result<HostAllocation, ArenaError> {
        if !is_valid_alignment(alignment) || alignment > MAX_HOST_ALIGNMENT {
            return Err(ArenaError::InvalidAlignment { alignment });
        }
        let padded = size
            .checked_add(alignment - 1)
            .ok_or(ArenaError::AllocationTooLarge {
                requested: size,
                chunk_size: self.arena.chunk_size(),
            })?;
        let raw = self.arena.allocate(padded, &mut self.source)?;
        Ok(HostAllocation {
            chunk_index: raw.chunk_index,
            offset: align_up(raw.offset, alignment),
            size,
        })
    }

    /// Allocate a zeroed slice of `count` values of `T`.
    pub fn allocate_slice<T: Pod>(&mut self, count: usize) -> Result<&mut [T], ArenaError> {
        let allocation = self.allocate_for::<T>(count)?;
        let bytes = self.bytes_mut(&allocation);
        bytes.fill(0);
        Ok(bytemuck::cast_slice_mut(bytes))
    }

    /// Copy `data` into freshly allocated memory and return its location.
    pub fn write_temporary<T: Pod>(&mut self, data: &[T]) -> Result<HostAllocation, ArenaError> {
        let allocation = self.allocate_for::<T>(data.len())?;
        self.bytes_mut(&allocation)
            .copy_from_slice(bytemuck::cast_slice(data));
        Ok(allocation)
    }

    fn allocate_for<T: Pod>(&mut self, count: usize) -> Result<HostAllocation, ArenaError> {
        let alignment = std::mem::align_of::<T>() as u32;
        let size = std::mem::size_of::<T>()
            .checked_mul(count)
            .and_then(|bytes| u32::try_from(bytes).ok())
            .ok_or(ArenaError::AllocationTooLarge {
                requested: u32::MAX,
                chunk_size: self.arena.chunk_size(),
            })?;
        self.allocate_raw(size, alignment)
    }

    /// Bytes of a live allocation.
    ///
    /// # Panics
    ///
    /// Panics if the allocation did not come from this allocator.
    pub fn bytes(&self, allocation: &HostAllocation) -> &[u8] {
        let start = allocation.offset as usize;
        let end = start + allocation.size as usize;
        &self.arena.chunks()[allocation.chunk_index as usize].bytes()[start..end]
    }

    /// Bytes of a live allocation, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the allocation did not come from this allocator.
    pub fn bytes_mut(&mut self, allocation: &HostAllocation) -> &mut [u8] {
        let start = allocation.offset as usize;
        let end = start + allocation.size as usize;
        &mut self.arena.chunks_mut()[allocation.chunk_index as usize].bytes_mut()[start..end]
    }

    /// View a live allocation as a slice of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the allocation did not come from this allocator or its
    /// length is not a multiple of `size_of::<T>()`.
    pub fn typed<T: Pod>(&self, allocation: &HostAllocation) -> &[T] {
        bytemuck::cast_slice(self.bytes(allocation))
    }

    /// The current bump position.
    pub fn marker(&self) -> Marker {
        self.arena.marker()
    }

    /// Rewind to `marker`.
    pub fn reset_to(&mut self, marker: Marker) -> Result<(), ArenaError> {
        self.arena.reset_to(marker)
    }

    /// Rewind to the start. Chunks are kept for reuse.
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> u64 {
        self.arena.used_units()
    }

    /// Bytes reserved across all chunks.
    pub fn reserved_bytes(&self) -> u64 {
        self.arena.reserved_units()
    }

    /// Peak bytes in use since creation.
    pub fn high_water_bytes(&self) -> u64 {
        self.arena.high_water_units()
    }

    /// Number of chunks owned.
    pub fn chunk_count(&self) -> usize {
        self.arena.chunk_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> LinearAllocator {
        LinearAllocator::new(&ArenaConfig {
            chunk_size: 256,
            initial_chunk_count: 1,
        })
        .unwrap()
    }

    #[test]
    fn raw_allocations_are_aligned() {
        let mut arena = small();
        arena.allocate_raw(3, 1).unwrap();
        let a = arena.allocate_raw(8, 16).unwrap();
        assert_eq!(a.offset % 16, 0);
        assert!(a.offset >= 3);
        assert_eq!(a.size, 8);
    }

    #[test]
    fn alignment_above_maximum_rejected() {
        let mut arena = small();
        assert_eq!(
            arena.allocate_raw(4, 32),
            Err(ArenaError::InvalidAlignment { alignment: 32 })
        );
        assert_eq!(
            arena.allocate_raw(4, 3),
            Err(ArenaError::InvalidAlignment { alignment: 3 })
        );
    }

    #[test]
    fn slice_is_zeroed_after_reuse() {
        let mut arena = small();
        let first = arena.allocate_slice::<u32>(8).unwrap();
        first.fill(0xdead_beef);
        arena.reset();
        let second = arena.allocate_slice::<u32>(8).unwrap();
        assert!(second.iter().all(|&v| v == 0));
    }

    #[test]
    fn write_temporary_copies_data() {
        let mut arena = small();
        let values = [1.0f32, 2.0, 3.0, 4.0];
        let a = arena.write_temporary(&values).unwrap();
        assert_eq!(a.offset % 4, 0);
        assert_eq!(arena.typed::<f32>(&a), &values);
    }

    #[test]
    fn grows_past_initial_chunks() {
        let mut arena = small();
        for _ in 0..5 {
            arena.allocate_raw(200, 1).unwrap();
        }
        assert_eq!(arena.chunk_count(), 5);
        assert_eq!(arena.reserved_bytes(), 5 * 256);
        arena.reset();
        assert_eq!(arena.used_bytes(), 0);
        assert_eq!(arena.high_water_bytes(), 4 * 256 + 200);
    }

    #[test]
    fn oversize_request_rejected() {
        let mut arena = small();
        assert!(matches!(
            arena.allocate_raw(256, 4),
            Err(ArenaError::AllocationTooLarge { requested: 259, .. })
        ));
    }
}
