//! Per-frame scratch heaps.
//!
//! A scratch heap is a bump arena whose chunks are persistent allocations
//! of a parent heap. Resetting rewinds the bump position and keeps the
//! chunks; the chunk ranges go back to the parent's free list only when the
//! scratch heap is released. Every scratch heap remembers its parent and
//! refuses to work with any other.

use kiln_arena::align::{align_up, is_valid_alignment};
use kiln_arena::{ArenaError, ChunkArena, FreeListAlgorithm, SubAllocation};
use kiln_core::{DescriptorId, HeapId};

use crate::buffer::BufferHeap;
use crate::descriptor::{DescriptorHeap, DescriptorHeapKind, DescriptorRange};
use crate::error::HeapError;

/// A transient byte range of a buffer heap, valid until its scratch heap is
/// reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScratchAllocation {
    /// Aligned byte offset into the parent buffer.
    pub offset: u32,
    /// Requested size in bytes.
    pub size: u32,
}

impl ScratchAllocation {
    /// Offset of element `index` of a `T` array starting at this allocation.
    pub fn element_offset<T>(&self, index: u32) -> u32 {
        let offset = index * std::mem::size_of::<T>() as u32;
        debug_assert!(self.size == 0 || offset < self.size);
        self.offset + offset
    }
}

/// Bump allocation of transient buffer memory.
pub struct ScratchBufferHeap {
    arena: ChunkArena<SubAllocation>,
    parent: HeapId,
}

impl ScratchBufferHeap {
    /// Default chunk size in bytes.
    pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

    /// Create a scratch heap and reserve `initial_chunk_count` chunks of
    /// `chunk_size` bytes from `parent`.
    pub fn new<A: FreeListAlgorithm>(
        parent: &mut BufferHeap<A>,
        chunk_size: u32,
        initial_chunk_count: u32,
    ) -> Result<Self, HeapError> {
        Ok(Self {
            arena: ChunkArena::new(chunk_size, initial_chunk_count, parent)?,
            parent: parent.id(),
        })
    }

    /// Allocate `size` bytes aligned to `alignment`.
    ///
    /// Reserves `size + alignment` bytes of the current chunk and aligns
    /// the absolute buffer offset (chunk base + local offset).
    pub fn allocate<A: FreeListAlgorithm>(
        &mut self,
        parent: &mut BufferHeap<A>,
        size: u32,
        alignment: u32,
    ) -> Result<ScratchAllocation, HeapError> {
        self.check_parent(parent.id())?;
        if !is_valid_alignment(alignment) {
            return Err(ArenaError::InvalidAlignment { alignment }.into());
        }
        let padded = size.checked_add(alignment).ok_or(ArenaError::AllocationTooLarge {
            requested: size,
            chunk_size: self.arena.chunk_size(),
        })?;
        let local = self.arena.allocate(padded, parent)?;
        let base = self.arena.chunks()[local.chunk_index as usize].offset();
        Ok(ScratchAllocation {
            offset: align_up(base + local.offset, alignment),
            size,
        })
    }

    /// Rewind to empty, keeping every chunk.
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Return every chunk to `parent`.
    pub fn release<A: FreeListAlgorithm>(self, parent: &mut BufferHeap<A>) -> Result<(), HeapError> {
        self.check_parent(parent.id())?;
        Ok(self.arena.release_all(parent)?)
    }

    fn check_parent(&self, found: HeapId) -> Result<(), HeapError> {
        if found != self.parent {
            return Err(HeapError::WrongHeap {
                expected: self.parent,
                found,
            });
        }
        Ok(())
    }

    /// Parent heap id.
    pub fn parent(&self) -> HeapId {
        self.parent
    }

    /// Bytes used since the last reset, skipped chunk tails included.
    pub fn used_bytes(&self) -> u64 {
        self.arena.used_units()
    }

    /// Bytes held in chunks.
    pub fn reserved_bytes(&self) -> u64 {
        self.arena.reserved_units()
    }

    /// Peak usage since creation.
    pub fn high_water_bytes(&self) -> u64 {
        self.arena.high_water_units()
    }

    /// Number of chunks held.
    pub fn chunk_count(&self) -> usize {
        self.arena.chunk_count()
    }
}

/// Bump allocation of transient descriptor slots.
pub struct ScratchDescriptorHeap {
    arena: ChunkArena<SubAllocation>,
    parent: HeapId,
    kind: DescriptorHeapKind,
}

impl ScratchDescriptorHeap {
    /// Default chunk size in descriptor slots.
    pub const DEFAULT_CHUNK_SIZE: u32 = 512;

    /// Default number of chunks reserved up front.
    pub const DEFAULT_INITIAL_CHUNK_COUNT: u32 = 1;

    /// Create a scratch heap and reserve `initial_chunk_count` chunks of
    /// `chunk_size` slots from `parent`.
    pub fn new<A: FreeListAlgorithm>(
        parent: &mut DescriptorHeap<A>,
        chunk_size: u32,
        initial_chunk_count: u32,
    ) -> Result<Self, HeapError> {
        Ok(Self {
            arena: ChunkArena::new(chunk_size, initial_chunk_count, parent)?,
            parent: parent.id(),
            kind: parent.kind(),
        })
    }

    /// Allocate `count` contiguous slots.
    pub fn allocate<A: FreeListAlgorithm>(
        &mut self,
        parent: &mut DescriptorHeap<A>,
        count: u32,
    ) -> Result<DescriptorRange, HeapError> {
        if parent.id() != self.parent {
            return Err(HeapError::WrongHeap {
                expected: self.parent,
                found: parent.id(),
            });
        }
        let local = self.arena.allocate(count, parent)?;
        let base = self.arena.chunks()[local.chunk_index as usize].offset();
        Ok(DescriptorRange {
            kind: self.kind,
            first: DescriptorId(base + local.offset),
            count,
        })
    }

    /// Rewind to empty, keeping every chunk.
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Return every chunk to `parent`.
    pub fn release<A: FreeListAlgorithm>(
        self,
        parent: &mut DescriptorHeap<A>,
    ) -> Result<(), HeapError> {
        if parent.id() != self.parent {
            return Err(HeapError::WrongHeap {
                expected: self.parent,
                found: parent.id(),
            });
        }
        Ok(self.arena.release_all(parent)?)
    }

    /// Kind of the parent table.
    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    /// Slots used since the last reset, skipped chunk tails included.
    pub fn used_slots(&self) -> u64 {
        self.arena.used_units()
    }

    /// Slots held in chunks.
    pub fn reserved_slots(&self) -> u64 {
        self.arena.reserved_units()
    }

    /// Number of chunks held.
    pub fn chunk_count(&self) -> usize {
        self.arena.chunk_count()
    }
}
