//! Per-frame allocation access.
//!
//! A [`FrameContext`] exists between `FramePipeline::begin` and
//! `FramePipeline::end`. It mutably borrows the current slot, the shared
//! heaps, and the stack allocator for its whole lifetime, so the frame
//! cannot end, and the slot cannot be recycled, while it is alive.

use bytemuck::Pod;

use kiln_arena::{ArenaError, HostAllocation, LinearAllocator, StackAllocator, StackScope, SubAllocation};
use kiln_core::{DescriptorId, FrameIndex};
use kiln_heap::{
    DescriptorAllocation, DescriptorHeapKind, DescriptorRange, HeapError, ScratchAllocation,
    ViewDescriptor,
};

use crate::deferred::{DeferredRelease, Retire};
use crate::error::FrameError;
use crate::heaps::RenderHeaps;
use crate::slot::FrameSlot;

/// Split borrow of the pipeline for one frame.
pub struct FrameContext<'a> {
    index: FrameIndex,
    frame_number: u64,
    slot: &'a mut FrameSlot,
    heaps: &'a mut RenderHeaps,
    stack: &'a mut StackAllocator,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(
        frame_number: u64,
        slot: &'a mut FrameSlot,
        heaps: &'a mut RenderHeaps,
        stack: &'a mut StackAllocator,
    ) -> Self {
        Self {
            index: slot.index(),
            frame_number,
            slot,
            heaps,
            stack,
        }
    }

    /// Slot this frame records into.
    pub fn index(&self) -> FrameIndex {
        self.index
    }

    /// Frames begun before this one.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    // ── Scratch ────────────────────────────────────────────────────

    /// Transient buffer memory, valid until this slot is next reused.
    pub fn scratch_buffer(
        &mut self,
        size: u32,
        alignment: u32,
    ) -> Result<ScratchAllocation, FrameError> {
        Ok(self
            .slot
            .scratch_buffers_mut()
            .allocate(&mut self.heaps.buffers, size, alignment)?)
    }

    /// Transient buffer memory for `count` values of `T`, aligned to at
    /// least 4 bytes.
    pub fn scratch_buffer_for<T: Pod>(&mut self, count: usize) -> Result<ScratchAllocation, FrameError> {
        let alignment = (std::mem::align_of::<T>() as u32).max(4);
        let bytes = std::mem::size_of::<T>() as u64 * count as u64;
        let size = u32::try_from(bytes).map_err(|_| HeapError::OutOfBounds {
            offset: 0,
            len: bytes,
            capacity: self.heaps.buffers.capacity(),
        })?;
        self.scratch_buffer(size, alignment)
    }

    /// Upload `data` into transient buffer memory.
    pub fn write_scratch<T: Pod>(&mut self, data: &[T]) -> Result<ScratchAllocation, FrameError> {
        let allocation = self.scratch_buffer_for::<T>(data.len())?;
        self.heaps.buffers.write_pod(allocation.offset, data)?;
        Ok(allocation)
    }

    /// Transient shader-resource descriptor slots.
    pub fn scratch_descriptors(&mut self, count: u32) -> Result<DescriptorRange, FrameError> {
        Ok(self
            .slot
            .scratch_descriptors_mut()
            .allocate(&mut self.heaps.shader_resources, count)?)
    }

    /// This slot's host scratch arena. Reset when the slot is reused.
    pub fn host(&mut self) -> HostScratch<'_> {
        HostScratch {
            arena: self.slot.host_mut(),
        }
    }

    /// A host allocation scope released when the returned guard drops.
    pub fn stack_scope(&mut self) -> StackScope<'_> {
        self.stack.scope()
    }

    // ── Persistent ─────────────────────────────────────────────────

    /// Persistent buffer memory. Return it with
    /// [`safe_release`](Self::safe_release).
    pub fn allocate_buffer(&mut self, size: u32, alignment: u32) -> Result<SubAllocation, FrameError> {
        Ok(self.heaps.buffers.allocate(size, alignment)?)
    }

    /// Persistent descriptor slots in the table of `kind`.
    pub fn allocate_descriptors(
        &mut self,
        kind: DescriptorHeapKind,
        count: u32,
    ) -> Result<DescriptorAllocation, FrameError> {
        Ok(self.heaps.descriptors_mut(kind).allocate(count)?)
    }

    /// Persistent slot holding `view`, in the table matching the view.
    pub fn create_view(&mut self, view: ViewDescriptor) -> Result<DescriptorAllocation, FrameError> {
        Ok(self
            .heaps
            .descriptors_mut(view.heap_kind())
            .create_view(view)?)
    }

    /// Store `view` in slot `id` of the table matching the view.
    pub fn write_view(&mut self, id: DescriptorId, view: ViewDescriptor) -> Result<(), FrameError> {
        Ok(self
            .heaps
            .descriptors_mut(view.heap_kind())
            .write_view(id, view)?)
    }

    /// Copy POD values into the buffer heap at `offset`.
    pub fn write_buffer<T: Pod>(&mut self, offset: u32, data: &[T]) -> Result<(), FrameError> {
        Ok(self.heaps.buffers.write_pod(offset, data)?)
    }

    /// Device address of buffer heap byte `offset`.
    pub fn device_address(&self, offset: u32) -> u64 {
        self.heaps.buffers.device_address(offset)
    }

    /// Copy raw bytes into the buffer heap at `offset`.
    pub fn write_raw(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FrameError> {
        Ok(self.heaps.buffers.write_raw(offset, bytes)?)
    }

    /// The shared heaps, read-only. Persistent memory goes back through
    /// [`safe_release`](Self::safe_release), never straight to a heap.
    pub fn heaps(&self) -> &RenderHeaps {
        self.heaps
    }

    // ── Release ────────────────────────────────────────────────────

    /// Queue `handle` for release once the device has finished with this
    /// frame, leaving the caller's handle invalid. Invalid handles are
    /// ignored. Returns whether anything was queued.
    pub fn safe_release<R: Retire>(&mut self, handle: &mut R) -> bool {
        match handle.retire() {
            Some(release) => {
                self.release(release);
                true
            }
            None => false,
        }
    }

    /// Queue a release on this frame's slot.
    pub fn release(&mut self, release: DeferredRelease) {
        tracing::trace!(slot = %self.index, ?release, "release deferred");
        self.slot.deferred_mut().push(release);
    }

    /// Releases queued on this slot so far.
    pub fn pending_releases(&self) -> usize {
        self.slot.deferred().len()
    }
}

/// Allocation-only view of a slot's host arena.
///
/// Earlier allocations stay valid until the slot is recycled, so there is
/// no way to rewind from here.
pub struct HostScratch<'a> {
    arena: &'a mut LinearAllocator,
}

impl HostScratch<'_> {
    /// Allocate `size` bytes aligned to `alignment`.
    pub fn allocate_raw(&mut self, size: u32, alignment: u32) -> Result<HostAllocation, ArenaError> {
        self.arena.allocate_raw(size, alignment)
    }

    /// Allocate a zeroed slice of `count` values of `T`.
    pub fn allocate_slice<T: Pod>(&mut self, count: usize) -> Result<&mut [T], ArenaError> {
        self.arena.allocate_slice(count)
    }

    /// Copy `data` into host scratch memory.
    pub fn write_temporary<T: Pod>(&mut self, data: &[T]) -> Result<HostAllocation, ArenaError> {
        self.arena.write_temporary(data)
    }

    /// Bytes of an allocation made this frame.
    pub fn bytes(&self, allocation: &HostAllocation) -> &[u8] {
        self.arena.bytes(allocation)
    }

    /// Bytes of an allocation made this frame, mutably.
    pub fn bytes_mut(&mut self, allocation: &HostAllocation) -> &mut [u8] {
        self.arena.bytes_mut(allocation)
    }

    /// View an allocation made this frame as a slice of `T`.
    pub fn typed<T: Pod>(&self, allocation: &HostAllocation) -> &[T] {
        self.arena.typed(allocation)
    }

    /// Bytes allocated from the arena since the slot was recycled.
    pub fn used_bytes(&self) -> u64 {
        self.arena.used_bytes()
    }
}
