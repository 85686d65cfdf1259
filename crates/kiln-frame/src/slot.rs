//! Per-frame slot state.

use kiln_arena::{ArenaConfig, LinearAllocator};
use kiln_core::{CompletionValue, Device, FrameIndex};
use kiln_heap::{ScratchBufferHeap, ScratchDescriptorHeap};

use crate::config::FrameConfig;
use crate::deferred::{DeferredQueue, DrainStats};
use crate::error::FrameError;
use crate::heaps::RenderHeaps;

/// Where a slot is in its reuse cycle.
///
/// `Idle -> Submitted -> (wait) -> Retired -> Idle`. A slot is `Idle`
/// while its frame is being recorded and `Submitted` once the frame has
/// been handed to the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Fresh, or reset and ready for recording.
    Idle,
    /// Work signalled; the device may still be using the slot's memory.
    Submitted,
    /// The device has passed the slot's target; not yet drained and reset.
    Retired,
}

/// One in-flight frame's transient memory and pending releases.
pub struct FrameSlot {
    index: FrameIndex,
    state: SlotState,
    target: CompletionValue,
    host: LinearAllocator,
    scratch_buffers: ScratchBufferHeap,
    scratch_descriptors: ScratchDescriptorHeap,
    deferred: DeferredQueue,
}

impl FrameSlot {
    pub(crate) fn new(
        index: FrameIndex,
        config: &FrameConfig,
        heaps: &mut RenderHeaps,
    ) -> Result<Self, FrameError> {
        let host = LinearAllocator::new(&ArenaConfig {
            chunk_size: config.host_chunk_size,
            initial_chunk_count: config.host_initial_chunks,
        })?;
        let scratch_buffers = ScratchBufferHeap::new(
            &mut heaps.buffers,
            config.scratch_buffer_chunk_size,
            config.scratch_buffer_initial_chunks,
        )?;
        let scratch_descriptors = match ScratchDescriptorHeap::new(
            &mut heaps.shader_resources,
            config.scratch_descriptor_chunk_size,
            config.scratch_descriptor_initial_chunks,
        ) {
            Ok(heap) => heap,
            Err(e) => {
                scratch_buffers.release(&mut heaps.buffers)?;
                return Err(e.into());
            }
        };
        Ok(Self {
            index,
            state: SlotState::Idle,
            target: CompletionValue::ZERO,
            host,
            scratch_buffers,
            scratch_descriptors,
            deferred: DeferredQueue::new(),
        })
    }

    /// Mark retired, run deferred releases, and reset scratch memory.
    ///
    /// The caller guarantees the device has reached this slot's target.
    /// Scratch memory is reset even if a release fails.
    pub(crate) fn recycle<D: Device>(
        &mut self,
        heaps: &mut RenderHeaps,
        device: &mut D,
    ) -> Result<DrainStats, FrameError> {
        self.state = SlotState::Retired;
        let drained = self.deferred.drain(heaps, device);
        self.host.reset();
        self.scratch_buffers.reset();
        self.scratch_descriptors.reset();
        self.state = SlotState::Idle;
        drained
    }

    pub(crate) fn submit(&mut self, target: CompletionValue) {
        self.target = target;
        self.state = SlotState::Submitted;
    }

    pub(crate) fn release_scratch(self, heaps: &mut RenderHeaps) -> Result<(), FrameError> {
        let buffers = self.scratch_buffers.release(&mut heaps.buffers);
        let descriptors = self
            .scratch_descriptors
            .release(&mut heaps.shader_resources);
        buffers?;
        descriptors?;
        Ok(())
    }

    pub(crate) fn host_mut(&mut self) -> &mut LinearAllocator {
        &mut self.host
    }

    pub(crate) fn scratch_buffers_mut(&mut self) -> &mut ScratchBufferHeap {
        &mut self.scratch_buffers
    }

    pub(crate) fn scratch_descriptors_mut(&mut self) -> &mut ScratchDescriptorHeap {
        &mut self.scratch_descriptors
    }

    pub(crate) fn deferred_mut(&mut self) -> &mut DeferredQueue {
        &mut self.deferred
    }

    /// Position in the ring.
    pub fn index(&self) -> FrameIndex {
        self.index
    }

    /// Current state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Completion value signalled for this slot's latest frame.
    pub fn target(&self) -> CompletionValue {
        self.target
    }

    /// Releases waiting for this slot to retire.
    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Usage snapshot.
    pub fn diagnostics(&self) -> SlotDiagnostics {
        SlotDiagnostics {
            index: self.index,
            state: self.state,
            target: self.target,
            pending_releases: self.deferred.len(),
            host_used_bytes: self.host.used_bytes(),
            host_reserved_bytes: self.host.reserved_bytes(),
            scratch_buffer_used_bytes: self.scratch_buffers.used_bytes(),
            scratch_buffer_reserved_bytes: self.scratch_buffers.reserved_bytes(),
            scratch_descriptors_used: self.scratch_descriptors.used_slots(),
        }
    }
}

/// Usage of one frame slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotDiagnostics {
    /// Slot index.
    pub index: FrameIndex,
    /// Slot state.
    pub state: SlotState,
    /// Latest target.
    pub target: CompletionValue,
    /// Queued releases.
    pub pending_releases: usize,
    /// Host scratch bytes in use.
    pub host_used_bytes: u64,
    /// Host scratch bytes reserved.
    pub host_reserved_bytes: u64,
    /// Scratch buffer bytes in use.
    pub scratch_buffer_used_bytes: u64,
    /// Scratch buffer bytes reserved from the buffer heap.
    pub scratch_buffer_reserved_bytes: u64,
    /// Scratch descriptor slots in use.
    pub scratch_descriptors_used: u64,
}
