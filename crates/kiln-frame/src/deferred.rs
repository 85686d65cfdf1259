//! Deferred reclamation of long-lived allocations.
//!
//! A resource released during a frame may still be read by device work
//! that has been recorded but not retired. Releases are therefore queued
//! on the frame slot that was current at release time, and executed when
//! that slot is next reused: by then the device has signalled completion of
//! the slot's previous frame, and with it every use of the resource.

use smallvec::SmallVec;

use kiln_arena::SubAllocation;
use kiln_core::{Device, PipelineId, ResourceId};
use kiln_heap::DescriptorAllocation;

use crate::error::FrameError;
use crate::heaps::RenderHeaps;

/// One queued release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredRelease {
    /// A persistent range of the buffer heap.
    BufferRange(SubAllocation),
    /// A persistent slot range of one of the descriptor tables.
    DescriptorRange(DescriptorAllocation),
    /// A pipeline state object, destroyed through the device.
    Pipeline(PipelineId),
    /// A raw device resource, destroyed through the device.
    Resource(ResourceId),
}

/// A handle that can be given up for deferred release.
pub trait Retire {
    /// Move the handle into a release, leaving it invalid. Returns `None`
    /// if the handle was already invalid.
    fn retire(&mut self) -> Option<DeferredRelease>;
}

impl Retire for SubAllocation {
    fn retire(&mut self) -> Option<DeferredRelease> {
        self.is_valid()
            .then(|| DeferredRelease::BufferRange(self.take()))
    }
}

impl Retire for DescriptorAllocation {
    fn retire(&mut self) -> Option<DeferredRelease> {
        self.is_valid()
            .then(|| DeferredRelease::DescriptorRange(self.take()))
    }
}

impl Retire for Option<PipelineId> {
    fn retire(&mut self) -> Option<DeferredRelease> {
        self.take().map(DeferredRelease::Pipeline)
    }
}

impl Retire for Option<ResourceId> {
    fn retire(&mut self) -> Option<DeferredRelease> {
        self.take().map(DeferredRelease::Resource)
    }
}

/// Counts of releases executed by one drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Buffer ranges returned to the buffer heap.
    pub buffer_ranges: u32,
    /// Descriptor ranges returned to their tables.
    pub descriptor_ranges: u32,
    /// Pipelines handed to the device for destruction.
    pub pipelines: u32,
    /// Resources handed to the device for destruction.
    pub resources: u32,
}

impl DrainStats {
    /// Total releases executed.
    pub fn total(&self) -> u32 {
        self.buffer_ranges + self.descriptor_ranges + self.pipelines + self.resources
    }
}

/// Releases waiting for one frame slot to retire.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    items: SmallVec<[DeferredRelease; 8]>,
}

impl DeferredQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a release.
    pub fn push(&mut self, release: DeferredRelease) {
        self.items.push(release);
    }

    /// Number of queued releases.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queued releases, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DeferredRelease> {
        self.items.iter()
    }

    /// Execute every queued release, oldest first.
    ///
    /// Only call once the device has retired every frame that could use
    /// the queued resources. All releases are attempted even if one fails;
    /// the first failure is returned.
    pub fn drain<D: Device>(
        &mut self,
        heaps: &mut RenderHeaps,
        device: &mut D,
    ) -> Result<DrainStats, FrameError> {
        let mut stats = DrainStats::default();
        let mut first_error = None;
        for release in self.items.drain(..) {
            let result = match release {
                DeferredRelease::BufferRange(range) => {
                    stats.buffer_ranges += 1;
                    heaps.buffers.free(range)
                }
                DeferredRelease::DescriptorRange(range) => {
                    stats.descriptor_ranges += 1;
                    heaps.descriptors_mut(range.kind()).free(range)
                }
                DeferredRelease::Pipeline(pipeline) => {
                    stats.pipelines += 1;
                    device.release_pipeline(pipeline);
                    Ok(())
                }
                DeferredRelease::Resource(resource) => {
                    stats.resources += 1;
                    device.release_resource(resource);
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::error!(?release, error = %e, "deferred release failed");
                first_error.get_or_insert(FrameError::Heap(e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}
