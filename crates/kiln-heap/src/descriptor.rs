//! Descriptor tables.
//!
//! A [`DescriptorHeap`] owns one table of view descriptors and carves it
//! into contiguous slot ranges with a free-list [`Suballocator`]. Slot ids
//! are what shaders index with; host and device handles are derived from
//! the table's base handles by `base + id * increment`.
//!
//! A renderer keeps one table per [`DescriptorHeapKind`]. Only the
//! shader-resource table is visible to shaders and therefore has device
//! handles.

use kiln_arena::{ArenaError, BestFit, ChunkSource, FreeListAlgorithm, SubAllocation, Suballocator};
use kiln_core::{DescriptorId, HeapId, ResourceId};

use crate::config::DescriptorHeapConfig;
use crate::diagnostics::HeapDiagnostics;
use crate::error::HeapError;

/// What a descriptor table holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Shader resource and unordered access views. Shader visible.
    ShaderResource,
    /// Render target views.
    RenderTarget,
    /// Depth-stencil views.
    DepthStencil,
}

impl DescriptorHeapKind {
    /// Every kind, in table order.
    pub const ALL: [Self; 3] = [Self::ShaderResource, Self::RenderTarget, Self::DepthStencil];

    /// Whether shaders can index this table.
    pub fn is_shader_visible(self) -> bool {
        matches!(self, Self::ShaderResource)
    }

    /// Handle increment used when a config does not override it.
    pub fn default_increment(self) -> u32 {
        match self {
            Self::ShaderResource | Self::RenderTarget => 32,
            Self::DepthStencil => 8,
        }
    }
}

/// A view stored in a table slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewDescriptor {
    /// Read-only shader view.
    ShaderResource {
        /// Viewed resource.
        resource: ResourceId,
    },
    /// Read-write shader view.
    UnorderedAccess {
        /// Viewed resource.
        resource: ResourceId,
    },
    /// Colour attachment view.
    RenderTarget {
        /// Viewed resource.
        resource: ResourceId,
    },
    /// Depth attachment view.
    DepthStencil {
        /// Viewed resource.
        resource: ResourceId,
    },
}

impl ViewDescriptor {
    /// The viewed resource.
    pub fn resource(&self) -> ResourceId {
        match *self {
            Self::ShaderResource { resource }
            | Self::UnorderedAccess { resource }
            | Self::RenderTarget { resource }
            | Self::DepthStencil { resource } => resource,
        }
    }

    /// Kind of table the view belongs in.
    pub fn heap_kind(&self) -> DescriptorHeapKind {
        match self {
            Self::ShaderResource { .. } | Self::UnorderedAccess { .. } => {
                DescriptorHeapKind::ShaderResource
            }
            Self::RenderTarget { .. } => DescriptorHeapKind::RenderTarget,
            Self::DepthStencil { .. } => DescriptorHeapKind::DepthStencil,
        }
    }
}

/// Host-side descriptor handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CpuDescriptorHandle(pub u64);

/// Device-side descriptor handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuDescriptorHandle(pub u64);

/// A contiguous run of slots in one table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorRange {
    /// Table the slots belong to.
    pub kind: DescriptorHeapKind,
    /// First slot.
    pub first: DescriptorId,
    /// Number of slots.
    pub count: u32,
}

impl DescriptorRange {
    /// Slot `index` of the range.
    pub fn id(&self, index: u32) -> DescriptorId {
        debug_assert!(index < self.count);
        self.first.offset(index)
    }
}

/// A persistent slot range, owned by the caller until freed.
///
/// The default value is the invalid handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorAllocation {
    kind: DescriptorHeapKind,
    sub: SubAllocation,
    count: u32,
}

impl DescriptorAllocation {
    /// The invalid handle for tables of `kind`.
    pub fn invalid(kind: DescriptorHeapKind) -> Self {
        Self {
            kind,
            sub: SubAllocation::INVALID,
            count: 0,
        }
    }

    /// Table the slots belong to.
    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    /// First slot, or [`DescriptorId::INVALID`].
    pub fn first(&self) -> DescriptorId {
        DescriptorId(self.sub.offset())
    }

    /// Slot `index` of the allocation.
    pub fn id(&self, index: u32) -> DescriptorId {
        debug_assert!(index < self.count);
        self.first().offset(index)
    }

    /// Number of slots.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The slots as a plain range.
    pub fn range(&self) -> DescriptorRange {
        DescriptorRange {
            kind: self.kind,
            first: self.first(),
            count: self.count,
        }
    }

    /// Whether the handle refers to an allocation.
    pub fn is_valid(&self) -> bool {
        self.sub.is_valid()
    }

    /// Move the handle out, leaving the invalid handle behind.
    pub fn take(&mut self) -> Self {
        let kind = self.kind;
        std::mem::replace(self, Self::invalid(kind))
    }
}

impl Default for DescriptorAllocation {
    fn default() -> Self {
        Self::invalid(DescriptorHeapKind::ShaderResource)
    }
}

/// One descriptor table with persistent slot allocation.
pub struct DescriptorHeap<A = BestFit> {
    kind: DescriptorHeapKind,
    allocator: Suballocator<A>,
    table: Vec<Option<ViewDescriptor>>,
    cpu_base: u64,
    gpu_base: Option<u64>,
    increment: u32,
}

impl<A: FreeListAlgorithm> DescriptorHeap<A> {
    /// Create the table with every slot empty and free.
    pub fn new(config: &DescriptorHeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        let heap = Self {
            kind: config.kind,
            allocator: Suballocator::new(config.capacity),
            table: vec![None; config.capacity as usize],
            cpu_base: config.cpu_base,
            gpu_base: config.kind.is_shader_visible().then_some(config.gpu_base),
            increment: config.increment,
        };
        tracing::info!(
            heap = %heap.id(),
            kind = ?config.kind,
            capacity = config.capacity,
            "descriptor heap created"
        );
        Ok(heap)
    }

    /// Allocate `count` contiguous slots.
    pub fn allocate(&mut self, count: u32) -> Result<DescriptorAllocation, HeapError> {
        let sub = self.allocator.allocate_exact(count)?;
        Ok(DescriptorAllocation {
            kind: self.kind,
            sub,
            count,
        })
    }

    /// Return slots to the free list immediately and clear them.
    ///
    /// Only safe once the device has finished with the slots; during
    /// frames go through the frame pipeline's deferred release instead.
    pub fn free(&mut self, allocation: DescriptorAllocation) -> Result<(), HeapError> {
        self.check_kind(allocation.kind)?;
        let first = allocation.sub.offset();
        self.allocator.free(allocation.sub)?;
        self.clear(first, allocation.count);
        Ok(())
    }

    fn clear(&mut self, first: u32, count: u32) {
        let start = first as usize;
        let end = (start + count as usize).min(self.table.len());
        self.table[start..end].fill(None);
    }

    fn check_kind(&self, found: DescriptorHeapKind) -> Result<(), HeapError> {
        if found != self.kind {
            return Err(HeapError::WrongDescriptorKind {
                expected: self.kind,
                found,
            });
        }
        Ok(())
    }

    fn slot(&self, id: DescriptorId) -> Result<usize, HeapError> {
        if !id.is_valid() || id.0 >= self.capacity() {
            return Err(HeapError::OutOfBounds {
                offset: id.0 as u64,
                len: 1,
                capacity: self.capacity(),
            });
        }
        Ok(id.0 as usize)
    }

    /// Store `view` in slot `id`.
    pub fn write_view(&mut self, id: DescriptorId, view: ViewDescriptor) -> Result<(), HeapError> {
        self.check_kind(view.heap_kind())?;
        let slot = self.slot(id)?;
        self.table[slot] = Some(view);
        Ok(())
    }

    /// The view stored in slot `id`.
    pub fn view(&self, id: DescriptorId) -> Result<&ViewDescriptor, HeapError> {
        let slot = self.slot(id)?;
        self.table[slot]
            .as_ref()
            .ok_or(HeapError::EmptyTableSlot { id })
    }

    /// Allocate one slot and write `view` into it.
    pub fn create_view(&mut self, view: ViewDescriptor) -> Result<DescriptorAllocation, HeapError> {
        self.check_kind(view.heap_kind())?;
        let allocation = self.allocate(1)?;
        self.write_view(allocation.first(), view)?;
        Ok(allocation)
    }

    /// Host handle of slot `id`.
    pub fn cpu_handle(&self, id: DescriptorId) -> CpuDescriptorHandle {
        CpuDescriptorHandle(self.cpu_base + id.0 as u64 * self.increment as u64)
    }

    /// Device handle of slot `id`, if the table is shader visible.
    pub fn gpu_handle(&self, id: DescriptorId) -> Option<GpuDescriptorHandle> {
        self.gpu_base
            .map(|base| GpuDescriptorHandle(base + id.0 as u64 * self.increment as u64))
    }

    /// Table kind.
    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }

    /// Bytes between consecutive handles.
    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Instance id, shared with the underlying suballocator.
    pub fn id(&self) -> HeapId {
        self.allocator.id()
    }

    /// Current usage, in slots.
    pub fn diagnostics(&self) -> HeapDiagnostics {
        HeapDiagnostics::of(&self.allocator)
    }
}

impl<A: FreeListAlgorithm> ChunkSource for DescriptorHeap<A> {
    type Chunk = SubAllocation;

    fn allocate_chunk(&mut self, size: u32) -> Result<SubAllocation, ArenaError> {
        let chunk = self.allocator.allocate_exact(size)?;
        tracing::debug!(heap = %self.id(), first = chunk.offset(), size, "descriptor chunk reserved");
        Ok(chunk)
    }

    fn release_chunk(&mut self, chunk: SubAllocation) -> Result<(), ArenaError> {
        let first = chunk.offset();
        let size = self.allocator.size(&chunk).unwrap_or(0);
        self.allocator.free(chunk)?;
        self.clear(first, size);
        Ok(())
    }
}
