//! The device buffer heap.
//!
//! One large device buffer, carved into persistent allocations by a
//! free-list [`Suballocator`]. Offsets are byte offsets into the buffer; a
//! shader reaches an allocation through
//! [`device_address`](BufferHeap::device_address).
//!
//! When the buffer is host visible its contents are mirrored in a host
//! byte array, and writes land immediately. A device-local buffer has no
//! host mirror and rejects host access.

use bytemuck::Pod;
use kiln_arena::{ArenaError, BestFit, ChunkSource, FreeListAlgorithm, SubAllocation, Suballocator};
use kiln_core::HeapId;

use crate::config::BufferHeapConfig;
use crate::diagnostics::HeapDiagnostics;
use crate::error::HeapError;

/// Alignment used for scratch chunks carved from a buffer heap.
pub const SCRATCH_CHUNK_ALIGNMENT: u32 = 4;

/// Persistent sub-allocation of one device buffer.
pub struct BufferHeap<A = BestFit> {
    allocator: Suballocator<A>,
    mapped: Option<Box<[u8]>>,
    device_address: u64,
    name: String,
}

impl<A: FreeListAlgorithm> BufferHeap<A> {
    /// Largest supported alignment: the device's default resource placement
    /// alignment.
    pub const MAX_ALIGNMENT: u32 = 64 * 1024;

    /// Create the heap and its backing buffer.
    pub fn new(config: &BufferHeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        let mapped = config
            .host_visible
            .then(|| vec![0u8; config.size as usize].into_boxed_slice());
        let heap = Self {
            allocator: Suballocator::new(config.size),
            mapped,
            device_address: config.device_address,
            name: config.name.clone(),
        };
        tracing::info!(
            heap = %heap.id(),
            name = %heap.name,
            size = config.size,
            host_visible = config.host_visible,
            "buffer heap created"
        );
        Ok(heap)
    }

    /// Allocate `size` bytes aligned to `alignment`.
    pub fn allocate(&mut self, size: u32, alignment: u32) -> Result<SubAllocation, HeapError> {
        if alignment > Self::MAX_ALIGNMENT {
            return Err(ArenaError::InvalidAlignment { alignment }.into());
        }
        Ok(self.allocator.allocate(size, alignment)?)
    }

    /// Allocate room for `count` values of `T`, aligned to at least 4 bytes.
    pub fn allocate_for<T: Pod>(&mut self, count: u32) -> Result<SubAllocation, HeapError> {
        let alignment = (std::mem::align_of::<T>() as u32).max(4);
        let size = (std::mem::size_of::<T>() as u64) * count as u64;
        let size = u32::try_from(size).map_err(|_| HeapError::OutOfBounds {
            offset: 0,
            len: size,
            capacity: self.capacity(),
        })?;
        self.allocate(size, alignment)
    }

    /// Return an allocation to the free list immediately.
    ///
    /// Only safe once the device has finished with the range; during frames
    /// go through the frame pipeline's deferred release instead.
    pub fn free(&mut self, allocation: SubAllocation) -> Result<(), HeapError> {
        Ok(self.allocator.free(allocation)?)
    }

    /// Usable bytes of a live allocation.
    pub fn size(&self, allocation: &SubAllocation) -> Option<u32> {
        self.allocator.size(allocation)
    }

    /// Copy `bytes` into the buffer at `offset`.
    pub fn write_raw(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HeapError> {
        let heap = self.id();
        let range = Self::range(offset, bytes.len(), self.capacity())?;
        let mapped = self
            .mapped
            .as_deref_mut()
            .ok_or(HeapError::NotHostVisible { heap })?;
        mapped[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy a slice of POD values into the buffer at `offset`.
    pub fn write_pod<T: Pod>(&mut self, offset: u32, values: &[T]) -> Result<(), HeapError> {
        self.write_raw(offset, bytemuck::cast_slice(values))
    }

    /// Copy one POD value into the buffer at `offset`.
    pub fn write_value<T: Pod>(&mut self, offset: u32, value: &T) -> Result<(), HeapError> {
        self.write_raw(offset, bytemuck::bytes_of(value))
    }

    /// The host mirror of `len` bytes at `offset`.
    pub fn read_raw(&self, offset: u32, len: usize) -> Result<&[u8], HeapError> {
        let range = Self::range(offset, len, self.capacity())?;
        let mapped = self
            .mapped
            .as_deref()
            .ok_or(HeapError::NotHostVisible { heap: self.id() })?;
        Ok(&mapped[range])
    }

    /// Read a POD value at `offset`. No alignment requirement.
    pub fn read_pod<T: Pod>(&self, offset: u32) -> Result<T, HeapError> {
        let bytes = self.read_raw(offset, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn range(offset: u32, len: usize, capacity: u32) -> Result<std::ops::Range<usize>, HeapError> {
        let end = offset as u64 + len as u64;
        if end > capacity as u64 {
            return Err(HeapError::OutOfBounds {
                offset: offset as u64,
                len: len as u64,
                capacity,
            });
        }
        Ok(offset as usize..end as usize)
    }

    /// Device virtual address of byte `offset` of the buffer.
    pub fn device_address(&self, offset: u32) -> u64 {
        self.device_address + offset as u64
    }

    /// Whether host writes are allowed.
    pub fn is_host_visible(&self) -> bool {
        self.mapped.is_some()
    }

    /// Size of the buffer in bytes.
    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }

    /// Instance id, shared with the underlying suballocator.
    pub fn id(&self) -> HeapId {
        self.allocator.id()
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current usage.
    pub fn diagnostics(&self) -> HeapDiagnostics {
        HeapDiagnostics::of(&self.allocator)
    }
}

impl<A: FreeListAlgorithm> ChunkSource for BufferHeap<A> {
    type Chunk = SubAllocation;

    fn allocate_chunk(&mut self, size: u32) -> Result<SubAllocation, ArenaError> {
        let chunk = self.allocator.allocate(size, SCRATCH_CHUNK_ALIGNMENT)?;
        tracing::debug!(heap = %self.id(), offset = chunk.offset(), size, "scratch chunk reserved");
        Ok(chunk)
    }

    fn release_chunk(&mut self, chunk: SubAllocation) -> Result<(), ArenaError> {
        self.allocator.free(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_arena::FirstFit;

    fn heap(size: u32) -> BufferHeap {
        BufferHeap::new(&BufferHeapConfig::new(size)).unwrap()
    }

    #[test]
    fn allocate_write_read_back() {
        let mut heap = heap(1024);
        let a = heap.allocate_for::<[f32; 4]>(2).unwrap();
        assert_eq!(a.offset() % 4, 0);
        let data = [[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        heap.write_pod(a.offset(), &data).unwrap();
        let second: [f32; 4] = heap.read_pod(a.offset() + 16).unwrap();
        assert_eq!(second, data[1]);
    }

    #[test]
    fn write_past_end_rejected() {
        let mut heap = heap(64);
        let err = heap.write_raw(60, &[0u8; 8]).unwrap_err();
        assert_eq!(
            err,
            HeapError::OutOfBounds {
                offset: 60,
                len: 8,
                capacity: 64
            }
        );
        heap.write_raw(56, &[0u8; 8]).unwrap();
    }

    #[test]
    fn device_local_rejects_host_access() {
        let config = BufferHeapConfig {
            host_visible: false,
            ..BufferHeapConfig::new(256)
        };
        let mut heap: BufferHeap = BufferHeap::new(&config).unwrap();
        assert!(!heap.is_host_visible());
        assert!(matches!(
            heap.write_raw(0, &[1, 2, 3]),
            Err(HeapError::NotHostVisible { .. })
        ));
        assert!(heap.read_pod::<u32>(0).is_err());
        // Allocation still works; only host access is refused.
        assert!(heap.allocate(16, 16).is_ok());
    }

    #[test]
    fn device_address_is_base_plus_offset() {
        let config = BufferHeapConfig {
            device_address: 0x1000_0000,
            ..BufferHeapConfig::new(256)
        };
        let heap: BufferHeap = BufferHeap::new(&config).unwrap();
        assert_eq!(heap.device_address(0x40), 0x1000_0040);
    }

    #[test]
    fn oversize_alignment_rejected() {
        let mut heap = heap(1 << 20);
        assert!(matches!(
            heap.allocate(4, 1 << 17),
            Err(HeapError::Arena(ArenaError::InvalidAlignment { .. }))
        ));
    }

    #[test]
    fn exhaustion_wrapped_as_arena_error() {
        let mut heap = heap(128);
        heap.allocate(100, 4).unwrap();
        assert!(matches!(
            heap.allocate(100, 4),
            Err(HeapError::Arena(ArenaError::OutOfSpace { .. }))
        ));
    }

    #[test]
    fn first_fit_heap() {
        let mut heap: BufferHeap<FirstFit> = BufferHeap::new(&BufferHeapConfig::new(256)).unwrap();
        let a = heap.allocate(10, 1).unwrap();
        heap.free(a).unwrap();
        assert_eq!(heap.diagnostics().used, 0);
    }

    #[test]
    fn zero_size_config_rejected() {
        assert!(matches!(
            BufferHeap::<BestFit>::new(&BufferHeapConfig::new(0)),
            Err(HeapError::InvalidConfig { .. })
        ));
    }
}
