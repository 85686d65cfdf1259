//! Free-list suballocation of a capacity-bounded offset range.
//!
//! A [`Suballocator`] hands out ranges of `[0, capacity)` for persistent
//! device allocations. The search strategy lives behind the
//! [`FreeListAlgorithm`] trait; the suballocator itself only adds
//! alignment padding, handle validation, and the `raw offset -> raw size`
//! bookkeeping needed to free a handle and to answer its usable size.
//!
//! Freed ranges are coalesced with free neighbours immediately, so the free
//! list never holds two adjacent ranges. Live ranges are never moved.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use kiln_core::{HeapId, INVALID_OFFSET};

use crate::align::{align_up, is_valid_alignment};
use crate::error::ArenaError;

/// A contiguous range of units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreeRange {
    /// First unit of the range.
    pub offset: u32,
    /// Number of units.
    pub size: u32,
}

impl FreeRange {
    /// One past the last unit.
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

/// Range search and coalescing strategy for a [`Suballocator`].
pub trait FreeListAlgorithm {
    /// A free list covering `[0, capacity)` as one range.
    fn with_capacity(capacity: u32) -> Self
    where
        Self: Sized;

    /// Remove `size` units from the free list and return their offset, or
    /// `None` if no free range is large enough.
    fn allocate(&mut self, size: u32) -> Option<u32>;

    /// Return `[offset, offset + size)` to the free list, merging it with
    /// adjacent free ranges.
    fn free(&mut self, offset: u32, size: u32);

    /// Total free units.
    fn free_units(&self) -> u32;

    /// Size of the largest free range, or zero.
    fn largest_free(&self) -> u32;

    /// Number of disjoint free ranges.
    fn free_range_count(&self) -> usize;

    /// Free ranges in ascending offset order.
    fn free_ranges(&self) -> Vec<FreeRange>;
}

/// Coalescing free-range storage shared by both strategies.
///
/// Indexed by offset for neighbour lookup and by `(size, offset)` for
/// best-fit search.
#[derive(Clone, Debug, Default)]
struct RangeSet {
    by_offset: BTreeMap<u32, u32>,
    by_size: BTreeSet<(u32, u32)>,
    free_units: u32,
}

impl RangeSet {
    fn with_capacity(capacity: u32) -> Self {
        let mut set = Self::default();
        if capacity > 0 {
            set.insert(0, capacity);
            set.free_units = capacity;
        }
        set
    }

    fn insert(&mut self, offset: u32, size: u32) {
        self.by_offset.insert(offset, size);
        self.by_size.insert((size, offset));
    }

    fn remove(&mut self, offset: u32, size: u32) {
        self.by_offset.remove(&offset);
        self.by_size.remove(&(size, offset));
    }

    /// Take `size` units from the front of the free range at `offset`.
    fn take(&mut self, offset: u32, range_size: u32, size: u32) -> u32 {
        self.remove(offset, range_size);
        if range_size > size {
            self.insert(offset + size, range_size - size);
        }
        self.free_units -= size;
        offset
    }

    fn release(&mut self, offset: u32, size: u32) {
        let mut start = offset;
        let mut len = size;

        let before = self
            .by_offset
            .range(..offset)
            .next_back()
            .map(|(&o, &s)| (o, s));
        if let Some((prev_offset, prev_size)) = before {
            debug_assert!(prev_offset as u64 + prev_size as u64 <= offset as u64);
            if prev_offset + prev_size == offset {
                self.remove(prev_offset, prev_size);
                start = prev_offset;
                len += prev_size;
            }
        }

        let after = offset
            .checked_add(size)
            .and_then(|end| self.by_offset.get(&end).map(|&s| (end, s)));
        if let Some((next_offset, next_size)) = after {
            self.remove(next_offset, next_size);
            len += next_size;
        }

        self.insert(start, len);
        self.free_units += size;
    }

    fn largest(&self) -> u32 {
        self.by_size.iter().next_back().map_or(0, |&(size, _)| size)
    }

    fn ranges(&self) -> Vec<FreeRange> {
        self.by_offset
            .iter()
            .map(|(&offset, &size)| FreeRange { offset, size })
            .collect()
    }
}

/// Smallest free range that fits; lowest offset among equal sizes.
#[derive(Clone, Debug)]
pub struct BestFit {
    ranges: RangeSet,
}

impl FreeListAlgorithm for BestFit {
    fn with_capacity(capacity: u32) -> Self {
        Self {
            ranges: RangeSet::with_capacity(capacity),
        }
    }

    fn allocate(&mut self, size: u32) -> Option<u32> {
        let &(range_size, offset) = self.ranges.by_size.range((size, 0)..).next()?;
        Some(self.ranges.take(offset, range_size, size))
    }

    fn free(&mut self, offset: u32, size: u32) {
        self.ranges.release(offset, size);
    }

    fn free_units(&self) -> u32 {
        self.ranges.free_units
    }

    fn largest_free(&self) -> u32 {
        self.ranges.largest()
    }

    fn free_range_count(&self) -> usize {
        self.ranges.by_offset.len()
    }

    fn free_ranges(&self) -> Vec<FreeRange> {
        self.ranges.ranges()
    }
}

/// Lowest-offset free range that fits.
#[derive(Clone, Debug)]
pub struct FirstFit {
    ranges: RangeSet,
}

impl FreeListAlgorithm for FirstFit {
    fn with_capacity(capacity: u32) -> Self {
        Self {
            ranges: RangeSet::with_capacity(capacity),
        }
    }

    fn allocate(&mut self, size: u32) -> Option<u32> {
        let (offset, range_size) = self
            .ranges
            .by_offset
            .iter()
            .find(|&(_, &s)| s >= size)
            .map(|(&o, &s)| (o, s))?;
        Some(self.ranges.take(offset, range_size, size))
    }

    fn free(&mut self, offset: u32, size: u32) {
        self.ranges.release(offset, size);
    }

    fn free_units(&self) -> u32 {
        self.ranges.free_units
    }

    fn largest_free(&self) -> u32 {
        self.ranges.largest()
    }

    fn free_range_count(&self) -> usize {
        self.ranges.by_offset.len()
    }

    fn free_ranges(&self) -> Vec<FreeRange> {
        self.ranges.ranges()
    }
}

/// Handle to a range owned by a [`Suballocator`].
///
/// Copyable, but must be returned exactly once. The default value is the
/// invalid handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubAllocation {
    heap: HeapId,
    offset: u32,
    raw_offset: u32,
}

impl SubAllocation {
    /// The "not allocated" handle.
    pub const INVALID: Self = Self {
        heap: HeapId::NONE,
        offset: INVALID_OFFSET,
        raw_offset: INVALID_OFFSET,
    };

    /// Aligned start of the usable range.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Start of the range as carved from the free list, before alignment.
    pub fn raw_offset(&self) -> u32 {
        self.raw_offset
    }

    /// Suballocator that produced the handle.
    pub fn heap(&self) -> HeapId {
        self.heap
    }

    /// Whether the handle refers to an allocation.
    pub fn is_valid(&self) -> bool {
        self.offset != INVALID_OFFSET
    }

    /// Move the handle out, leaving the invalid handle behind.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::INVALID)
    }
}

impl Default for SubAllocation {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Capacity-bounded range allocator with alignment and handle validation.
pub struct Suballocator<A = BestFit> {
    id: HeapId,
    capacity: u32,
    algorithm: A,
    /// Raw offset -> raw size of every live allocation.
    live: IndexMap<u32, u32>,
    used: u32,
    high_water: u32,
}

impl<A: FreeListAlgorithm> Suballocator<A> {
    /// A suballocator over `[0, capacity)` with everything free.
    pub fn new(capacity: u32) -> Self {
        Self {
            id: HeapId::next(),
            capacity,
            algorithm: A::with_capacity(capacity),
            live: IndexMap::new(),
            used: 0,
            high_water: 0,
        }
    }

    /// Allocate at least `size` units starting at a multiple of `alignment`.
    ///
    /// Requests `size + alignment` units from the free list so the aligned
    /// start always fits.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidAlignment`] unless `alignment` is a power of two;
    /// [`ArenaError::OutOfSpace`] if no free range can hold the padded size.
    pub fn allocate(&mut self, size: u32, alignment: u32) -> Result<SubAllocation, ArenaError> {
        if !is_valid_alignment(alignment) {
            return Err(ArenaError::InvalidAlignment { alignment });
        }
        let padded = size.checked_add(alignment).ok_or_else(|| self.out_of_space(u32::MAX))?;
        let raw_offset = self.carve(padded)?;
        Ok(SubAllocation {
            heap: self.id,
            offset: align_up(raw_offset, alignment),
            raw_offset,
        })
    }

    /// Allocate exactly `size` units with no padding.
    pub fn allocate_exact(&mut self, size: u32) -> Result<SubAllocation, ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroSizedAllocation);
        }
        let raw_offset = self.carve(size)?;
        Ok(SubAllocation {
            heap: self.id,
            offset: raw_offset,
            raw_offset,
        })
    }

    fn carve(&mut self, raw_size: u32) -> Result<u32, ArenaError> {
        let Some(raw_offset) = self.algorithm.allocate(raw_size) else {
            let err = self.out_of_space(raw_size);
            tracing::error!(heap = %self.id, capacity = self.capacity, %err, "suballocation failed");
            return Err(err);
        };
        self.live.insert(raw_offset, raw_size);
        self.used += raw_size;
        self.high_water = self.high_water.max(self.used);
        Ok(raw_offset)
    }

    fn out_of_space(&self, requested: u32) -> ArenaError {
        ArenaError::OutOfSpace {
            requested,
            free: self.algorithm.free_units(),
            largest: self.algorithm.largest_free(),
        }
    }

    /// Return an allocation to the free list.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidHandle`] for the invalid handle,
    /// [`ArenaError::ForeignAllocation`] for a handle from another
    /// suballocator, [`ArenaError::UnknownAllocation`] if the range is not
    /// live (double free). The free list is untouched on error.
    pub fn free(&mut self, allocation: SubAllocation) -> Result<(), ArenaError> {
        self.check_owner(&allocation)?;
        let raw_size = self
            .live
            .swap_remove(&allocation.raw_offset)
            .ok_or(ArenaError::UnknownAllocation {
                offset: allocation.raw_offset,
            })?;
        self.algorithm.free(allocation.raw_offset, raw_size);
        self.used -= raw_size;
        Ok(())
    }

    fn check_owner(&self, allocation: &SubAllocation) -> Result<(), ArenaError> {
        if !allocation.is_valid() {
            return Err(ArenaError::InvalidHandle);
        }
        if allocation.heap != self.id {
            return Err(ArenaError::ForeignAllocation {
                allocation_heap: allocation.heap,
                heap: self.id,
            });
        }
        Ok(())
    }

    /// Usable units from the handle's aligned offset to the end of its raw
    /// range, or `None` if the handle is not live here.
    pub fn size(&self, allocation: &SubAllocation) -> Option<u32> {
        self.check_owner(allocation).ok()?;
        let raw_size = *self.live.get(&allocation.raw_offset)?;
        Some(raw_size - (allocation.offset - allocation.raw_offset))
    }

    /// Whether the handle is a live allocation of this suballocator.
    pub fn contains(&self, allocation: &SubAllocation) -> bool {
        self.size(allocation).is_some()
    }

    /// This suballocator's instance id.
    pub fn id(&self) -> HeapId {
        self.id
    }

    /// Total units managed.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units held by live allocations, padding included.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Peak of [`used`](Self::used) since creation.
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total free units.
    pub fn free_units(&self) -> u32 {
        self.algorithm.free_units()
    }

    /// Size of the largest free range.
    pub fn largest_free(&self) -> u32 {
        self.algorithm.largest_free()
    }

    /// Number of disjoint free ranges.
    pub fn free_range_count(&self) -> usize {
        self.algorithm.free_range_count()
    }

    /// Free ranges in ascending offset order.
    pub fn free_ranges(&self) -> Vec<FreeRange> {
        self.algorithm.free_ranges()
    }

    /// Raw ranges of live allocations, in ascending offset order.
    pub fn live_ranges(&self) -> Vec<FreeRange> {
        let mut ranges: Vec<FreeRange> = self
            .live
            .iter()
            .map(|(&offset, &size)| FreeRange { offset, size })
            .collect();
        ranges.sort_unstable();
        ranges
    }
}
