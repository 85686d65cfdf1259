//! Heap usage reporting.

use kiln_arena::{FreeListAlgorithm, Suballocator};

/// Snapshot of a free-list heap's usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapDiagnostics {
    /// Total units managed.
    pub capacity: u32,
    /// Units held by live allocations, padding included.
    pub used: u32,
    /// Peak of `used` since creation.
    pub high_water: u32,
    /// Number of live allocations. Scratch chunks count as allocations.
    pub live_allocations: usize,
    /// Number of disjoint free ranges.
    pub free_ranges: usize,
    /// Size of the largest free range.
    pub largest_free: u32,
}

impl HeapDiagnostics {
    /// Read the current state of a suballocator.
    pub fn of<A: FreeListAlgorithm>(allocator: &Suballocator<A>) -> Self {
        Self {
            capacity: allocator.capacity(),
            used: allocator.used(),
            high_water: allocator.high_water(),
            live_allocations: allocator.live_count(),
            free_ranges: allocator.free_range_count(),
            largest_free: allocator.largest_free(),
        }
    }

    /// Fraction of capacity in use, in `[0, 1]`.
    pub fn utilisation(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used as f64 / self.capacity as f64
        }
    }

    /// Free units not in the largest range, as a fraction of all free units.
    /// Zero when the free space is one contiguous range.
    pub fn fragmentation(&self) -> f64 {
        let free = self.capacity - self.used;
        if free == 0 {
            0.0
        } else {
            1.0 - self.largest_free as f64 / free as f64
        }
    }
}
