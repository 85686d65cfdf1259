//! Reusable invariant checks for free-list suballocators.
//!
//! These panic with a descriptive message on violation, so they can be
//! called from unit tests, property tests, and downstream crates' tests of
//! heaps built on [`Suballocator`].

use crate::freelist::{FreeListAlgorithm, FreeRange, Suballocator};

/// Assert that live ranges and free ranges exactly tile `[0, capacity)`:
/// no gaps, no overlaps, and no two adjacent free ranges (coalescing).
pub fn assert_exact_tiling<A: FreeListAlgorithm>(heap: &Suballocator<A>) {
    let free = heap.free_ranges();
    let mut all: Vec<(FreeRange, bool)> = heap
        .live_ranges()
        .into_iter()
        .map(|r| (r, false))
        .chain(free.iter().map(|&r| (r, true)))
        .collect();
    all.sort_unstable_by_key(|(r, _)| r.offset);

    let mut cursor: u64 = 0;
    let mut previous_free = false;
    for (range, is_free) in &all {
        assert_eq!(
            range.offset as u64, cursor,
            "range {range:?} does not start where the previous one ended"
        );
        assert!(range.size > 0, "empty range {range:?}");
        assert!(
            !(previous_free && *is_free),
            "adjacent free ranges not coalesced at offset {}",
            range.offset
        );
        cursor = range.end();
        previous_free = *is_free;
    }
    assert_eq!(
        cursor,
        heap.capacity() as u64,
        "ranges cover {cursor} of {} units",
        heap.capacity()
    );

    let free_total: u64 = free.iter().map(|r| r.size as u64).sum();
    assert_eq!(free_total, heap.free_units() as u64, "free unit count drifted");
    assert_eq!(
        free_total + heap.used() as u64,
        heap.capacity() as u64,
        "used + free != capacity"
    );
}

/// Assert that no two `(offset, size)` ranges overlap.
pub fn assert_disjoint(ranges: &[FreeRange]) {
    let mut sorted = ranges.to_vec();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        assert!(
            pair[0].end() <= pair[1].offset as u64,
            "ranges {:?} and {:?} overlap",
            pair[0],
            pair[1]
        );
    }
}
