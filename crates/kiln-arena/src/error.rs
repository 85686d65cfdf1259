//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use kiln_core::{ArenaId, HeapId};

/// Errors that can occur during arena, suballocator and pool operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// A bump allocation larger than one chunk. Bump allocations never span
    /// chunks, so this can never succeed.
    AllocationTooLarge {
        /// Units requested, including alignment padding.
        requested: u32,
        /// Size of a single chunk.
        chunk_size: u32,
    },
    /// The free list has no range large enough for the request.
    OutOfSpace {
        /// Units requested, including alignment padding.
        requested: u32,
        /// Total free units across all ranges.
        free: u32,
        /// Size of the largest free range.
        largest: u32,
    },
    /// Alignment was zero, not a power of two, or above what the allocator
    /// can honour.
    InvalidAlignment {
        /// The rejected alignment.
        alignment: u32,
    },
    /// A zero-sized exact allocation. Such a range cannot be tracked.
    ZeroSizedAllocation,
    /// The handle carries the invalid-offset sentinel.
    InvalidHandle,
    /// The handle's offset is not a live allocation of this suballocator.
    /// Either it was already freed or it never came from here.
    UnknownAllocation {
        /// Raw offset recorded in the handle.
        offset: u32,
    },
    /// The handle was produced by a different suballocator.
    ForeignAllocation {
        /// Heap that produced the handle.
        allocation_heap: HeapId,
        /// Heap the handle was returned to.
        heap: HeapId,
    },
    /// A marker produced by a different arena.
    ForeignMarker {
        /// Arena that produced the marker.
        marker_arena: ArenaId,
        /// Arena the marker was applied to.
        arena: ArenaId,
    },
    /// Every slot of a fixed-size pool is in use.
    PoolExhausted {
        /// Number of slots in the pool.
        capacity: u32,
    },
    /// A pool slot index outside `0..capacity`.
    SlotOutOfRange {
        /// The rejected index.
        index: u32,
        /// Number of slots in the pool.
        capacity: u32,
    },
    /// A pool slot freed while already free.
    SlotNotAllocated {
        /// The slot index.
        index: u32,
    },
    /// Construction parameters were rejected.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationTooLarge {
                requested,
                chunk_size,
            } => {
                write!(
                    f,
                    "allocation of {requested} units exceeds chunk size {chunk_size}"
                )
            }
            Self::OutOfSpace {
                requested,
                free,
                largest,
            } => {
                write!(
                    f,
                    "out of space: requested {requested} units, {free} free, largest range {largest}"
                )
            }
            Self::InvalidAlignment { alignment } => {
                write!(f, "invalid alignment {alignment}")
            }
            Self::ZeroSizedAllocation => write!(f, "zero-sized allocation"),
            Self::InvalidHandle => write!(f, "invalid allocation handle"),
            Self::UnknownAllocation { offset } => {
                write!(f, "no live allocation at offset {offset} (double free?)")
            }
            Self::ForeignAllocation {
                allocation_heap,
                heap,
            } => {
                write!(f, "allocation from {allocation_heap} returned to {heap}")
            }
            Self::ForeignMarker {
                marker_arena,
                arena,
            } => {
                write!(f, "marker from {marker_arena} applied to {arena}")
            }
            Self::PoolExhausted { capacity } => {
                write!(f, "pool exhausted: all {capacity} slots in use")
            }
            Self::SlotOutOfRange { index, capacity } => {
                write!(f, "slot {index} out of range for pool of {capacity}")
            }
            Self::SlotNotAllocated { index } => {
                write!(f, "slot {index} is not allocated")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid arena config: {reason}")
            }
        }
    }
}

impl Error for ArenaError {}
