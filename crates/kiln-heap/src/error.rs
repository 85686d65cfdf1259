//! Heap error types.

use std::error::Error;
use std::fmt;

use kiln_arena::ArenaError;
use kiln_core::{DescriptorId, HeapId};

use crate::descriptor::DescriptorHeapKind;

/// Errors from buffer heaps, descriptor heaps and resource pools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// The underlying suballocator or arena failed.
    Arena(ArenaError),
    /// Construction parameters were rejected.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
    /// A host write or read against device-local memory.
    NotHostVisible {
        /// The heap that was written.
        heap: HeapId,
    },
    /// A write, read, or table access past the end of the heap.
    OutOfBounds {
        /// Start of the access.
        offset: u64,
        /// Length of the access.
        len: u64,
        /// Size of the heap.
        capacity: u32,
    },
    /// A scratch heap used with a parent heap other than its own.
    WrongHeap {
        /// Heap the scratch heap draws its chunks from.
        expected: HeapId,
        /// Heap that was passed in.
        found: HeapId,
    },
    /// A descriptor allocation or view returned to a table of the wrong kind.
    WrongDescriptorKind {
        /// Kind of the table.
        expected: DescriptorHeapKind,
        /// Kind of the allocation or view.
        found: DescriptorHeapKind,
    },
    /// A table slot read before any view was written to it.
    EmptyTableSlot {
        /// The slot.
        id: DescriptorId,
    },
    /// Every resource of a pool is checked out.
    PoolExhausted {
        /// Number of resources in the pool.
        capacity: u32,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arena(e) => write!(f, "allocation failed: {e}"),
            Self::InvalidConfig { reason } => write!(f, "invalid heap config: {reason}"),
            Self::NotHostVisible { heap } => {
                write!(f, "{heap} is not host visible")
            }
            Self::OutOfBounds {
                offset,
                len,
                capacity,
            } => {
                write!(
                    f,
                    "access of {len} at offset {offset} exceeds heap size {capacity}"
                )
            }
            Self::WrongHeap { expected, found } => {
                write!(f, "expected parent {expected}, got {found}")
            }
            Self::WrongDescriptorKind { expected, found } => {
                write!(f, "{found:?} descriptor used with {expected:?} table")
            }
            Self::EmptyTableSlot { id } => write!(f, "descriptor slot {id} is empty"),
            Self::PoolExhausted { capacity } => {
                write!(f, "resource pool exhausted: all {capacity} in use")
            }
        }
    }
}

impl Error for HeapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for HeapError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
